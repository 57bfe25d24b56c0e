//! Compiler tests: scopes, closures, control flow, classes and modules

mod common;
use common::*;
use ecmabc::ast::*;
use ecmabc::bytecode::Opcode;
use ecmabc::value::{ExportEntryKind, FuncKind, FunctionFlags, JsValue};
use ecmabc::{compile_json, compile_program, CompileOptions, ErrorCategory};

fn compile_err(program: &Program) -> ErrorCategory {
    compile_program(program, &CompileOptions::default())
        .expect_err("program is rejected")
        .category()
}

fn function_expr(f: Function) -> Expression {
    Expression::Function(Box::new(f))
}

mod scopes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arrow_captures_lexical_variable() {
        // function f() { let x = 1; return () => x; }
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![let_decl("x", num(1.0)), ret(Some(arrow(&[], ident("x"))))],
        )]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        let inner = child(f, 0);

        assert_eq!(normalized(inner), vec!["get_var_ref_check", "return"]);
        assert_eq!(inner.closure_vars.len(), 1);
        assert!(inner.closure_vars[0].is_local);
        assert!(inner.closure_vars[0].is_lexical);
        assert!(f.locals().iter().any(|v| v.is_captured && v.is_lexical));
    }

    #[test]
    fn test_captured_block_variable_is_closed() {
        // function f() { { let x = 1; g(() => x); } }
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![block(vec![
                let_decl("x", num(1.0)),
                expr_stmt(call(ident("g"), vec![arrow(&[], ident("x"))])),
            ])],
        )]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        assert!(contains(f, Opcode::CloseLoc));
    }

    #[test]
    fn test_lexical_read_is_checked() {
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![let_decl("x", num(1.0)), ret(Some(ident("x")))],
        )]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        assert!(normalized(f).contains(&"get_loc_check"));
    }

    #[test]
    fn test_with_statement_checks_object() {
        let program = Program::script(vec![Statement::With(Box::new(WithStatement {
            object: ident("o"),
            body: block(vec![expr_stmt(ident("x"))]),
            span: Span::default(),
        }))]);
        let compiled = compile_unoptimized(&program);
        assert!(contains(top(&compiled), Opcode::WithGetVar));
    }

    #[test]
    fn test_with_statement_in_strict_code() {
        let mut program = Program::script(vec![Statement::With(Box::new(WithStatement {
            object: ident("o"),
            body: block(vec![]),
            span: Span::default(),
        }))]);
        program.strict = true;
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_const_assignment_throws() {
        // function f() { const x = 1; x = 2; }
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![
                decl(VariableKind::Const, "x", Some(num(1.0))),
                expr_stmt(assign(AssignmentOperator::Assign, Pattern::ident("x"), num(2.0))),
            ],
        )]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        assert!(contains(f, Opcode::ThrowError));
    }
}

mod functions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arrow_this_binds_enclosing_function() {
        // function f() { return () => this; }
        let program = Program::script(vec![func_decl("f", &[], vec![ret(Some(arrow(&[], this())))])]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        assert_eq!(normalized(f)[..2], ["push_this", "put_loc"]);
        assert_eq!(child(f, 0).closure_vars.len(), 1);
    }

    #[test]
    fn test_arguments_object() {
        let program = Program::script(vec![func_decl("f", &[], vec![ret(Some(ident("arguments")))])]);
        let compiled = compile_unoptimized(&program);
        let f = child(top(&compiled), 0);
        assert_eq!(opcodes(f)[0], Opcode::SpecialObject);
    }

    #[test]
    fn test_async_function() {
        let program = Program::script(vec![async_decl(
            "f",
            vec![expr_stmt(await_expr(call(ident("g"), vec![])))],
        )]);
        let compiled = compile(&program);
        let f = child(top(&compiled), 0);
        assert_eq!(f.kind, FuncKind::Async);
        assert!(contains(f, Opcode::Await));
        assert!(contains(f, Opcode::ReturnAsync));
    }

    #[test]
    fn test_default_parameter_is_not_simple() {
        let mut f = function(Some("f"), &[], vec![]);
        f.params = vec![Pattern::Assignment(Box::new(AssignmentPattern {
            left: Pattern::ident("a"),
            right: num(1.0),
            span: Span::default(),
        }))];
        let program = Program::script(vec![Statement::FunctionDeclaration(Box::new(f))]);
        let compiled = compile(&program);
        let f = child(top(&compiled), 0);
        assert!(!f.flags.contains(FunctionFlags::HAS_SIMPLE_PARAMETER_LIST));
        assert_eq!(f.arg_count, 1);
        assert_eq!(f.defined_arg_count, 0);
    }

    #[test]
    fn test_prototype_flag() {
        let program = Program::script(vec![
            func_decl("f", &["a"], vec![]),
            expr_stmt(arrow(&[], num(1.0))),
        ]);
        let compiled = compile(&program);
        let main = top(&compiled);
        let plain = child(main, 0);
        let arrow = child(main, 1);
        assert!(plain.flags.contains(FunctionFlags::HAS_PROTOTYPE));
        assert!(plain.flags.contains(FunctionFlags::HAS_SIMPLE_PARAMETER_LIST));
        assert!(!arrow.flags.contains(FunctionFlags::HAS_PROTOTYPE));
    }

    #[test]
    fn test_call_stack_size() {
        let program = Program::script(vec![expr_stmt(call(
            ident("f"),
            vec![num(1.0), num(2.0), num(3.0)],
        ))]);
        let compiled = compile(&program);
        assert!(top(&compiled).stack_size >= 4);
    }
}

mod control_flow {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_while_with_break() {
        let program = Program::script(vec![while_stmt(
            ident("x"),
            block(vec![Statement::Break(BreakStatement {
                label: None,
                span: Span::default(),
            })]),
        )]);
        let compiled = compile_unoptimized(&program);
        let ops = normalized(top(&compiled));
        assert!(ops.contains(&"if_false"));
        assert!(ops.contains(&"goto"));
    }

    #[test]
    fn test_top_level_return() {
        let program = Program::script(vec![ret(None)]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_try_catch_finally() {
        let program = Program::script(vec![Statement::Try(Box::new(TryStatement {
            block: BlockStatement {
                body: vec![expr_stmt(call(ident("f"), vec![]))],
                span: Span::default(),
            },
            handler: Some(CatchClause {
                param: Some(Pattern::ident("e")),
                body: BlockStatement {
                    body: vec![expr_stmt(call(ident("g"), vec![ident("e")]))],
                    span: Span::default(),
                },
                span: Span::default(),
            }),
            finalizer: Some(BlockStatement {
                body: vec![expr_stmt(call(ident("h"), vec![]))],
                span: Span::default(),
            }),
            span: Span::default(),
        }))]);
        let compiled = compile_unoptimized(&program);
        let main = top(&compiled);
        assert!(contains(main, Opcode::Catch));
        assert!(contains(main, Opcode::Gosub));
        assert!(contains(main, Opcode::Ret));
    }

    #[test]
    fn test_for_of() {
        let left = VariableDeclaration {
            kind: VariableKind::Const,
            declarations: vec![VariableDeclarator {
                id: Pattern::ident("x"),
                init: None,
                span: Span::default(),
            }],
            span: Span::default(),
        };
        let program = Program::script(vec![Statement::ForOf(Box::new(ForOfStatement {
            left: ForInLeft::Declaration(left),
            right: ident("xs"),
            body: expr_stmt(call(ident("f"), vec![ident("x")])),
            is_await: false,
            span: Span::default(),
        }))]);
        let compiled = compile_unoptimized(&program);
        let main = top(&compiled);
        assert!(contains(main, Opcode::ForOfStart));
        assert!(contains(main, Opcode::ForOfNext));
        assert!(contains(main, Opcode::IteratorClose));
    }

    #[test]
    fn test_switch() {
        let program = Program::script(vec![Statement::Switch(Box::new(SwitchStatement {
            discriminant: ident("x"),
            cases: vec![
                SwitchCase {
                    test: Some(num(1.0)),
                    consequent: vec![expr_stmt(call(ident("f"), vec![]))],
                    span: Span::default(),
                },
                SwitchCase {
                    test: None,
                    consequent: vec![expr_stmt(call(ident("g"), vec![]))],
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        }))]);
        let compiled = compile_unoptimized(&program);
        assert!(contains(top(&compiled), Opcode::StrictEq));
    }

    #[test]
    fn test_labeled_break() {
        // outer: while (x) { while (y) { break outer; } }
        let inner = while_stmt(
            ident("y"),
            block(vec![Statement::Break(BreakStatement {
                label: Some(Identifier::new("outer", Span::default())),
                span: Span::default(),
            })]),
        );
        let program = Program::script(vec![Statement::Labeled(Box::new(LabeledStatement {
            label: Identifier::new("outer", Span::default()),
            body: while_stmt(ident("x"), block(vec![inner])),
            span: Span::default(),
        }))]);
        compile(&program);
    }

    #[test]
    fn test_unknown_break_label() {
        let program = Program::script(vec![while_stmt(
            ident("x"),
            Statement::Break(BreakStatement {
                label: Some(Identifier::new("nowhere", Span::default())),
                span: Span::default(),
            }),
        )]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }
}

mod classes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_derived_default_constructor() {
        let program = Program::script(vec![class_decl("B", Some(ident("A")), vec![])]);
        let compiled = compile(&program);
        let ctor = child(top(&compiled), 0);
        assert!(ctor.flags.contains(FunctionFlags::IS_DERIVED_CLASS_CONSTRUCTOR));
    }

    #[test]
    fn test_instance_and_static_fields() {
        let program = Program::script(vec![class_decl(
            "A",
            None,
            vec![
                field(PropertyKey::Identifier("x".into()), Some(num(1.0)), false),
                field(PropertyKey::Identifier("y".into()), Some(num(2.0)), true),
            ],
        )]);
        let compiled = compile(&program);
        let main = top(&compiled);
        assert_eq!(main.children().count(), 3);
        assert!(contains(main, Opcode::CallMethod));
    }

    #[test]
    fn test_private_accessor_pair() {
        let setter = function(None, &["v"], vec![]);
        let program = Program::script(vec![class_decl(
            "A",
            None,
            vec![
                method(
                    PropertyKey::PrivateName("x".into()),
                    MethodKind::Get,
                    vec![ret(Some(num(1.0)))],
                ),
                ClassElement::Method(MethodDefinition {
                    key: PropertyKey::PrivateName("x".into()),
                    value: setter,
                    kind: MethodKind::Set,
                    is_static: false,
                    span: Span::default(),
                }),
            ],
        )]);
        compile(&program);
    }

    #[test]
    fn test_private_field_read_in_method() {
        // class A { #x = 1; m() { return this.#x; } }
        let program = Program::script(vec![class_decl(
            "A",
            None,
            vec![
                field(PropertyKey::PrivateName("x".into()), Some(num(1.0)), false),
                method(
                    PropertyKey::Identifier("m".into()),
                    MethodKind::Method,
                    vec![ret(Some(private_member(this(), "x")))],
                ),
            ],
        )]);
        let compiled = compile(&program);
        let m = child(top(&compiled), 1);
        assert!(contains(m, Opcode::GetPrivateField));
    }

    #[test]
    fn test_undeclared_private_name() {
        let program = Program::script(vec![class_decl(
            "A",
            None,
            vec![method(
                PropertyKey::Identifier("m".into()),
                MethodKind::Method,
                vec![ret(Some(private_member(this(), "missing")))],
            )],
        )]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_super_call_outside_derived_constructor() {
        let body = vec![expr_stmt(Expression::Call(Box::new(CallExpression {
            callee: Expression::Super(Span::default()),
            arguments: vec![],
            optional: false,
            span: Span::default(),
        })))];
        let program = Program::script(vec![class_decl(
            "A",
            None,
            vec![method(PropertyKey::Identifier("constructor".into()), MethodKind::Constructor, body)],
        )]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }
}

mod generators {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_top_level_yield() {
        let program = Program::script(vec![expr_stmt(yield_expr(None, false))]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_yield_delegate() {
        let program = Program::script(vec![generator_decl(
            "g",
            vec![expr_stmt(yield_expr(Some(call(ident("other"), vec![])), true))],
        )]);
        let compiled = compile_unoptimized(&program);
        let g = child(top(&compiled), 0);
        assert_eq!(g.kind, FuncKind::Generator);
        assert!(contains(g, Opcode::YieldStar));
        assert!(contains(g, Opcode::IteratorCall));
    }

    #[test]
    fn test_async_generator() {
        let mut f = function(Some("g"), &[], vec![expr_stmt(yield_expr(Some(num(1.0)), false))]);
        f.is_async = true;
        f.is_generator = true;
        let program = Program::script(vec![Statement::FunctionDeclaration(Box::new(f))]);
        let compiled = compile(&program);
        let g = child(top(&compiled), 0);
        assert_eq!(g.kind, FuncKind::AsyncGenerator);
        assert!(contains(g, Opcode::Await));
    }

    #[test]
    fn test_generator_expression_starts_suspended() {
        let mut f = function(None, &[], vec![]);
        f.is_generator = true;
        let program = Program::script(vec![expr_stmt(function_expr(f))]);
        let compiled = compile(&program);
        let g = child(top(&compiled), 0);
        assert_eq!(opcodes(g)[0], Opcode::InitialYield);
    }
}

mod modules {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module(body: Vec<Statement>) -> ecmabc::Compiled {
        compile(&Program::module(body))
    }

    fn module_def(compiled: &ecmabc::Compiled) -> &ecmabc::value::ModuleDef {
        match &compiled.value {
            JsValue::Module(m) => m,
            other => panic!("expected a module record, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_import_and_local_export() {
        let compiled = module(vec![
            import_named("x", "x", "m"),
            export(ExportKind::Declaration(Box::new(let_decl("y", ident("x"))))),
        ]);
        let m = module_def(&compiled);
        assert_eq!(m.req_modules.len(), 1);
        assert_eq!(m.imports.len(), 1);
        assert_eq!(m.imports[0].var_idx, 0);
        assert_eq!(m.exports.len(), 1);
        assert_eq!(m.exports[0].kind, ExportEntryKind::Local { var_idx: 1 });
        assert_eq!(compiled.atoms.name(m.exports[0].export_name).as_deref(), Some("y"));
    }

    #[test]
    fn test_required_modules_are_deduplicated() {
        let compiled = module(vec![import_named("a", "a", "m"), import_named("b", "b", "m")]);
        let m = module_def(&compiled);
        assert_eq!(m.req_modules.len(), 1);
        assert_eq!(m.imports.len(), 2);
    }

    #[test]
    fn test_export_of_undeclared_binding() {
        let program = Program::module(vec![export(ExportKind::Named {
            specifiers: vec![ExportSpecifier {
                local: "nope".into(),
                exported: "nope".into(),
                span: Span::default(),
            }],
            source: None,
        })]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_import_in_script() {
        let program = Program::script(vec![import_named("x", "x", "m")]);
        assert_eq!(compile_err(&program), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_top_level_await() {
        let body = vec![expr_stmt(await_expr(call(ident("f"), vec![])))];
        let compiled = module(body.clone());
        assert!(contains(top(&compiled), Opcode::Await));
        assert_eq!(compile_err(&Program::script(body)), ErrorCategory::InvalidContext);
    }

    #[test]
    fn test_star_export() {
        let compiled = module(vec![export(ExportKind::All { source: "m".into() })]);
        let m = module_def(&compiled);
        assert_eq!(m.star_exports.len(), 1);
        assert_eq!(m.star_exports[0].req_module_idx, 0);
    }
}

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_computed_key_with_rest_pattern() {
        let pattern = Pattern::Object(ObjectPattern {
            properties: vec![
                ObjectPatternProperty::Property {
                    key: PropertyKey::Computed(Box::new(ident("k"))),
                    value: Pattern::ident("a"),
                    shorthand: false,
                    span: Span::default(),
                },
                ObjectPatternProperty::Rest {
                    argument: Pattern::ident("rest"),
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        });
        let program = Program::script(vec![Statement::VariableDeclaration(VariableDeclaration {
            kind: VariableKind::Let,
            declarations: vec![VariableDeclarator {
                id: pattern,
                init: Some(ident("o")),
                span: Span::default(),
            }],
            span: Span::default(),
        })]);
        assert_eq!(compile_err(&program), ErrorCategory::UnsupportedConstruct);
    }

    #[test]
    fn test_too_many_parameters() {
        let names: Vec<String> = (0..=u16::MAX as usize).map(|i| format!("p{}", i)).collect();
        let params: Vec<&str> = names.iter().map(String::as_str).collect();
        let program = Program::script(vec![func_decl("f", &params, vec![ret(Some(ident("p0")))])]);
        let err = compile_program(&program, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::UnsupportedConstruct);
        assert!(err.to_string().contains("too many arguments"));

        // one fewer still fits
        let program = Program::script(vec![func_decl("f", &params[1..], vec![])]);
        let compiled = compile(&program);
        assert_eq!(child(top(&compiled), 0).arg_count, u16::MAX);
    }

    #[test]
    fn test_malformed_json() {
        let err = compile_json("{\"body\": [", &CompileOptions::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_error_location_in_message() {
        let mut stmt = ReturnStatement {
            argument: None,
            span: Span::line(2),
        };
        stmt.span.start.column = 5;
        let err = compile_program(&Program::script(vec![Statement::Return(stmt)]), &CompileOptions::default())
            .unwrap_err();
        let location = err.location().expect("context errors carry a location");
        assert_eq!((location.line, location.column), (2, 5));
        assert!(err.to_string().ends_with("at 2:5"));
        assert!(err.to_string().starts_with("InvalidContext:"));
    }
}
