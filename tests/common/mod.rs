//! Shared AST builders and bytecode helpers for integration tests

#![allow(dead_code)]

use ecmabc::ast::*;
use ecmabc::bytecode::insn::decode_final;
use ecmabc::bytecode::{Opcode, OptimizerConfig};
use ecmabc::value::FunctionBytecode;
use ecmabc::{compile_program, CompileOptions, Compiled};

// ========== Expressions ==========

pub fn ident(name: &str) -> Expression {
    Expression::ident(name)
}

pub fn num(n: f64) -> Expression {
    Expression::number(n)
}

pub fn string(s: &str) -> Expression {
    Expression::Literal(Literal::string(s))
}

pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object,
        property: MemberProperty::Identifier(name.to_string()),
        optional: false,
        span: Span::default(),
    }))
}

pub fn private_member(object: Expression, name: &str) -> Expression {
    Expression::Member(Box::new(MemberExpression {
        object,
        property: MemberProperty::PrivateName(name.to_string()),
        optional: false,
        span: Span::default(),
    }))
}

pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(Box::new(CallExpression {
        callee,
        arguments,
        optional: false,
        span: Span::default(),
    }))
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(Box::new(BinaryExpression {
        operator,
        left,
        right,
        span: Span::default(),
    }))
}

pub fn assign(operator: AssignmentOperator, left: Pattern, right: Expression) -> Expression {
    Expression::Assignment(Box::new(AssignmentExpression {
        operator,
        left,
        right,
        span: Span::default(),
    }))
}

/// Member expression as an assignment target
pub fn member_target(object: Expression, name: &str) -> Pattern {
    Pattern::Member(Box::new(MemberExpression {
        object,
        property: MemberProperty::Identifier(name.to_string()),
        optional: false,
        span: Span::default(),
    }))
}

pub fn yield_expr(argument: Option<Expression>, delegate: bool) -> Expression {
    Expression::Yield(Box::new(YieldExpression {
        argument,
        delegate,
        span: Span::default(),
    }))
}

pub fn await_expr(argument: Expression) -> Expression {
    Expression::Await(Box::new(AwaitExpression {
        argument,
        span: Span::default(),
    }))
}

pub fn this() -> Expression {
    Expression::This(Span::default())
}

// ========== Statements ==========

pub fn expr_stmt(expression: Expression) -> Statement {
    Statement::expr(expression)
}

pub fn decl(kind: VariableKind, name: &str, init: Option<Expression>) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id: Pattern::ident(name),
            init,
            span: Span::default(),
        }],
        span: Span::default(),
    })
}

pub fn let_decl(name: &str, init: Expression) -> Statement {
    decl(VariableKind::Let, name, Some(init))
}

pub fn ret(argument: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        argument,
        span: Span::default(),
    })
}

pub fn if_stmt(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
    Statement::If(Box::new(IfStatement {
        test,
        consequent,
        alternate,
        span: Span::default(),
    }))
}

pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(BlockStatement {
        body,
        span: Span::default(),
    })
}

pub fn while_stmt(test: Expression, body: Statement) -> Statement {
    Statement::While(Box::new(WhileStatement {
        test,
        body,
        span: Span::default(),
    }))
}

// ========== Functions and classes ==========

pub fn function(name: Option<&str>, params: &[&str], body: Vec<Statement>) -> Function {
    Function {
        id: name.map(|n| Identifier::new(n, Span::default())),
        params: params.iter().map(|p| Pattern::ident(p)).collect(),
        body: FunctionBody::Block(body),
        is_async: false,
        is_generator: false,
        is_arrow: false,
        source: None,
        span: Span::default(),
    }
}

pub fn func_decl(name: &str, params: &[&str], body: Vec<Statement>) -> Statement {
    Statement::FunctionDeclaration(Box::new(function(Some(name), params, body)))
}

pub fn generator_decl(name: &str, body: Vec<Statement>) -> Statement {
    let mut f = function(Some(name), &[], body);
    f.is_generator = true;
    Statement::FunctionDeclaration(Box::new(f))
}

pub fn async_decl(name: &str, body: Vec<Statement>) -> Statement {
    let mut f = function(Some(name), &[], body);
    f.is_async = true;
    Statement::FunctionDeclaration(Box::new(f))
}

pub fn arrow(params: &[&str], body: Expression) -> Expression {
    let mut f = function(None, params, Vec::new());
    f.body = FunctionBody::Expression(Box::new(body));
    f.is_arrow = true;
    Expression::Arrow(Box::new(f))
}

pub fn method(key: PropertyKey, kind: MethodKind, body: Vec<Statement>) -> ClassElement {
    ClassElement::Method(MethodDefinition {
        key,
        value: function(None, &[], body),
        kind,
        is_static: false,
        span: Span::default(),
    })
}

pub fn private_method(name: &str, body: Vec<Statement>) -> ClassElement {
    method(PropertyKey::PrivateName(name.to_string()), MethodKind::Method, body)
}

pub fn field(key: PropertyKey, value: Option<Expression>, is_static: bool) -> ClassElement {
    ClassElement::Property(PropertyDefinition {
        key,
        value,
        is_static,
        span: Span::default(),
    })
}

pub fn class(name: &str, super_class: Option<Expression>, body: Vec<ClassElement>) -> Class {
    Class {
        id: Some(Identifier::new(name, Span::default())),
        super_class: super_class.map(Box::new),
        body,
        span: Span::default(),
    }
}

pub fn class_decl(name: &str, super_class: Option<Expression>, body: Vec<ClassElement>) -> Statement {
    Statement::ClassDeclaration(Box::new(class(name, super_class, body)))
}

// ========== Modules ==========

pub fn import_named(imported: &str, local: &str, source: &str) -> Statement {
    Statement::Import(Box::new(ImportDeclaration {
        specifiers: vec![ImportSpecifier::Named {
            imported: imported.to_string(),
            local: Identifier::new(local, Span::default()),
        }],
        source: source.to_string(),
        attributes: Vec::new(),
        span: Span::default(),
    }))
}

pub fn export(kind: ExportKind) -> Statement {
    Statement::Export(Box::new(ExportDeclaration {
        kind,
        span: Span::default(),
    }))
}

// ========== Compilation ==========

pub fn compile(program: &Program) -> Compiled {
    compile_program(program, &CompileOptions::default()).expect("program compiles")
}

/// Compile without rewrites, only choosing short encodings
pub fn compile_unoptimized(program: &Program) -> Compiled {
    let options = CompileOptions {
        optimize: OptimizerConfig {
            short_opcodes: true,
            ..OptimizerConfig::disabled()
        },
        ..CompileOptions::default()
    };
    compile_program(program, &options).expect("program compiles")
}

pub fn top(compiled: &Compiled) -> &FunctionBytecode {
    compiled.function().expect("compiled value has a function")
}

/// Nested function `n` in constant pool order
pub fn child(func: &FunctionBytecode, n: usize) -> &FunctionBytecode {
    func.children().nth(n).expect("nested function exists")
}

pub fn opcodes(func: &FunctionBytecode) -> Vec<Opcode> {
    decode_final(&func.code)
        .expect("final bytecode decodes")
        .iter()
        .filter_map(|i| i.opcode())
        .collect()
}

/// Opcode names with short forms collapsed to their long form
pub fn normalized(func: &FunctionBytecode) -> Vec<&'static str> {
    opcodes(func).into_iter().map(|op| op.long_form().0.name()).collect()
}

pub fn contains(func: &FunctionBytecode, op: Opcode) -> bool {
    opcodes(func).contains(&op)
}
