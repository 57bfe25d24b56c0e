//! Optimizer tests over compiled programs

mod common;
use common::*;
use ecmabc::ast::*;
use ecmabc::bytecode::insn::decode_final;
use ecmabc::bytecode::{Arg, Opcode, Optimizer, OptimizerConfig};
use ecmabc::value::FunctionBytecode;
use ecmabc::{compile_program, CompileOptions, Compiled};

fn sample() -> Program {
    Program::script(vec![
        func_decl(
            "f",
            &["a"],
            vec![
                let_decl("x", binary(BinaryOperator::Add, num(1.0), num(2.0))),
                if_stmt(
                    ident("a"),
                    ret(Some(ident("x"))),
                    Some(ret(Some(binary(BinaryOperator::Mul, ident("x"), ident("a"))))),
                ),
            ],
        ),
        while_stmt(
            ident("running"),
            block(vec![expr_stmt(call(ident("f"), vec![num(3.0)]))]),
        ),
    ])
}

fn compile_with(program: &Program, optimize: OptimizerConfig) -> Compiled {
    let options = CompileOptions {
        optimize,
        ..CompileOptions::default()
    };
    compile_program(program, &options).unwrap()
}

fn dead_code_only() -> OptimizerConfig {
    OptimizerConfig {
        dead_code_elimination: true,
        ..OptimizerConfig::disabled()
    }
}

fn all_functions(func: &FunctionBytecode) -> Vec<&FunctionBytecode> {
    let mut out = vec![func];
    for child in func.children() {
        out.extend(all_functions(child));
    }
    out
}

mod passes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_optimize_is_idempotent() {
        let compiled = compile_unoptimized(&sample());
        let optimizer = Optimizer::new();
        for func in all_functions(top(&compiled)) {
            let once = optimizer.optimize(&func.code, &[]).unwrap();
            let twice = optimizer.optimize(&once.code, &once.lines).unwrap();
            assert_eq!(twice.code, once.code);
        }
    }

    #[test]
    fn test_every_config_produces_decodable_code() {
        let configs = [
            OptimizerConfig::default(),
            OptimizerConfig::disabled(),
            OptimizerConfig {
                short_opcodes: false,
                ..OptimizerConfig::default()
            },
        ];
        for config in configs {
            let compiled = compile_with(&sample(), config);
            for func in all_functions(top(&compiled)) {
                assert!(decode_final(&func.code).is_ok());
                assert!(func.stack_size > 0);
            }
        }
    }

    #[test]
    fn test_optimized_code_is_not_larger() {
        let plain = compile_unoptimized(&sample());
        let optimized = compile(&sample());
        let size = |f: &FunctionBytecode| all_functions(f).iter().map(|f| f.code.len()).sum::<usize>();
        assert!(size(top(&optimized)) <= size(top(&plain)));
    }

    #[test]
    fn test_constant_folding() {
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![ret(Some(binary(BinaryOperator::Add, num(1.0), num(2.0))))],
        )]);
        let compiled = compile(&program);
        let f = child(top(&compiled), 0);
        assert!(!contains(f, Opcode::Add));
    }

    #[test]
    fn test_unreachable_code_removed() {
        let program = Program::script(vec![func_decl(
            "f",
            &[],
            vec![ret(Some(num(1.0))), expr_stmt(call(ident("g"), vec![]))],
        )]);
        let plain = compile_with(&program, OptimizerConfig::disabled());
        assert_eq!(
            normalized(child(top(&plain), 0)),
            vec!["push_i32", "return", "get_var", "call", "drop", "return_undef"]
        );

        let pruned = compile_with(&program, dead_code_only());
        assert_eq!(normalized(child(top(&pruned), 0)), vec!["push_i32", "return"]);
    }

    #[test]
    fn test_unreachable_code_keeps_branch_target() {
        // function f(a) { if (a) { return 1; g(); } return 2; }
        let program = Program::script(vec![func_decl(
            "f",
            &["a"],
            vec![
                if_stmt(
                    ident("a"),
                    block(vec![ret(Some(num(1.0))), expr_stmt(call(ident("g"), vec![]))]),
                    None,
                ),
                ret(Some(num(2.0))),
            ],
        )]);
        let compiled = compile_with(&program, dead_code_only());
        let f = child(top(&compiled), 0);
        assert_eq!(
            normalized(f),
            vec!["get_arg", "if_false", "push_i32", "return", "push_i32", "return"]
        );

        // the branch lands on `push 2`, right after the removed call
        let insns = decode_final(&f.code).unwrap();
        let branch = insns
            .iter()
            .find(|i| i.opcode().map(|op| op.long_form().0) == Some(Opcode::IfFalse))
            .unwrap();
        let target = branch.arg.label().unwrap() as usize;
        let landing = insns.iter().find(|i| i.pos == target).unwrap();
        assert_eq!(landing.opcode(), Some(Opcode::PushI32));
        assert_eq!(landing.arg, Arg::Int(2));
    }
}
