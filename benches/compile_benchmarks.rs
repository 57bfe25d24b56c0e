//! Performance benchmarks for ecmabc
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Compilation of generated programs of growing size
//! - The optimizer on its own
//! - Writing and reading the object format

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ecmabc::ast::*;
use ecmabc::bytecode::{Optimizer, OptimizerConfig};
use ecmabc::{compile_json, compile_program, read_bytes, CompileOptions, ReadOptions, WriteOptions};

fn ident(name: &str) -> Expression {
    Expression::ident(name)
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(Box::new(BinaryExpression {
        operator,
        left,
        right,
        span: Span::default(),
    }))
}

fn let_decl(name: &str, init: Expression) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind: VariableKind::Let,
        declarations: vec![VariableDeclarator {
            id: Pattern::ident(name),
            init: Some(init),
            span: Span::default(),
        }],
        span: Span::default(),
    })
}

/// `n` functions, each summing its arguments in a loop
fn program(n: usize) -> Program {
    let body = (0..n)
        .map(|i| {
            let loop_body = Statement::Block(BlockStatement {
                body: vec![Statement::expr(Expression::Assignment(Box::new(AssignmentExpression {
                    operator: AssignmentOperator::AddAssign,
                    left: Pattern::ident("acc"),
                    right: binary(BinaryOperator::Mul, ident("a"), ident("b")),
                    span: Span::default(),
                })))],
                span: Span::default(),
            });
            Statement::FunctionDeclaration(Box::new(Function {
                id: Some(Identifier::new(&format!("f{}", i), Span::default())),
                params: vec![Pattern::ident("a"), Pattern::ident("b")],
                body: FunctionBody::Block(vec![
                    let_decl("acc", Expression::number(i as f64)),
                    Statement::While(Box::new(WhileStatement {
                        test: binary(BinaryOperator::Lt, ident("acc"), Expression::number(1000.0)),
                        body: loop_body,
                        span: Span::default(),
                    })),
                    Statement::Return(ReturnStatement {
                        argument: Some(binary(BinaryOperator::Add, ident("acc"), Expression::number(1.0))),
                        span: Span::default(),
                    }),
                ]),
                is_async: false,
                is_generator: false,
                is_arrow: false,
                source: None,
                span: Span::default(),
            }))
        })
        .collect();
    Program::script(body)
}

/// Benchmark: compilation with and without the optimizer
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for n in [10, 100, 1000] {
        let prog = program(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("optimized", n), &prog, |b, prog| {
            let options = CompileOptions::default();
            b.iter(|| compile_program(black_box(prog), &options).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("unoptimized", n), &prog, |b, prog| {
            let options = CompileOptions {
                optimize: OptimizerConfig::disabled(),
                ..CompileOptions::default()
            };
            b.iter(|| compile_program(black_box(prog), &options).unwrap())
        });
    }

    let json = serde_json::to_string(&program(100)).unwrap();
    group.bench_function("from_json", |b| {
        let options = CompileOptions::default();
        b.iter(|| compile_json(black_box(&json), &options).unwrap())
    });

    group.finish();
}

/// Benchmark: optimizer passes over one function body
fn bench_optimize(c: &mut Criterion) {
    let options = CompileOptions {
        optimize: OptimizerConfig::disabled(),
        ..CompileOptions::default()
    };
    let compiled = compile_program(&program(1), &options).unwrap();
    let code = compiled
        .function()
        .and_then(|f| f.children().next().map(|child| child.code.clone()))
        .unwrap();

    c.bench_function("optimize_function", |b| {
        let optimizer = Optimizer::new();
        b.iter(|| optimizer.optimize(black_box(&code), &[]).unwrap())
    });
}

/// Benchmark: object format
fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let compiled = compile_program(&program(100), &CompileOptions::default()).unwrap();
    let bytes = compiled.to_bytes(&WriteOptions::default()).unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("write", |b| {
        let options = WriteOptions::default();
        b.iter(|| black_box(&compiled).to_bytes(&options).unwrap())
    });
    group.bench_function("read", |b| {
        let options = ReadOptions::default();
        b.iter(|| read_bytes(black_box(&bytes), &options).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_optimize, bench_serialize);
criterion_main!(benches);
