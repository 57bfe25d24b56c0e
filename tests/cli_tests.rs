//! End-to-end tests of the ecmabc binary

mod common;
use common::*;
use ecmabc::ast::*;
use ecmabc::serialize::BC_VERSION;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn ecmabc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecmabc"))
        .args(args)
        .output()
        .expect("binary runs")
}

fn write_program(dir: &Path, name: &str, program: &Program) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(program).unwrap()).unwrap();
    path.display().to_string()
}

fn sample() -> Program {
    Program::script(vec![
        func_decl("add", &["a", "b"], vec![ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))]),
        expr_stmt(call(ident("add"), vec![num(1.0), num(2.0)])),
    ])
}

#[test]
fn test_compile_writes_object() {
    let dir = TempDir::new().unwrap();
    let input = write_program(dir.path(), "sample.json", &sample());

    let output = ecmabc(&["compile", &input]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let bytes = fs::read(dir.path().join("sample.qbc")).unwrap();
    assert_eq!(bytes[0], BC_VERSION);
}

#[test]
fn test_compile_then_dump() {
    let dir = TempDir::new().unwrap();
    let input = write_program(dir.path(), "sample.json", &sample());
    let out = dir.path().join("custom.bin").display().to_string();

    let output = ecmabc(&["compile", &input, "--out", &out, "--strip-debug"]);
    assert!(output.status.success());

    let output = ecmabc(&["dump", &out]);
    assert!(output.status.success());
    let listing = String::from_utf8(output.stdout).unwrap();
    assert!(listing.contains("== <eval> =="));
    assert!(listing.contains("== add =="));
    assert!(listing.contains("define_func"));
}

#[test]
fn test_compile_dump_flag_prints_listing() {
    let dir = TempDir::new().unwrap();
    let input = write_program(dir.path(), "sample.json", &sample());

    let output = ecmabc(&["compile", &input, "--dump", "--no-optimize"]);
    assert!(output.status.success());
    let listing = String::from_utf8(output.stdout).unwrap();
    assert!(listing.contains("check_define_var"));
}

#[test]
fn test_compile_module() {
    let dir = TempDir::new().unwrap();
    let program = Program::script(vec![
        import_named("x", "x", "dep"),
        export(ExportKind::Declaration(Box::new(let_decl("y", ident("x"))))),
    ]);
    let input = write_program(dir.path(), "mod.json", &program);

    // rejected as a script, accepted with --module
    let output = ecmabc(&["compile", &input]);
    assert_eq!(output.status.code(), Some(1));

    let output = ecmabc(&["compile", &input, "--module"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn test_invalid_input_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.json");
    fs::write(&input, "{ not json").unwrap();

    let output = ecmabc(&["compile", &input.display().to_string()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_dump_rejects_garbage() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("garbage.qbc");
    fs::write(&file, [0xffu8, 0x00, 0x01]).unwrap();

    let output = ecmabc(&["dump", &file.display().to_string()]);
    assert_eq!(output.status.code(), Some(1));
}
