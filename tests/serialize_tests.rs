//! Object format tests: value encoding, whole programs and reader checks

mod common;
use common::*;
use ecmabc::ast::*;
use ecmabc::atom::AtomTable;
use ecmabc::serialize::{read_object, write_object, BC_VERSION};
use ecmabc::value::JsValue;
use ecmabc::{read_bytes, ErrorCategory, ReadOptions, WriteOptions};
use num_bigint::BigInt;

fn roundtrip(value: &JsValue, atoms: &AtomTable) -> JsValue {
    let bytes = write_object(value, atoms, &WriteOptions::default()).unwrap();
    let mut fresh = AtomTable::new();
    read_object(&bytes, &mut fresh, &ReadOptions::default()).unwrap()
}

mod values {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalars() {
        let atoms = AtomTable::new();
        for value in [
            JsValue::Null,
            JsValue::Undefined,
            JsValue::Bool(true),
            JsValue::Bool(false),
            JsValue::Int32(-42),
            JsValue::Int32(i32::MAX),
        ] {
            assert_eq!(roundtrip(&value, &atoms), value);
        }
    }

    #[test]
    fn test_special_floats() {
        let atoms = AtomTable::new();
        for value in [
            JsValue::Float64(f64::NAN),
            JsValue::Float64(-0.0),
            JsValue::Float64(f64::INFINITY),
            JsValue::Float64(1.5),
        ] {
            assert_eq!(roundtrip(&value, &atoms), value);
        }
    }

    #[test]
    fn test_strings() {
        let atoms = AtomTable::new();
        for s in ["", "plain ascii", "caf\u{e9}", "\u{2713} wide \u{1f600}"] {
            let value = JsValue::string(s);
            assert_eq!(roundtrip(&value, &atoms), value);
        }
    }

    #[test]
    fn test_bigints() {
        let atoms = AtomTable::new();
        for n in [0i128, 1, -1, 255, -256, 12_345_678_901_234_567_890_123] {
            let value = JsValue::BigInt(BigInt::from(n));
            assert_eq!(roundtrip(&value, &atoms), value);
        }
    }

    #[test]
    fn test_nested_containers() {
        let mut atoms = AtomTable::new();
        let foo = atoms.intern("foo");
        let bar = atoms.intern("bar");
        let value = JsValue::object(vec![
            (foo, JsValue::array(vec![JsValue::Int32(1), JsValue::string("two"), JsValue::Null])),
            (bar, JsValue::object(vec![(foo, JsValue::Bool(true))])),
        ]);
        assert_eq!(roundtrip(&value, &atoms), value);
    }
}

mod programs {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Program {
        Program::script(vec![
            func_decl("add", &["a", "b"], vec![ret(Some(binary(BinaryOperator::Add, ident("a"), ident("b"))))]),
            let_decl("x", call(ident("add"), vec![num(1.0), num(2.5)])),
            class_decl("A", None, vec![private_method("m", vec![ret(Some(string("m")))])]),
        ])
    }

    #[test]
    fn test_program_rewrites_identically() {
        let compiled = compile(&sample());
        let options = WriteOptions::default();
        let first = compiled.to_bytes(&options).unwrap();
        assert_eq!(first[0], BC_VERSION);

        let decoded = read_bytes(&first, &ReadOptions::default()).unwrap();
        let second = decoded.to_bytes(&options).unwrap();
        assert_eq!(first, second);

        let original = top(&compiled);
        let reread = top(&decoded);
        assert_eq!(reread.code.len(), original.code.len());
        assert_eq!(reread.children().count(), original.children().count());
        assert_eq!(reread.stack_size, original.stack_size);
    }

    #[test]
    fn test_module_rewrites_identically() {
        let program = Program::module(vec![
            import_named("x", "x", "dep"),
            export(ExportKind::Declaration(Box::new(let_decl("y", ident("x"))))),
            export(ExportKind::All { source: "other".into() }),
        ]);
        let compiled = compile(&program);
        let first = compiled.to_bytes(&WriteOptions::default()).unwrap();
        let decoded = read_bytes(&first, &ReadOptions::default()).unwrap();
        assert!(matches!(decoded.value, JsValue::Module(_)));
        assert_eq!(decoded.to_bytes(&WriteOptions::default()).unwrap(), first);
    }

    #[test]
    fn test_strip_debug() {
        let compiled = compile(&sample());
        assert!(top(&compiled).debug.is_some());

        let full = compiled.to_bytes(&WriteOptions::default()).unwrap();
        let options = WriteOptions {
            strip_debug: true,
            ..WriteOptions::default()
        };
        let stripped = compiled.to_bytes(&options).unwrap();
        assert!(stripped.len() < full.len());

        let decoded = read_bytes(&stripped, &ReadOptions::default()).unwrap();
        assert!(top(&decoded).debug.is_none());
        assert!(top(&decoded).children().all(|f| f.debug.is_none()));
    }
}

mod reader {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrong_version() {
        let compiled = compile(&Program::script(vec![expr_stmt(num(1.0))]));
        let mut bytes = compiled.to_bytes(&WriteOptions::default()).unwrap();
        bytes[0] = BC_VERSION + 1;
        let err = read_bytes(&bytes, &ReadOptions::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Serialization);
    }

    #[test]
    fn test_truncated_input() {
        let compiled = compile(&Program::script(vec![expr_stmt(string("hello"))]));
        let bytes = compiled.to_bytes(&WriteOptions::default()).unwrap();
        let err = read_bytes(&bytes[..bytes.len() / 2], &ReadOptions::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Serialization);
    }
}
