//! ecmabc: an ECMAScript compiler backend emitting QuickJS-compatible bytecode
//!
//! ecmabc takes a pre-parsed ECMAScript syntax tree (ESTree-shaped, usually
//! as JSON from an external parser) and produces the binary object format
//! the QuickJS virtual machine loads: an atom section followed by tagged
//! function and module records.
//!
//! # Quick Start
//!
//! ```no_run
//! use ecmabc::{compile_json, CompileOptions, WriteOptions};
//!
//! fn main() -> ecmabc::Result<()> {
//!     let json = std::fs::read_to_string("program.json")?;
//!     let compiled = compile_json(&json, &CompileOptions::default())?;
//!     let bytes = compiled.to_bytes(&WriteOptions::default())?;
//!     println!("{} bytes", bytes.len());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! The pipeline flows: [`ast`] → [`compiler`] (emit, resolve variables,
//! resolve labels) → [`bytecode::optimizer`] → [`serialize`]
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Input** | [`ast`] |
//! | **Names** | [`atom`] |
//! | **Code** | [`bytecode`], [`compiler`] |
//! | **Output** | [`value`], [`serialize`] |
//! | **Errors** | [`Error`], [`ErrorCategory`] |

// Opcode and AST enums mirror the names used by the VM and ESTree.
#![allow(clippy::enum_variant_names)]
#![allow(clippy::new_without_default)]

pub mod ast;
pub mod atom;
pub mod bytecode;
pub mod compiler;
pub mod prelude;
pub mod serialize;
pub mod value;

mod error;

pub use compiler::CompileOptions;
pub use error::{Error, ErrorCategory, Result, SourceLocation};
pub use serialize::{ReadOptions, WriteOptions};

use atom::AtomTable;
use std::rc::Rc;
use tracing::debug;
use value::{FunctionBytecode, JsValue};

/// ecmabc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A compiled script or module with the atom table its ids refer to
#[derive(Debug)]
pub struct Compiled {
    pub atoms: AtomTable,
    /// `JsValue::Function` for scripts, `JsValue::Module` for modules
    pub value: JsValue,
}

impl Compiled {
    /// Top-level function record
    pub fn function(&self) -> Option<&Rc<FunctionBytecode>> {
        match &self.value {
            JsValue::Function(f) => Some(f),
            JsValue::Module(m) => Some(&m.func),
            _ => None,
        }
    }

    /// Encode in the binary object format
    pub fn to_bytes(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        serialize::write_object(&self.value, &self.atoms, options)
    }

    /// Listing of every function, nested ones included
    pub fn disassemble(&self) -> Result<String> {
        match self.function() {
            Some(f) => f.disassemble(&self.atoms),
            None => Err(Error::internal("compiled value has no function record")),
        }
    }
}

/// Compile a program tree
pub fn compile_program(program: &ast::Program, options: &CompileOptions) -> Result<Compiled> {
    let mut atoms = AtomTable::new();
    let value = compiler::compile(program, &mut atoms, options)?;
    debug!(atoms = atoms.len(), "compilation finished");
    Ok(Compiled { atoms, value })
}

/// Compile the JSON form of a program tree
pub fn compile_json(json: &str, options: &CompileOptions) -> Result<Compiled> {
    let program: ast::Program = serde_json::from_str(json)?;
    compile_program(&program, options)
}

/// Decode a serialized object into a fresh atom table
pub fn read_bytes(bytes: &[u8], options: &ReadOptions) -> Result<Compiled> {
    let mut atoms = AtomTable::new();
    let value = serialize::read_object(bytes, &mut atoms, options)?;
    Ok(Compiled { atoms, value })
}
