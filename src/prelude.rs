//! Prelude module for convenient imports
//!
//! ```no_run
//! use ecmabc::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let program = Program::script(vec![]);
//!     let compiled = compile_program(&program, &CompileOptions::default())?;
//!     println!("{}", compiled.disassemble()?);
//!     Ok(())
//! }
//! ```

// Input tree
pub use crate::ast::{Expression, Pattern, Program, Statement};

// Compilation
pub use crate::bytecode::{Opcode, OptimizerConfig};
pub use crate::{compile_json, compile_program, read_bytes, CompileOptions, Compiled};

// Output
pub use crate::atom::{Atom, AtomTable};
pub use crate::serialize::{ReadOptions, WriteOptions, BC_VERSION};
pub use crate::value::{FunctionBytecode, JsValue, ModuleDef};

// Error handling
pub use crate::error::{Error, ErrorCategory, Result, SourceLocation};
