//! Bytecode representation
//!
//! This module holds everything that deals with bytes of code: the opcode
//! table, the emission buffer, labels, the constant pool, inline-cache
//! slots, instruction decoding/layout, the pc-to-line table and the
//! optimizer. The compiler drives these; the serializer only ever sees
//! fully resolved code.

pub mod cpool;
pub mod ic;
pub mod insn;
pub mod label;
pub mod opcode;
pub mod optimizer;
pub mod pc2line;

pub use cpool::{Constant, ConstantPool, FuncId};
pub use ic::InlineCacheTable;
pub use insn::{Arg, Insn};
pub use label::{LabelId, LabelManager};
pub use opcode::{Format, Op, Opcode, TempOpcode};
pub use optimizer::{Optimizer, OptimizerConfig};

use crate::atom::{Atom, AtomTable};
use crate::error::Result;
use crate::value::{FunctionBytecode, JsValue};
use std::fmt::Write as _;

/// Append-only byte buffer the emitters write into
#[derive(Debug, Clone, Default)]
pub struct BytecodeBuffer {
    code: Vec<u8>,
    last_op_pos: Option<usize>,
}

impl BytecodeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length, used as the address of the next byte
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append an opcode byte
    pub fn emit_op(&mut self, op: impl Into<Op>) {
        self.last_op_pos = Some(self.code.len());
        self.code.push(op.into().to_byte());
    }

    pub fn emit_u8(&mut self, v: u8) {
        self.code.push(v);
    }

    pub fn emit_u16(&mut self, v: u16) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    pub fn emit_u32(&mut self, v: u32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    pub fn emit_i32(&mut self, v: i32) {
        self.code.extend_from_slice(&v.to_le_bytes());
    }

    pub fn emit_atom(&mut self, atom: Atom) {
        self.emit_u32(atom.id());
    }

    /// Overwrite a previously written u8
    pub fn patch_u8(&mut self, pos: usize, v: u8) {
        if let Some(b) = self.code.get_mut(pos) {
            *b = v;
        }
    }

    /// Overwrite a previously written u16
    pub fn patch_u16(&mut self, pos: usize, v: u16) {
        if let Some(slot) = self.code.get_mut(pos..pos + 2) {
            slot.copy_from_slice(&v.to_le_bytes());
        }
    }

    /// Overwrite a previously written u32
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        if let Some(slot) = self.code.get_mut(pos..pos + 4) {
            slot.copy_from_slice(&v.to_le_bytes());
        }
    }

    /// Opcode of the last instruction emitted, decoded as raw stream
    pub fn last_op(&self) -> Option<Op> {
        self.last_op_pos
            .and_then(|pos| self.code.get(pos))
            .and_then(|&b| Op::decode_raw(b))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.code
    }

    /// Replace the whole content, e.g. after a rewrite pass
    pub fn replace(&mut self, code: Vec<u8>) {
        self.code = code;
        self.last_op_pos = None;
    }
}

fn describe_constant(value: &JsValue, atoms: &AtomTable) -> String {
    match value {
        JsValue::String(s) => format!("{:?}", s),
        JsValue::Int32(n) => n.to_string(),
        JsValue::Float64(f) => f.to_string(),
        JsValue::BigInt(b) => format!("{}n", b),
        JsValue::Function(f) => format!("<function {}>", atoms.display_name(f.name)),
        other => format!("<{}>", other.type_name()),
    }
}

/// Render one instruction of final bytecode
pub fn format_insn(insn: &Insn, func: &FunctionBytecode, atoms: &AtomTable) -> String {
    let op = insn.op;
    let mut operands = String::new();
    match (op.format(), insn.arg) {
        (Format::Const | Format::Const8, Arg::Int(idx)) => {
            let shown = func
                .cpool
                .get(idx as usize)
                .map(|v| describe_constant(v, atoms))
                .unwrap_or_else(|| "?".to_string());
            let _ = write!(operands, "{}: {}", idx, shown);
        }
        (Format::Loc | Format::Loc8, Arg::Int(idx)) => {
            let name = func
                .locals()
                .get(idx as usize)
                .map(|v| atoms.display_name(v.name))
                .unwrap_or_default();
            let _ = write!(operands, "{}: {}", idx, name);
        }
        (Format::Arg, Arg::Int(idx)) => {
            let name = func
                .args()
                .get(idx as usize)
                .map(|v| atoms.display_name(v.name))
                .unwrap_or_default();
            let _ = write!(operands, "{}: {}", idx, name);
        }
        (Format::VarRef, Arg::Int(idx)) => {
            let name = func
                .closure_vars
                .get(idx as usize)
                .map(|v| atoms.display_name(v.name))
                .unwrap_or_default();
            let _ = write!(operands, "{}: {}", idx, name);
        }
        (_, Arg::Int(n)) => {
            let _ = write!(operands, "{}", n);
        }
        (_, Arg::Atom(a)) => operands.push_str(&atoms.display_name(a)),
        (_, Arg::AtomInt(a, n)) => {
            let _ = write!(operands, "{}, {}", atoms.display_name(a), n);
        }
        (_, Arg::Label(target)) => {
            let _ = write!(operands, "-> {:04}", target);
        }
        (_, Arg::AtomLabel(a, target, n)) => {
            let _ = write!(operands, "{}, -> {:04}, {}", atoms.display_name(a), target, n);
        }
        (_, Arg::LabelInt(target, n)) => {
            let _ = write!(operands, "-> {:04}, {}", target, n);
        }
        (_, Arg::IntPair(a, b)) => {
            let _ = write!(operands, "{}, {}", a, b);
        }
        (_, Arg::None) => {}
    }
    format!("{:04} {:<24} {}", insn.pos, op.name(), operands)
        .trim_end()
        .to_string()
}

/// Disassemble a function and, recursively, the functions in its
/// constant pool.
pub fn disassemble(func: &FunctionBytecode, atoms: &AtomTable) -> Result<String> {
    let mut output = String::new();
    disassemble_into(func, atoms, &mut output)?;
    Ok(output)
}

fn disassemble_into(func: &FunctionBytecode, atoms: &AtomTable, output: &mut String) -> Result<()> {
    let _ = writeln!(
        output,
        "== {} == args={} locals={} closure_vars={} stack_size={}",
        atoms.display_name(func.name),
        func.arg_count,
        func.var_count,
        func.closure_vars.len(),
        func.stack_size
    );
    let lines = match &func.debug {
        Some(debug) => pc2line::decode(&debug.pc2line, debug.line_num)?,
        None => Vec::new(),
    };
    let mut next_line = lines.iter().peekable();
    for insn in insn::decode_final(&func.code)? {
        while let Some(&&(pc, line)) = next_line.peek() {
            if pc as usize > insn.pos {
                break;
            }
            let _ = writeln!(output, "     ; line {}", line);
            next_line.next();
        }
        output.push_str(&format_insn(&insn, func, atoms));
        output.push('\n');
    }
    for child in func.children() {
        output.push('\n');
        disassemble_into(child, atoms, output)?;
    }
    Ok(())
}
