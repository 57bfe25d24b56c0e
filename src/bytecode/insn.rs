//! Instruction decoding, encoding and layout
//!
//! Every pass works on a decoded instruction list rather than on raw
//! bytes. Decoding is a single forward scan driven by the operand format
//! of each opcode; a byte that is not an opcode of the current phase is a
//! hard error because nothing after it can be located.
//!
//! Label operands mean different things per phase:
//! - raw stream: the operand is a label id and `label` markers bind them;
//! - final bytecode: the operand is an offset relative to the operand's own
//!   position. [`decode_final`] turns it into an absolute target and
//!   [`labelize`] turns absolute targets back into label markers, so every
//!   transform can rely on [`assemble`] for layout.

use super::label::LabelId;
use super::opcode::{Format, Op, Opcode, TempOpcode};
use crate::atom::Atom;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// Decoded operand of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    None,
    /// Immediate, slot index, constant index, count or scope level
    Int(i32),
    Atom(Atom),
    AtomInt(Atom, u32),
    /// Label id, or absolute target when decoded from final bytecode
    Label(LabelId),
    AtomLabel(Atom, LabelId, u32),
    LabelInt(LabelId, u32),
    /// `npop_u16`: argument count and scope
    IntPair(u32, u32),
}

impl Arg {
    pub fn atom(&self) -> Option<Atom> {
        match *self {
            Arg::Atom(a) | Arg::AtomInt(a, _) | Arg::AtomLabel(a, _, _) => Some(a),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<LabelId> {
        match *self {
            Arg::Label(l) | Arg::AtomLabel(_, l, _) | Arg::LabelInt(l, _) => Some(l),
            _ => None,
        }
    }

    pub fn int(&self) -> Option<i32> {
        match *self {
            Arg::Int(n) => Some(n),
            Arg::AtomInt(_, n) | Arg::AtomLabel(_, _, n) | Arg::LabelInt(_, n) => Some(n as i32),
            Arg::IntPair(n, _) => Some(n as i32),
            _ => None,
        }
    }

    /// Same operand with its label replaced
    pub fn with_label(self, label: LabelId) -> Arg {
        match self {
            Arg::Label(_) => Arg::Label(label),
            Arg::AtomLabel(a, _, n) => Arg::AtomLabel(a, label, n),
            Arg::LabelInt(_, n) => Arg::LabelInt(label, n),
            other => other,
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insn {
    /// Offset in the stream it was decoded from; 0 for synthesized ones
    pub pos: usize,
    pub op: Op,
    pub arg: Arg,
}

impl Insn {
    pub fn new(op: impl Into<Op>, arg: Arg) -> Self {
        Self {
            pos: 0,
            op: op.into(),
            arg,
        }
    }

    pub fn simple(op: Opcode) -> Self {
        Self::new(op, Arg::None)
    }

    pub fn label(label: LabelId) -> Self {
        Self::new(TempOpcode::Label, Arg::Label(label))
    }

    pub fn opcode(&self) -> Option<Opcode> {
        match self.op {
            Op::Final(op) => Some(op),
            Op::Temp(_) => None,
        }
    }

    pub fn temp(&self) -> Option<TempOpcode> {
        match self.op {
            Op::Temp(op) => Some(op),
            Op::Final(_) => None,
        }
    }

    pub fn is(&self, op: Opcode) -> bool {
        self.op == Op::Final(op)
    }

    /// Is this a marker that occupies no space once assembled?
    pub fn is_marker(&self) -> bool {
        matches!(self.op, Op::Temp(TempOpcode::Label) | Op::Temp(TempOpcode::LineNum))
    }

    pub fn size(&self) -> usize {
        if self.is_marker() {
            0
        } else {
            self.op.info().size as usize
        }
    }

    /// Values popped and pushed, accounting for argument counts
    pub fn stack_effect(&self) -> (u32, u32) {
        let info = self.op.info();
        let (pop, push) = (info.n_pop as u32, info.n_push as u32);
        match info.format {
            Format::Npop => (pop + self.arg.int().unwrap_or(0).max(0) as u32, push),
            Format::NpopU16 => (pop + self.arg.int().unwrap_or(0).max(0) as u32, push),
            Format::Npopx => match self.opcode().map(Opcode::long_form) {
                Some((_, Some(argc))) => (pop + argc as u32, push),
                _ => (pop, push),
            },
            _ => (pop, push),
        }
    }
}

struct Reader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self
            .code
            .get(self.pos..end)
            .ok_or_else(|| Error::internal(format!("truncated instruction at offset {}", self.pos)))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.bytes()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.bytes()?))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Raw,
    Final,
}

fn decode(code: &[u8], phase: Phase) -> Result<Vec<Insn>> {
    let mut out = Vec::new();
    let mut r = Reader { code, pos: 0 };
    while r.pos < code.len() {
        let pos = r.pos;
        let byte = r.u8()?;
        let op = match phase {
            Phase::Raw => Op::decode_raw(byte),
            Phase::Final => Op::decode_final(byte),
        }
        .ok_or_else(|| Error::unknown_opcode(byte, pos))?;
        let label = |r: &mut Reader<'_>, width: usize| -> Result<LabelId> {
            let operand_pos = r.pos;
            match phase {
                Phase::Raw => r.u32(),
                Phase::Final => {
                    let rel = match width {
                        1 => r.u8()? as i8 as i64,
                        2 => r.u16()? as i16 as i64,
                        _ => r.u32()? as i32 as i64,
                    };
                    let target = operand_pos as i64 + rel;
                    if target < 0 || target > code.len() as i64 {
                        return Err(Error::internal(format!(
                            "jump at offset {} targets {} outside the function",
                            pos, target
                        )));
                    }
                    Ok(target as LabelId)
                }
            }
        };
        let arg = match op.format() {
            Format::None
            | Format::NoneInt
            | Format::NoneLoc
            | Format::NoneArg
            | Format::NoneVarRef
            | Format::Npopx => Arg::None,
            Format::U8 | Format::Loc8 | Format::Const8 => Arg::Int(r.u8()? as i32),
            Format::I8 => Arg::Int(r.u8()? as i8 as i32),
            Format::U16 | Format::Npop | Format::Loc | Format::Arg | Format::VarRef => {
                Arg::Int(r.u16()? as i32)
            }
            Format::I16 => Arg::Int(r.u16()? as i16 as i32),
            Format::NpopU16 => {
                let a = r.u16()? as u32;
                Arg::IntPair(a, r.u16()? as u32)
            }
            Format::U32 | Format::I32 | Format::Const => Arg::Int(r.u32()? as i32),
            Format::Atom => Arg::Atom(Atom::from_id(r.u32()?)),
            Format::AtomU8 => {
                let a = Atom::from_id(r.u32()?);
                Arg::AtomInt(a, r.u8()? as u32)
            }
            Format::AtomU16 => {
                let a = Atom::from_id(r.u32()?);
                Arg::AtomInt(a, r.u16()? as u32)
            }
            Format::Label8 => Arg::Label(label(&mut r, 1)?),
            Format::Label16 => Arg::Label(label(&mut r, 2)?),
            Format::Label => Arg::Label(label(&mut r, 4)?),
            Format::AtomLabelU8 => {
                let a = Atom::from_id(r.u32()?);
                let l = label(&mut r, 4)?;
                Arg::AtomLabel(a, l, r.u8()? as u32)
            }
            Format::AtomLabelU16 => {
                let a = Atom::from_id(r.u32()?);
                let l = label(&mut r, 4)?;
                Arg::AtomLabel(a, l, r.u16()? as u32)
            }
            Format::LabelU16 => {
                let l = label(&mut r, 4)?;
                Arg::LabelInt(l, r.u16()? as u32)
            }
        };
        out.push(Insn { pos, op, arg });
    }
    Ok(out)
}

/// Decode the raw emitter stream
pub fn decode_raw(code: &[u8]) -> Result<Vec<Insn>> {
    decode(code, Phase::Raw)
}

/// Decode final bytecode; label operands become absolute targets
pub fn decode_final(code: &[u8]) -> Result<Vec<Insn>> {
    decode(code, Phase::Final)
}

/// Offset of the label operand from the start of the instruction
fn label_operand_offset(format: Format) -> usize {
    match format {
        Format::AtomLabelU8 | Format::AtomLabelU16 => 5,
        _ => 1,
    }
}

fn write_operands(out: &mut Vec<u8>, format: Format, arg: Arg, label_value: u32) {
    let int = arg.int().unwrap_or(0);
    let atom = arg.atom().map(Atom::id).unwrap_or(0);
    match format {
        Format::None
        | Format::NoneInt
        | Format::NoneLoc
        | Format::NoneArg
        | Format::NoneVarRef
        | Format::Npopx => {}
        Format::U8 | Format::I8 | Format::Loc8 | Format::Const8 => out.push(int as u8),
        Format::U16 | Format::I16 | Format::Npop | Format::Loc | Format::Arg | Format::VarRef => {
            out.extend_from_slice(&(int as u16).to_le_bytes())
        }
        Format::NpopU16 => {
            if let Arg::IntPair(a, b) = arg {
                out.extend_from_slice(&(a as u16).to_le_bytes());
                out.extend_from_slice(&(b as u16).to_le_bytes());
            } else {
                out.extend_from_slice(&[0; 4]);
            }
        }
        Format::U32 | Format::I32 | Format::Const => out.extend_from_slice(&(int as u32).to_le_bytes()),
        Format::Atom => out.extend_from_slice(&atom.to_le_bytes()),
        Format::AtomU8 => {
            out.extend_from_slice(&atom.to_le_bytes());
            out.push(int as u8);
        }
        Format::AtomU16 => {
            out.extend_from_slice(&atom.to_le_bytes());
            out.extend_from_slice(&(int as u16).to_le_bytes());
        }
        Format::Label8 => out.push(label_value as u8),
        Format::Label16 => out.extend_from_slice(&(label_value as u16).to_le_bytes()),
        Format::Label => out.extend_from_slice(&label_value.to_le_bytes()),
        Format::AtomLabelU8 => {
            out.extend_from_slice(&atom.to_le_bytes());
            out.extend_from_slice(&label_value.to_le_bytes());
            out.push(int as u8);
        }
        Format::AtomLabelU16 => {
            out.extend_from_slice(&atom.to_le_bytes());
            out.extend_from_slice(&label_value.to_le_bytes());
            out.extend_from_slice(&(int as u16).to_le_bytes());
        }
        Format::LabelU16 => {
            out.extend_from_slice(&label_value.to_le_bytes());
            out.extend_from_slice(&(int as u16).to_le_bytes());
        }
    }
}

/// Encode instructions back into a raw stream, label ids kept as-is
pub fn encode_raw(insns: &[Insn]) -> Vec<u8> {
    let mut out = Vec::with_capacity(insns.len() * 3);
    for insn in insns {
        out.push(insn.op.to_byte());
        write_operands(&mut out, insn.op.format(), insn.arg, insn.arg.label().unwrap_or(0));
    }
    out
}

/// Result of laying out an instruction list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembled {
    pub code: Vec<u8>,
    /// (pc, line) pairs, one per line change
    pub lines: Vec<(u32, u32)>,
}

fn widen(op: Opcode) -> Option<Opcode> {
    match op {
        Opcode::Goto8 => Some(Opcode::Goto16),
        Opcode::Goto16 => Some(Opcode::Goto),
        Opcode::IfFalse8 => Some(Opcode::IfFalse),
        Opcode::IfTrue8 => Some(Opcode::IfTrue),
        _ => None,
    }
}

fn fits(format: Format, rel: i64) -> bool {
    match format {
        Format::Label8 => i8::try_from(rel).is_ok(),
        Format::Label16 => i16::try_from(rel).is_ok(),
        _ => i32::try_from(rel).is_ok(),
    }
}

/// Lay out an instruction list: drop label and line markers, resolve
/// every label operand to a relative offset, and widen short jumps whose
/// distance does not fit. Widening is monotone, so the loop terminates.
pub fn assemble(insns: &[Insn]) -> Result<Assembled> {
    let mut insns = insns.to_vec();
    for insn in &insns {
        if let Op::Temp(op) = insn.op {
            if op != TempOpcode::Label && op != TempOpcode::LineNum {
                return Err(Error::internal(format!(
                    "temporary opcode {} survived resolution",
                    op
                )));
            }
        }
    }

    let mut bound: FxHashMap<LabelId, usize> = FxHashMap::default();
    let mut positions = vec![0usize; insns.len()];
    loop {
        bound.clear();
        let mut pc = 0usize;
        for (i, insn) in insns.iter().enumerate() {
            positions[i] = pc;
            if let Op::Temp(TempOpcode::Label) = insn.op {
                if let Some(l) = insn.arg.label() {
                    if bound.insert(l, pc).is_some() {
                        return Err(Error::internal(format!("label {} bound twice", l)));
                    }
                }
            }
            pc += insn.size();
        }

        let mut changed = false;
        for (i, insn) in insns.iter_mut().enumerate() {
            let Op::Final(op) = insn.op else { continue };
            let format = op.format();
            if !format.has_label() {
                continue;
            }
            let label = insn.arg.label().unwrap_or(0);
            let target = *bound.get(&label).ok_or(Error::UnresolvedLabel { label })?;
            let rel = target as i64 - (positions[i] + label_operand_offset(format)) as i64;
            if !fits(format, rel) {
                let wider = widen(op).ok_or_else(|| {
                    Error::internal(format!("jump distance {} does not fit {}", rel, op))
                })?;
                insn.op = Op::Final(wider);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut out = Assembled::default();
    let mut pending_line: Option<u32> = None;
    let mut last_line: Option<u32> = None;
    for (i, insn) in insns.iter().enumerate() {
        match insn.op {
            Op::Temp(TempOpcode::LineNum) => {
                pending_line = insn.arg.int().map(|n| n as u32);
            }
            Op::Temp(_) => {}
            Op::Final(op) => {
                if let Some(line) = pending_line.take() {
                    if last_line != Some(line) {
                        out.lines.push((out.code.len() as u32, line));
                        last_line = Some(line);
                    }
                }
                let format = op.format();
                let label_value = match insn.arg.label() {
                    Some(l) if format.has_label() => {
                        let target = bound[&l];
                        let rel = target as i64 - (positions[i] + label_operand_offset(format)) as i64;
                        rel as i32 as u32
                    }
                    _ => 0,
                };
                debug_assert_eq!(out.code.len(), positions[i]);
                out.code.push(op.to_byte());
                write_operands(&mut out.code, format, insn.arg, label_value);
            }
        }
    }
    Ok(out)
}

/// Turn the absolute jump targets of decoded final bytecode into label
/// markers, and reinsert line markers from a (pc, line) table.
pub fn labelize(insns: &[Insn], lines: &[(u32, u32)]) -> Vec<Insn> {
    let targets: BTreeSet<usize> = insns
        .iter()
        .filter(|i| i.op.format().has_label())
        .filter_map(|i| i.arg.label().map(|t| t as usize))
        .collect();
    let ids: FxHashMap<usize, LabelId> = targets
        .iter()
        .enumerate()
        .map(|(id, &pc)| (pc, id as LabelId))
        .collect();
    let line_at: FxHashMap<usize, u32> = lines.iter().map(|&(pc, l)| (pc as usize, l)).collect();

    let mut out = Vec::with_capacity(insns.len() + targets.len());
    let mut end = 0;
    for insn in insns {
        if let Some(&id) = ids.get(&insn.pos) {
            out.push(Insn::label(id));
        }
        if let Some(&line) = line_at.get(&insn.pos) {
            out.push(Insn::new(TempOpcode::LineNum, Arg::Int(line as i32)));
        }
        let mut copy = *insn;
        if copy.op.format().has_label() {
            if let Some(t) = copy.arg.label() {
                copy.arg = copy.arg.with_label(ids[&(t as usize)]);
            }
        }
        end = insn.pos + insn.size();
        out.push(copy);
    }
    if let Some(&id) = ids.get(&end) {
        out.push(Insn::label(id));
    }
    out
}

/// Number of labels used by a labelized list; the next free id
pub fn next_label_id(insns: &[Insn]) -> LabelId {
    insns
        .iter()
        .filter_map(|i| i.arg.label().filter(|_| i.op.format().has_label()))
        .max()
        .map(|m| m + 1)
        .unwrap_or(0)
}
