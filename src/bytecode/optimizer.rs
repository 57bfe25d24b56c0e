//! Bytecode optimization passes
//!
//! Passes work on decoded instructions with label markers (see
//! [`labelize`]) so that none of them has to care about jump offsets;
//! [`assemble`] lays the result out again. Short forms are expanded to
//! their long form first and only chosen again at the very end, which
//! makes optimizing already optimized code a no-op.

use super::insn::{assemble, decode_final, labelize, Arg, Assembled, Insn};
use super::label::LabelId;
use super::opcode::{Op, Opcode, TempOpcode};
use crate::atom::atoms;
use crate::error::Result;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

/// Configuration for the bytecode optimizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// Enable peephole rewrites
    pub peephole: bool,
    /// Enable folding of int32 arithmetic on literals
    pub constant_folding: bool,
    /// Enable jump threading
    pub jump_threading: bool,
    /// Enable dead code elimination
    pub dead_code_elimination: bool,
    /// Select the narrowest encoding of each instruction
    pub short_opcodes: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            peephole: true,
            constant_folding: true,
            jump_threading: true,
            dead_code_elimination: true,
            short_opcodes: true,
        }
    }
}

impl OptimizerConfig {
    /// Every pass disabled; code is only re-laid out
    pub fn disabled() -> Self {
        Self {
            peephole: false,
            constant_folding: false,
            jump_threading: false,
            dead_code_elimination: false,
            short_opcodes: false,
        }
    }
}

/// Bytecode optimizer
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

const MAX_ITERATIONS: usize = 10;

impl Optimizer {
    /// Create a new optimizer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an optimizer with custom configuration
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize the final bytecode of one function together with its
    /// (pc, line) table.
    pub fn optimize(&self, code: &[u8], lines: &[(u32, u32)]) -> Result<Assembled> {
        let mut insns = labelize(&decode_final(code)?, lines);
        self.optimize_insns(&mut insns);
        let out = assemble(&insns)?;
        debug!(before = code.len(), after = out.code.len(), "optimized function body");
        Ok(out)
    }

    /// Optimize a labelized instruction list in place
    pub fn optimize_insns(&self, insns: &mut Vec<Insn>) {
        for insn in insns.iter_mut() {
            canonicalize(insn);
        }

        let mut changed = true;
        let mut iterations = 0;
        while changed && iterations < MAX_ITERATIONS {
            changed = false;
            iterations += 1;

            if self.config.constant_folding {
                changed |= self.constant_folding(insns);
            }

            if self.config.peephole {
                changed |= self.peephole_optimize(insns);
            }

            if self.config.jump_threading {
                changed |= self.jump_threading(insns);
            }

            if self.config.dead_code_elimination {
                changed |= self.dead_code_elimination(insns);
            }
        }
        trace!(iterations, "optimizer reached a fixpoint");

        if self.config.short_opcodes {
            for insn in insns.iter_mut() {
                *insn = shorten(insn);
            }
        }
    }

    /// Fold `push_i32 a; push_i32 b; op` when the result is an int32 or a
    /// boolean.
    fn constant_folding(&self, insns: &mut Vec<Insn>) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < insns.len() {
            let Some(a) = int_literal(&insns[i]) else {
                i += 1;
                continue;
            };
            let Some(j) = next_in_block(insns, i + 1) else {
                i += 1;
                continue;
            };

            if insns[j].is(Opcode::Neg) && a != 0 && a != i32::MIN {
                insns[i].arg = Arg::Int(-a);
                kill(insns, j);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }
            if insns[j].is(Opcode::Plus) {
                kill(insns, j);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            let folded = int_literal(&insns[j]).and_then(|b| {
                let k = next_in_block(insns, j + 1)?;
                let op = insns[k].opcode()?;
                fold_binary(op, a, b).map(|insn| (k, insn))
            });
            match folded {
                Some((k, insn)) => {
                    insns[i] = insn;
                    kill(insns, j);
                    kill(insns, k);
                    changed = true;
                    i = prev_in_block(insns, i);
                }
                None => i += 1,
            }
        }
        compact(insns);
        changed
    }

    /// Local rewrites of adjacent instructions within a basic block
    fn peephole_optimize(&self, insns: &mut Vec<Insn>) -> bool {
        let mut changed = false;
        let mut i = 0;
        while i < insns.len() {
            let Some(op) = insns[i].opcode().filter(|op| *op != Opcode::Nop) else {
                i += 1;
                continue;
            };
            let Some(j) = next_in_block(insns, i + 1) else {
                i += 1;
                continue;
            };
            let Some(next) = insns[j].opcode() else {
                i += 1;
                continue;
            };
            let k = next_in_block(insns, j + 1);
            let third = k.and_then(|k| insns[k].opcode());
            let arg = insns[i].arg;

            // push; drop
            if next == Opcode::Drop && is_pure_push(op) {
                kill(insns, i);
                kill(insns, j);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            // put_loc x; get_loc x -> set_loc x (also args and closure vars)
            if let Some((get, put, set)) = slot_family(op) {
                if op == put && next == get && insns[j].arg == arg {
                    insns[i] = Insn::new(set, arg);
                    kill(insns, j);
                    changed = true;
                    i = prev_in_block(insns, i);
                    continue;
                }
                if op == set && next == Opcode::Drop {
                    insns[i] = Insn::new(put, arg);
                    kill(insns, j);
                    changed = true;
                    i = prev_in_block(insns, i);
                    continue;
                }
            }

            // dup; put_loc x -> set_loc x
            if op == Opcode::Dup {
                if let Some((_, _, set)) = slot_family(next).filter(|(_, put, _)| *put == next) {
                    insns[i] = Insn::new(set, insns[j].arg);
                    kill(insns, j);
                    changed = true;
                    i = prev_in_block(insns, i);
                    continue;
                }
            }

            // get_loc x; inc; put_loc x -> inc_loc x
            if op == Opcode::GetLoc && matches!(next, Opcode::Inc | Opcode::Dec) {
                if let (Some(k), Some(Opcode::PutLoc)) = (k, third) {
                    let idx = arg.int().unwrap_or(-1);
                    if insns[k].arg == arg && (0..=u8::MAX as i32).contains(&idx) {
                        let fused = if next == Opcode::Inc { Opcode::IncLoc } else { Opcode::DecLoc };
                        insns[i] = Insn::new(fused, arg);
                        kill(insns, j);
                        kill(insns, k);
                        changed = true;
                        i = prev_in_block(insns, i);
                        continue;
                    }
                }
            }

            // lnot; if_false L -> if_true L
            if op == Opcode::LNot && matches!(next, Opcode::IfFalse | Opcode::IfTrue) {
                let inverted = if next == Opcode::IfFalse { Opcode::IfTrue } else { Opcode::IfFalse };
                insns[j].op = Op::Final(inverted);
                kill(insns, i);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            // push_true; if_false L -> (nothing), push_false; if_false L -> goto L
            if matches!(op, Opcode::PushTrue | Opcode::PushFalse)
                && matches!(next, Opcode::IfFalse | Opcode::IfTrue)
            {
                let taken = (op == Opcode::PushTrue) == (next == Opcode::IfTrue);
                if taken {
                    insns[j].op = Op::Final(Opcode::Goto);
                } else {
                    kill(insns, j);
                }
                kill(insns, i);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            // insert2; put_field a; drop -> put_field a
            if let (Some(k), Some(Opcode::Drop)) = (k, third) {
                let stores = matches!(
                    (op, next),
                    (Opcode::Insert2, Opcode::PutField)
                        | (Opcode::Insert2, Opcode::PutPrivateField)
                        | (Opcode::Insert3, Opcode::PutArrayEl)
                        | (Opcode::Insert3, Opcode::PutRefValue)
                        | (Opcode::Insert4, Opcode::PutSuperValue)
                );
                if stores {
                    kill(insns, i);
                    kill(insns, k);
                    changed = true;
                    i = prev_in_block(insns, i);
                    continue;
                }
            }

            // undefined; return -> return_undef
            if op == Opcode::Undefined && next == Opcode::Return {
                insns[i] = Insn::simple(Opcode::ReturnUndef);
                kill(insns, j);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            // typeof; push_atom_value "undefined"; strict_eq -> typeof_is_undefined
            if op == Opcode::TypeOf && next == Opcode::PushAtomValue {
                if let (Some(k), Some(Opcode::StrictEq | Opcode::Eq)) = (k, third) {
                    let test = match insns[j].arg {
                        Arg::Atom(a) if a == atoms::undefined => Some(Opcode::TypeofIsUndefined),
                        Arg::Atom(a) if a == atoms::function => Some(Opcode::TypeofIsFunction),
                        _ => None,
                    };
                    if let Some(test) = test {
                        insns[i] = Insn::simple(test);
                        kill(insns, j);
                        kill(insns, k);
                        changed = true;
                        i = prev_in_block(insns, i);
                        continue;
                    }
                }
            }

            // null; strict_eq -> is_null
            if next == Opcode::StrictEq && matches!(op, Opcode::Null | Opcode::Undefined) {
                let test = if op == Opcode::Null { Opcode::IsNull } else { Opcode::IsUndefined };
                insns[i] = Insn::simple(test);
                kill(insns, j);
                changed = true;
                i = prev_in_block(insns, i);
                continue;
            }

            i += 1;
        }
        compact(insns);
        changed
    }

    /// Retarget jumps that land on an unconditional `goto`, turn a `goto`
    /// to a return into that return, and drop jumps to the next
    /// instruction.
    fn jump_threading(&self, insns: &mut Vec<Insn>) -> bool {
        let mut changed = false;
        let markers = label_markers(insns);

        for i in 0..insns.len() {
            let Some(op) = insns[i].opcode() else { continue };
            if !matches!(op, Opcode::Goto | Opcode::IfFalse | Opcode::IfTrue) {
                continue;
            }
            let Some(original) = insns[i].arg.label() else { continue };

            let mut target = original;
            for _ in 0..8 {
                let landing = markers
                    .get(&target)
                    .and_then(|&at| first_code_after(insns, at));
                match landing.map(|t| &insns[t]) {
                    Some(dest) if dest.is(Opcode::Goto) => match dest.arg.label() {
                        Some(next) if next != target && next != original => target = next,
                        _ => break,
                    },
                    _ => break,
                }
            }
            if target != original {
                insns[i].arg = Arg::Label(target);
                changed = true;
            }

            if op == Opcode::Goto {
                let landing = markers
                    .get(&target)
                    .and_then(|&at| first_code_after(insns, at))
                    .and_then(|t| insns[t].opcode());
                if let Some(ret @ (Opcode::Return | Opcode::ReturnUndef)) = landing {
                    insns[i] = Insn::simple(ret);
                    changed = true;
                }
            }
        }

        for i in 0..insns.len() {
            let Some(op) = insns[i].opcode() else { continue };
            if !matches!(op, Opcode::Goto | Opcode::IfFalse | Opcode::IfTrue) {
                continue;
            }
            let Some(label) = insns[i].arg.label() else { continue };
            if falls_through_to(insns, i + 1, label) {
                insns[i] = if op == Opcode::Goto {
                    Insn::simple(Opcode::Nop)
                } else {
                    Insn::simple(Opcode::Drop)
                };
                changed = true;
            }
        }
        compact(insns);
        changed
    }

    /// Remove instructions that follow a terminator up to the next
    /// referenced label, and drop label markers nothing jumps to.
    fn dead_code_elimination(&self, insns: &mut Vec<Insn>) -> bool {
        let referenced: FxHashSet<LabelId> = insns
            .iter()
            .filter(|insn| matches!(insn.op, Op::Final(op) if op.is_jump()))
            .filter_map(|insn| insn.arg.label())
            .collect();

        let before = insns.len();
        let mut out = Vec::with_capacity(before);
        let mut live = true;
        for insn in insns.drain(..) {
            match insn.op {
                Op::Temp(TempOpcode::Label) => {
                    if insn.arg.label().is_some_and(|l| referenced.contains(&l)) {
                        live = true;
                        out.push(insn);
                    }
                }
                Op::Temp(_) => out.push(insn),
                Op::Final(op) => {
                    if live {
                        out.push(insn);
                        if op.is_terminator() {
                            live = false;
                        }
                    }
                }
            }
        }
        *insns = out;
        insns.len() != before
    }
}

/// Integer value pushed by a `push_i32`
fn int_literal(insn: &Insn) -> Option<i32> {
    match (insn.opcode()?, insn.arg) {
        (Opcode::PushI32, Arg::Int(n)) => Some(n),
        _ => None,
    }
}

fn fold_binary(op: Opcode, a: i32, b: i32) -> Option<Insn> {
    let int = |n: i32| Insn::new(Opcode::PushI32, Arg::Int(n));
    let boolean = |b: bool| Insn::simple(if b { Opcode::PushTrue } else { Opcode::PushFalse });
    Some(match op {
        Opcode::Add => int(a.checked_add(b)?),
        Opcode::Sub => int(a.checked_sub(b)?),
        Opcode::Mul => {
            let r = a.checked_mul(b)?;
            // -0 is not an int32
            if r == 0 && (a < 0 || b < 0) {
                return None;
            }
            int(r)
        }
        Opcode::And => int(a & b),
        Opcode::Or => int(a | b),
        Opcode::Xor => int(a ^ b),
        Opcode::Shl => int(a.wrapping_shl(b as u32 & 31)),
        Opcode::Sar => int(a >> (b as u32 & 31)),
        Opcode::Lt => boolean(a < b),
        Opcode::Lte => boolean(a <= b),
        Opcode::Gt => boolean(a > b),
        Opcode::Gte => boolean(a >= b),
        Opcode::Eq | Opcode::StrictEq => boolean(a == b),
        Opcode::Neq | Opcode::StrictNeq => boolean(a != b),
        _ => return None,
    })
}

fn is_pure_push(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::PushI32
            | Opcode::PushConst
            | Opcode::PushAtomValue
            | Opcode::Undefined
            | Opcode::Null
            | Opcode::PushTrue
            | Opcode::PushFalse
            | Opcode::GetLoc
            | Opcode::GetArg
            | Opcode::GetVarRef
            | Opcode::Dup
            | Opcode::FClosure
    )
}

/// (get, put, set) opcodes of a slot kind
fn slot_family(op: Opcode) -> Option<(Opcode, Opcode, Opcode)> {
    use Opcode::*;
    match op {
        GetLoc | PutLoc | SetLoc => Some((GetLoc, PutLoc, SetLoc)),
        GetArg | PutArg | SetArg => Some((GetArg, PutArg, SetArg)),
        GetVarRef | PutVarRef | SetVarRef => Some((GetVarRef, PutVarRef, SetVarRef)),
        _ => None,
    }
}

fn kill(insns: &mut [Insn], i: usize) {
    insns[i] = Insn::simple(Opcode::Nop);
}

fn compact(insns: &mut Vec<Insn>) {
    insns.retain(|insn| !insn.is(Opcode::Nop));
}

/// Next real instruction in the same basic block; a label ends the block
fn next_in_block(insns: &[Insn], from: usize) -> Option<usize> {
    for (i, insn) in insns.iter().enumerate().skip(from) {
        match insn.op {
            Op::Temp(TempOpcode::Label) => return None,
            Op::Temp(_) | Op::Final(Opcode::Nop) => continue,
            Op::Final(_) => return Some(i),
        }
    }
    None
}

/// Previous real instruction in the same basic block, or `i` itself
fn prev_in_block(insns: &[Insn], i: usize) -> usize {
    for j in (0..i).rev() {
        match insns[j].op {
            Op::Temp(TempOpcode::Label) => return i,
            Op::Temp(_) | Op::Final(Opcode::Nop) => continue,
            Op::Final(_) => return j,
        }
    }
    i
}

/// First real instruction at or after `from`, crossing label markers
fn first_code_after(insns: &[Insn], from: usize) -> Option<usize> {
    (from..insns.len()).find(|&i| !insns[i].is_marker() && !insns[i].is(Opcode::Nop))
}

/// Does control reach `label` from `from` without executing anything?
fn falls_through_to(insns: &[Insn], from: usize, label: LabelId) -> bool {
    for insn in &insns[from.min(insns.len())..] {
        match insn.op {
            Op::Temp(TempOpcode::Label) if insn.arg.label() == Some(label) => return true,
            Op::Temp(_) | Op::Final(Opcode::Nop) => continue,
            Op::Final(_) => return false,
        }
    }
    false
}

fn label_markers(insns: &[Insn]) -> FxHashMap<LabelId, usize> {
    insns
        .iter()
        .enumerate()
        .filter(|(_, insn)| insn.op == Op::Temp(TempOpcode::Label))
        .filter_map(|(i, insn)| insn.arg.label().map(|l| (l, i)))
        .collect()
}

/// Opcode `n` places after `first`
fn nth(first: Opcode, n: i32) -> Option<Opcode> {
    let n = u8::try_from(n).ok()?;
    Opcode::from_byte(first.to_byte().checked_add(n)?)
}

/// Rewrite a short form into its long form with an explicit operand
fn canonicalize(insn: &mut Insn) {
    let Some(op) = insn.opcode() else { return };
    match op {
        Opcode::GetLength => *insn = Insn::new(Opcode::GetField, Arg::Atom(atoms::length)),
        Opcode::PushEmptyString => {
            *insn = Insn::new(Opcode::PushAtomValue, Arg::Atom(atoms::empty_string))
        }
        _ => {
            let (long, implicit) = op.long_form();
            if long != op {
                insn.op = Op::Final(long);
                if let Some(n) = implicit {
                    insn.arg = Arg::Int(n);
                }
            }
        }
    }
}

/// Narrowest encoding of a long-form instruction
fn shorten(insn: &Insn) -> Insn {
    use Opcode::*;
    let Some(op) = insn.opcode() else { return *insn };
    let implicit = |first: Opcode, n: i32| nth(first, n).map(Insn::simple);
    let short = match (op, insn.arg) {
        (PushI32, Arg::Int(-1)) => Some(Insn::simple(PushMinus1)),
        (PushI32, Arg::Int(n @ 0..=7)) => implicit(Push0, n),
        (PushI32, Arg::Int(n)) if i8::try_from(n).is_ok() => Some(Insn::new(PushI8, insn.arg)),
        (PushI32, Arg::Int(n)) if i16::try_from(n).is_ok() => Some(Insn::new(PushI16, insn.arg)),
        (PushConst, Arg::Int(n @ 0..=255)) => Some(Insn::new(PushConst8, Arg::Int(n))),
        (FClosure, Arg::Int(n @ 0..=255)) => Some(Insn::new(FClosure8, Arg::Int(n))),
        (PushAtomValue, Arg::Atom(a)) if a == atoms::empty_string => Some(Insn::simple(PushEmptyString)),
        (GetField, Arg::Atom(a)) if a == atoms::length => Some(Insn::simple(GetLength)),
        (GetLoc, Arg::Int(n @ 0..=3)) => implicit(GetLoc0, n),
        (PutLoc, Arg::Int(n @ 0..=3)) => implicit(PutLoc0, n),
        (SetLoc, Arg::Int(n @ 0..=3)) => implicit(SetLoc0, n),
        (GetLoc, Arg::Int(n @ 0..=255)) => Some(Insn::new(GetLoc8, Arg::Int(n))),
        (PutLoc, Arg::Int(n @ 0..=255)) => Some(Insn::new(PutLoc8, Arg::Int(n))),
        (SetLoc, Arg::Int(n @ 0..=255)) => Some(Insn::new(SetLoc8, Arg::Int(n))),
        (GetArg, Arg::Int(n @ 0..=3)) => implicit(GetArg0, n),
        (PutArg, Arg::Int(n @ 0..=3)) => implicit(PutArg0, n),
        (SetArg, Arg::Int(n @ 0..=3)) => implicit(SetArg0, n),
        (GetVarRef, Arg::Int(n @ 0..=3)) => implicit(GetVarRef0, n),
        (PutVarRef, Arg::Int(n @ 0..=3)) => implicit(PutVarRef0, n),
        (SetVarRef, Arg::Int(n @ 0..=3)) => implicit(SetVarRef0, n),
        (Call, Arg::Int(n @ 0..=3)) => implicit(Call0, n),
        // assemble widens jumps that do not fit
        (Goto, arg) => Some(Insn::new(Goto8, arg)),
        (IfFalse, arg) => Some(Insn::new(IfFalse8, arg)),
        (IfTrue, arg) => Some(Insn::new(IfTrue8, arg)),
        _ => None,
    };
    short.unwrap_or(*insn)
}

/// Optimize with the default configuration
pub fn optimize(code: &[u8], lines: &[(u32, u32)]) -> Result<Assembled> {
    Optimizer::new().optimize(code, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(insns: &[Insn]) -> Vec<u8> {
        assemble(insns).unwrap().code
    }

    fn ops(code: &[u8]) -> Vec<Opcode> {
        decode_final(code)
            .unwrap()
            .iter()
            .filter_map(|i| i.opcode())
            .collect()
    }

    fn only(config: impl FnOnce(&mut OptimizerConfig)) -> Optimizer {
        let mut c = OptimizerConfig::disabled();
        config(&mut c);
        Optimizer::with_config(c)
    }

    fn int(n: i32) -> Insn {
        Insn::new(Opcode::PushI32, Arg::Int(n))
    }

    #[test]
    fn test_put_then_get_becomes_set() {
        let code = build(&[
            int(1),
            Insn::new(Opcode::PutLoc, Arg::Int(4)),
            Insn::new(Opcode::GetLoc, Arg::Int(4)),
            Insn::simple(Opcode::Return),
        ]);
        let out = only(|c| c.peephole = true).optimize(&code, &[]).unwrap();
        assert_eq!(ops(&out.code), vec![Opcode::PushI32, Opcode::SetLoc, Opcode::Return]);
    }

    #[test]
    fn test_field_store_drop_collapses() {
        let code = build(&[
            Insn::new(Opcode::GetLoc, Arg::Int(0)),
            int(7),
            Insn::simple(Opcode::Insert2),
            Insn::new(Opcode::PutField, Arg::Atom(atoms::length)),
            Insn::simple(Opcode::Drop),
            Insn::simple(Opcode::ReturnUndef),
        ]);
        let out = only(|c| c.peephole = true).optimize(&code, &[]).unwrap();
        assert_eq!(
            ops(&out.code),
            vec![Opcode::GetLoc, Opcode::PushI32, Opcode::PutField, Opcode::ReturnUndef]
        );
    }

    #[test]
    fn test_negated_branch_is_inverted() {
        let code = build(&[
            Insn::new(Opcode::GetArg, Arg::Int(0)),
            Insn::simple(Opcode::TypeofIsUndefined),
            Insn::simple(Opcode::LNot),
            Insn::new(Opcode::IfFalse, Arg::Label(0)),
            Insn::simple(Opcode::Undefined),
            Insn::simple(Opcode::Drop),
            Insn::label(0),
            Insn::simple(Opcode::ReturnUndef),
        ]);
        let out = only(|c| c.peephole = true).optimize(&code, &[]).unwrap();
        assert_eq!(
            ops(&out.code),
            vec![Opcode::GetArg, Opcode::TypeofIsUndefined, Opcode::IfTrue, Opcode::ReturnUndef]
        );
    }

    #[test]
    fn test_peephole_does_not_cross_labels() {
        let insns = [
            Insn::new(Opcode::PutLoc, Arg::Int(0)),
            Insn::label(0),
            Insn::new(Opcode::GetLoc, Arg::Int(0)),
            Insn::new(Opcode::Goto, Arg::Label(0)),
        ];
        let code = build(&insns);
        let out = only(|c| c.peephole = true).optimize(&code, &[]).unwrap();
        assert_eq!(ops(&out.code), vec![Opcode::PutLoc, Opcode::GetLoc, Opcode::Goto]);
    }

    #[test]
    fn test_constant_folding() {
        let code = build(&[int(2), int(3), Insn::simple(Opcode::Add), Insn::simple(Opcode::Return)]);
        let out = optimize(&code, &[]).unwrap();
        assert_eq!(ops(&out.code), vec![Opcode::Push5, Opcode::Return]);
    }

    #[test]
    fn test_constant_folding_keeps_negative_zero() {
        let code = build(&[int(-4), int(0), Insn::simple(Opcode::Mul), Insn::simple(Opcode::Return)]);
        let out = only(|c| c.constant_folding = true).optimize(&code, &[]).unwrap();
        assert_eq!(ops(&out.code), vec![Opcode::PushI32, Opcode::PushI32, Opcode::Mul, Opcode::Return]);
    }

    #[test]
    fn test_dead_code_after_return_is_removed() {
        let code = build(&[
            Insn::new(Opcode::GetArg, Arg::Int(0)),
            Insn::new(Opcode::IfFalse, Arg::Label(0)),
            Insn::simple(Opcode::ReturnUndef),
            int(1),
            Insn::simple(Opcode::Drop),
            Insn::label(0),
            int(2),
            Insn::simple(Opcode::Return),
        ]);
        let out = only(|c| c.dead_code_elimination = true).optimize(&code, &[]).unwrap();
        assert_eq!(
            ops(&out.code),
            vec![Opcode::GetArg, Opcode::IfFalse, Opcode::ReturnUndef, Opcode::PushI32, Opcode::Return]
        );
        // the branch still lands on push 2
        let decoded = decode_final(&out.code).unwrap();
        assert_eq!(decoded[1].arg, Arg::Label(decoded[3].pos as u32));
    }

    #[test]
    fn test_jump_to_goto_is_threaded() {
        let code = build(&[
            Insn::new(Opcode::Goto, Arg::Label(0)),
            Insn::label(1),
            Insn::simple(Opcode::ReturnUndef),
            Insn::label(0),
            Insn::new(Opcode::Goto, Arg::Label(1)),
        ]);
        let out = only(|c| c.jump_threading = true).optimize(&code, &[]).unwrap();
        assert_eq!(ops(&out.code)[0], Opcode::ReturnUndef);
    }

    #[test]
    fn test_short_opcodes_pick_narrow_forms() {
        let code = build(&[
            int(3),
            int(100),
            int(1000),
            int(100_000),
            Insn::new(Opcode::GetLoc, Arg::Int(2)),
            Insn::new(Opcode::GetLoc, Arg::Int(40)),
            Insn::new(Opcode::GetLoc, Arg::Int(300)),
            Insn::new(Opcode::Call, Arg::Int(1)),
            Insn::new(Opcode::GetField, Arg::Atom(atoms::length)),
            Insn::simple(Opcode::Return),
        ]);
        let out = only(|c| c.short_opcodes = true).optimize(&code, &[]).unwrap();
        assert_eq!(
            ops(&out.code),
            vec![
                Opcode::Push3,
                Opcode::PushI8,
                Opcode::PushI16,
                Opcode::PushI32,
                Opcode::GetLoc2,
                Opcode::GetLoc8,
                Opcode::GetLoc,
                Opcode::Call1,
                Opcode::GetLength,
                Opcode::Return,
            ]
        );
    }

    #[test]
    fn test_optimizing_twice_is_a_no_op() {
        let mut insns = vec![
            Insn::new(TempOpcode::LineNum, Arg::Int(1)),
            Insn::new(Opcode::GetArg, Arg::Int(0)),
            Insn::new(Opcode::IfFalse, Arg::Label(0)),
            Insn::new(TempOpcode::LineNum, Arg::Int(2)),
            int(1),
            Insn::new(Opcode::PutLoc, Arg::Int(0)),
            Insn::new(Opcode::Goto, Arg::Label(1)),
            Insn::label(0),
        ];
        insns.extend(std::iter::repeat(Insn::simple(Opcode::Null)).take(150));
        insns.extend(std::iter::repeat(Insn::simple(Opcode::Drop)).take(150));
        insns.push(Insn::label(1));
        insns.push(Insn::new(TempOpcode::LineNum, Arg::Int(9)));
        insns.push(Insn::new(Opcode::GetLoc, Arg::Int(0)));
        insns.push(Insn::simple(Opcode::Return));
        let input = assemble(&insns).unwrap();

        let once = optimize(&input.code, &input.lines).unwrap();
        let twice = optimize(&once.code, &once.lines).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_disabled_config_preserves_code() {
        let code = build(&[
            Insn::new(Opcode::GetArg, Arg::Int(0)),
            Insn::new(Opcode::IfTrue, Arg::Label(0)),
            int(1),
            Insn::simple(Opcode::Drop),
            Insn::label(0),
            Insn::simple(Opcode::ReturnUndef),
        ]);
        let out = Optimizer::with_config(OptimizerConfig::disabled())
            .optimize(&code, &[])
            .unwrap();
        assert_eq!(out.code, code);
    }
}
