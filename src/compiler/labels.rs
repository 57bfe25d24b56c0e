//! Label resolution and stack depth analysis
//!
//! By the time a function gets here its raw stream only contains final
//! opcodes plus `label` and `line_num` markers. Laying it out resolves
//! every label to a relative offset and collects the (pc, line) table.

use super::FunctionDef;
use crate::bytecode::insn::{self, Assembled, Insn};
use crate::bytecode::{Arg, Opcode};
use crate::error::{Error, Result};
use tracing::warn;

/// Lay out the resolved raw stream of a function
pub(crate) fn resolve_labels(fd: &FunctionDef) -> Result<Assembled> {
    let insns = insn::decode_raw(fd.buf.as_bytes())?;
    insn::assemble(&insns)
}

/// Depth change to apply at the target of a branch, relative to the depth
/// after the branch instruction itself has executed.
fn target_adjust(op: Opcode) -> i32 {
    match op {
        Opcode::Gosub => 1,
        Opcode::WithGetVar | Opcode::WithDeleteVar => 1,
        Opcode::WithMakeRef | Opcode::WithGetRef | Opcode::WithGetRefUndef => 2,
        Opcode::WithPutVar => -1,
        _ => 0,
    }
}

/// Maximum operand stack depth of final bytecode.
///
/// Every reachable instruction is visited with the depth it executes at.
/// Two paths reaching the same instruction with different depths indicate
/// an emitter inconsistency; the larger depth is kept so the frame is never
/// undersized.
pub fn compute_stack_size(code: &[u8]) -> Result<u16> {
    let insns = insn::decode_final(code)?;
    if insns.is_empty() {
        return Ok(0);
    }
    let index_of = |pos: usize| insns.binary_search_by_key(&pos, |i| i.pos).ok();

    let mut depth_at: Vec<Option<i32>> = vec![None; insns.len()];
    let mut worklist = vec![(0usize, 0i32)];
    let mut max_depth = 0i32;

    while let Some((start, depth)) = worklist.pop() {
        let mut idx = start;
        let mut depth = depth;
        loop {
            let Some(insn) = insns.get(idx) else { break };
            match depth_at[idx] {
                Some(seen) if seen >= depth => {
                    if seen != depth {
                        warn!(pc = insn.pos, seen, depth, "inconsistent stack depth");
                    }
                    break;
                }
                Some(seen) => {
                    warn!(pc = insn.pos, seen, depth, "inconsistent stack depth");
                }
                None => {}
            }
            depth_at[idx] = Some(depth);

            let (pop, push) = insn.stack_effect();
            if (pop as i32) > depth {
                return Err(Error::internal(format!(
                    "stack underflow at pc {} ({} needs {}, depth {})",
                    insn.pos,
                    insn.op.name(),
                    pop,
                    depth
                )));
            }
            depth = depth - pop as i32 + push as i32;
            max_depth = max_depth.max(depth);
            if max_depth > u16::MAX as i32 {
                return Err(Error::internal("stack size exceeds 65535"));
            }

            let Some(op) = insn.opcode() else { break };
            if op.is_jump() {
                if let Some(target) = branch_target(insn) {
                    let tidx = index_of(target).ok_or_else(|| {
                        Error::internal(format!("jump at pc {} lands inside an instruction", insn.pos))
                    })?;
                    let tdepth = depth + target_adjust(op.long_form().0);
                    max_depth = max_depth.max(tdepth);
                    worklist.push((tidx, tdepth));
                }
            }
            if op.is_terminator() {
                break;
            }
            idx += 1;
        }
    }
    Ok(max_depth as u16)
}

fn branch_target(insn: &Insn) -> Option<usize> {
    match insn.arg {
        Arg::Label(t) | Arg::AtomLabel(_, t, _) | Arg::LabelInt(t, _) => Some(t as usize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::insn::assemble;

    fn code(insns: &[Insn]) -> Vec<u8> {
        assemble(insns).unwrap().code
    }

    #[test]
    fn test_straight_line_depth() {
        let c = code(&[
            Insn::new(Opcode::PushI32, Arg::Int(1)),
            Insn::new(Opcode::PushI32, Arg::Int(2)),
            Insn::simple(Opcode::Add),
            Insn::simple(Opcode::Return),
        ]);
        assert_eq!(compute_stack_size(&c).unwrap(), 2);
    }

    #[test]
    fn test_branches_merge() {
        let c = code(&[
            Insn::simple(Opcode::PushTrue),
            Insn::new(Opcode::IfFalse, Arg::Label(0)),
            Insn::new(Opcode::PushI32, Arg::Int(1)),
            Insn::new(Opcode::PushI32, Arg::Int(2)),
            Insn::simple(Opcode::Drop),
            Insn::new(Opcode::Goto, Arg::Label(1)),
            Insn::label(0),
            Insn::new(Opcode::PushI32, Arg::Int(3)),
            Insn::label(1),
            Insn::simple(Opcode::Return),
        ]);
        assert_eq!(compute_stack_size(&c).unwrap(), 2);
    }

    #[test]
    fn test_gosub_target_holds_return_address() {
        let c = code(&[
            Insn::new(Opcode::Gosub, Arg::Label(0)),
            Insn::simple(Opcode::ReturnUndef),
            Insn::label(0),
            Insn::simple(Opcode::Undefined),
            Insn::simple(Opcode::Drop),
            Insn::simple(Opcode::Ret),
        ]);
        assert_eq!(compute_stack_size(&c).unwrap(), 2);
    }

    #[test]
    fn test_underflow_is_an_error() {
        let c = code(&[Insn::simple(Opcode::Drop), Insn::simple(Opcode::ReturnUndef)]);
        assert!(compute_stack_size(&c).is_err());
    }

    #[test]
    fn test_empty_code() {
        assert_eq!(compute_stack_size(&[]).unwrap(), 0);
    }
}
