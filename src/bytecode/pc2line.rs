//! Compact pc-to-line table
//!
//! Each entry is a (pc delta, line delta) pair. Small deltas pack into a
//! single byte; anything else is written as a zero byte followed by an
//! unsigned LEB128 pc delta and a signed LEB128 line delta.

use crate::error::Result;
use crate::serialize::leb128;

pub const PC2LINE_BASE: i32 = -1;
pub const PC2LINE_RANGE: i32 = 5;
pub const PC2LINE_OP_FIRST: i32 = 1;
pub const PC2LINE_DIFF_PC_MAX: i32 = (255 - PC2LINE_OP_FIRST) / PC2LINE_RANGE;

/// Encode (pc, line) pairs starting from `base_line`
pub fn encode(base_line: u32, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut last_pc = 0u32;
    let mut last_line = base_line;
    for &(pc, line) in entries {
        let diff_pc = pc.saturating_sub(last_pc) as i32;
        let diff_line = line as i32 - last_line as i32;
        if diff_line == 0 && diff_pc == 0 {
            continue;
        }
        if (PC2LINE_BASE..PC2LINE_BASE + PC2LINE_RANGE).contains(&diff_line)
            && diff_pc <= PC2LINE_DIFF_PC_MAX
        {
            out.push(((diff_line - PC2LINE_BASE) + diff_pc * PC2LINE_RANGE + PC2LINE_OP_FIRST) as u8);
        } else {
            out.push(0);
            leb128::write_u32(&mut out, diff_pc as u32);
            leb128::write_i32(&mut out, diff_line);
        }
        last_pc = pc;
        last_line = line;
    }
    out
}

/// Decode a table produced by [`encode`]
pub fn decode(buf: &[u8], base_line: u32) -> Result<Vec<(u32, u32)>> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut pc = 0u32;
    let mut line = base_line as i64;
    while pos < buf.len() {
        let op = buf[pos] as i32;
        pos += 1;
        let (diff_pc, diff_line) = if op == 0 {
            let (dpc, n) = leb128::read_u32(buf, pos)?;
            pos += n;
            let (dline, n) = leb128::read_i32(buf, pos)?;
            pos += n;
            (dpc, dline)
        } else {
            let v = op - PC2LINE_OP_FIRST;
            ((v / PC2LINE_RANGE) as u32, v % PC2LINE_RANGE + PC2LINE_BASE)
        };
        pc += diff_pc;
        line += diff_line as i64;
        out.push((pc, line.max(0) as u32));
    }
    Ok(out)
}
