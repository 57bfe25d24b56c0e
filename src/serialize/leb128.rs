//! LEB128 integers as used by the bytecode object format
//!
//! Signed values are zigzag-mapped before encoding, so small negative
//! numbers stay short.

use crate::error::{Error, Result};

/// Append an unsigned LEB128 value
pub fn write_u32(out: &mut Vec<u8>, mut v: u32) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Append a zigzag-mapped signed LEB128 value
pub fn write_i32(out: &mut Vec<u8>, v: i32) {
    write_u32(out, ((v as u32) << 1) ^ ((v >> 31) as u32));
}

/// Read an unsigned LEB128 value at `pos`, returning it with the number
/// of bytes consumed.
pub fn read_u32(buf: &[u8], pos: usize) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = *buf
            .get(pos + i)
            .ok_or_else(|| Error::deserialize("truncated leb128 value", pos + i))?;
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::deserialize("leb128 value longer than 5 bytes", pos))
}

/// Read a zigzag-mapped signed LEB128 value
pub fn read_i32(buf: &[u8], pos: usize) -> Result<(i32, usize)> {
    let (v, n) = read_u32(buf, pos)?;
    Ok((((v >> 1) as i32) ^ -((v & 1) as i32), n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_encoding() {
        let mut out = Vec::new();
        write_u32(&mut out, 0);
        write_u32(&mut out, 127);
        write_u32(&mut out, 128);
        write_u32(&mut out, u32::MAX);
        assert_eq!(out, vec![0, 0x7f, 0x80, 0x01, 0xff, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(read_u32(&out, 2).unwrap(), (128, 2));
        assert_eq!(read_u32(&out, 4).unwrap(), (u32::MAX, 5));
    }

    #[test]
    fn test_signed_values_are_zigzagged() {
        for (v, expected) in [(0, vec![0]), (-1, vec![1]), (1, vec![2]), (-64, vec![127])] {
            let mut out = Vec::new();
            write_i32(&mut out, v);
            assert_eq!(out, expected, "{}", v);
            assert_eq!(read_i32(&out, 0).unwrap(), (v, out.len()));
        }
        let mut out = Vec::new();
        write_i32(&mut out, i32::MIN);
        assert_eq!(read_i32(&out, 0).unwrap().0, i32::MIN);
    }

    #[test]
    fn test_truncated_input() {
        assert!(read_u32(&[0x80, 0x80], 0).is_err());
    }
}
