//! Variable-length count prefix
//!
//! Counts below 128 take one byte; larger counts are written as
//! `0x80 | n` followed by `n` big-endian bytes.

use hes_core::{DlmsError, DlmsResult};

pub fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Decode a count prefix, returning `(count, bytes consumed)`
pub fn decode_length(bytes: &[u8]) -> DlmsResult<(usize, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| DlmsError::protocol("Truncated data: missing length"))?;
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let length_of_length = (first & 0x7F) as usize;
    if length_of_length == 0 || length_of_length > 4 {
        return Err(DlmsError::protocol(format!(
            "Invalid length-of-length: {}",
            length_of_length
        )));
    }
    let body = bytes
        .get(1..1 + length_of_length)
        .ok_or_else(|| DlmsError::protocol("Truncated data: incomplete long length"))?;
    let len = body.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((len, 1 + length_of_length))
}
