// src/mutf8.rs

//! Modified UTF-8 as used by class-file constant pools and Java data streams
//!
//! Differs from standard UTF-8 in two ways: U+0000 is encoded as the two
//! bytes `C0 80`, and supplementary characters are encoded as a surrogate
//! pair with each half taking three bytes.

use std::fmt;

/// Bytes that are not valid modified UTF-8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutf8Error {
    pub offset: usize,
}

impl fmt::Display for Mutf8Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid modified UTF-8 at byte {}", self.offset)
    }
}

impl std::error::Error for Mutf8Error {}

/// Decode modified UTF-8 into a string
///
/// Unpaired surrogates are replaced with U+FFFD.
pub fn decode(bytes: &[u8]) -> Result<String, Mutf8Error> {
    // Fast path: plain ASCII with no embedded NUL is identical in both encodings
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        // All bytes are ASCII, so this cannot fail
        return String::from_utf8(bytes.to_vec()).map_err(|_| Mutf8Error { offset: 0 });
    }

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let err = Mutf8Error { offset: i };
        match b0 {
            0x01..=0x7f => {
                units.push(b0 as u16);
                i += 1;
            }
            0xc0..=0xdf => {
                let b1 = *bytes.get(i + 1).ok_or(err.clone())?;
                if b1 & 0xc0 != 0x80 {
                    return Err(err);
                }
                units.push((((b0 & 0x1f) as u16) << 6) | (b1 & 0x3f) as u16);
                i += 2;
            }
            0xe0..=0xef => {
                let b1 = *bytes.get(i + 1).ok_or(err.clone())?;
                let b2 = *bytes.get(i + 2).ok_or(err.clone())?;
                if b1 & 0xc0 != 0x80 || b2 & 0xc0 != 0x80 {
                    return Err(err);
                }
                units.push(
                    (((b0 & 0x0f) as u16) << 12) | (((b1 & 0x3f) as u16) << 6) | (b2 & 0x3f) as u16,
                );
                i += 3;
            }
            _ => return Err(err),
        }
    }

    Ok(char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect())
}

/// Encode a string as modified UTF-8
pub fn encode(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut buf = [0u16; 2];
    for ch in s.chars() {
        for &unit in ch.encode_utf16(&mut buf).iter() {
            match unit {
                0x0001..=0x007f => out.push(unit as u8),
                0x0000 | 0x0080..=0x07ff => {
                    out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                    out.push(0x80 | (unit & 0x3f) as u8);
                }
                _ => {
                    out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                    out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                    out.push(0x80 | (unit & 0x3f) as u8);
                }
            }
        }
    }
    out
}
