//! Info-hash derivation from bencoded `.torrent` payloads.
//!
//! Only the byte span of the top-level `info` value is needed, so the parser
//! walks values without materialising them.

use sha1::{Digest, Sha1};

use crate::error::MetainfoError;

const MAX_DEPTH: usize = 64;

/// SHA-1 of the raw `info` dictionary, lowercase hex.
///
/// # Errors
///
/// Returns a [`MetainfoError`] when the payload is not a bencoded dictionary
/// with an `info` entry.
pub fn info_hash(bytes: &[u8]) -> Result<String, MetainfoError> {
    let span = info_span(bytes)?;
    let digest = Sha1::digest(&bytes[span.0..span.1]);
    Ok(hex::encode(digest))
}

fn info_span(bytes: &[u8]) -> Result<(usize, usize), MetainfoError> {
    if bytes.first() != Some(&b'd') {
        return Err(MetainfoError::NotADictionary);
    }
    let mut pos = 1;
    loop {
        match bytes.get(pos) {
            None => return Err(MetainfoError::Truncated),
            Some(b'e') => return Err(MetainfoError::MissingInfo),
            Some(_) => {
                let (key, value_start) = read_string(bytes, pos)?;
                let value_end = skip_value(bytes, value_start, 1)?;
                if key == b"info" {
                    if bytes.get(value_start) != Some(&b'd') {
                        return Err(MetainfoError::UnexpectedByte {
                            offset: value_start,
                        });
                    }
                    return Ok((value_start, value_end));
                }
                pos = value_end;
            }
        }
    }
}

fn skip_value(bytes: &[u8], pos: usize, depth: usize) -> Result<usize, MetainfoError> {
    if depth > MAX_DEPTH {
        return Err(MetainfoError::TooDeep);
    }
    match bytes.get(pos) {
        None => Err(MetainfoError::Truncated),
        Some(b'i') => skip_integer(bytes, pos),
        Some(b'l') => {
            let mut cursor = pos + 1;
            loop {
                match bytes.get(cursor) {
                    None => return Err(MetainfoError::Truncated),
                    Some(b'e') => return Ok(cursor + 1),
                    Some(_) => cursor = skip_value(bytes, cursor, depth + 1)?,
                }
            }
        }
        Some(b'd') => {
            let mut cursor = pos + 1;
            loop {
                match bytes.get(cursor) {
                    None => return Err(MetainfoError::Truncated),
                    Some(b'e') => return Ok(cursor + 1),
                    Some(_) => {
                        let (_, value_start) = read_string(bytes, cursor)?;
                        cursor = skip_value(bytes, value_start, depth + 1)?;
                    }
                }
            }
        }
        Some(b'0'..=b'9') => read_string(bytes, pos).map(|(value, start)| start + value.len()),
        Some(_) => Err(MetainfoError::UnexpectedByte { offset: pos }),
    }
}

fn skip_integer(bytes: &[u8], pos: usize) -> Result<usize, MetainfoError> {
    let digits_start = pos + 1;
    let end = bytes[digits_start..]
        .iter()
        .position(|byte| *byte == b'e')
        .map(|offset| digits_start + offset)
        .ok_or(MetainfoError::Truncated)?;
    let digits = &bytes[digits_start..end];
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
        return Err(MetainfoError::MalformedNumber { offset: pos });
    }
    Ok(end + 1)
}

/// Returns the string payload and the offset just past it.
fn read_string(bytes: &[u8], pos: usize) -> Result<(&[u8], usize), MetainfoError> {
    let colon = bytes[pos..]
        .iter()
        .position(|byte| *byte == b':')
        .map(|offset| pos + offset)
        .ok_or(MetainfoError::Truncated)?;
    let digits = &bytes[pos..colon];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(MetainfoError::MalformedNumber { offset: pos });
    }
    let len = std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<usize>().ok())
        .ok_or(MetainfoError::MalformedNumber { offset: pos })?;
    let start = colon + 1;
    let end = start.checked_add(len).ok_or(MetainfoError::Truncated)?;
    if end > bytes.len() {
        return Err(MetainfoError::Truncated);
    }
    Ok((&bytes[start..end], end))
}
