//! Single-line teleinfo validation.
//!
//! A line is `LABEL SP VALUE SP CHECKSUM`, possibly wrapped in STX/ETX
//! and CR/LF.  The checksum is computed over `LABEL SP VALUE`:
//!
//! ```text
//! checksum = ((Σ chars) & 0x3F) + 0x20
//! ```
//!
//! so it is always printable, and is sometimes a space.  When it is,
//! whitespace splitting swallows it and the line has two tokens instead
//! of three.
//!
//! Nothing here fails loudly: every malformation is `None`.

use super::{Key, Value};

/// Upper bound on a cleaned line.  Anything longer is not teleinfo.
const LINE_CAPACITY: usize = 64;

/// Minimum cleaned length: `K V c` plus one more char.
const MIN_LINE_LEN: usize = 5;

/// Framing characters removed before splitting.
const fn is_framing(c: char) -> bool {
    matches!(c, '\r' | '\n' | '\x02' | '\x03')
}

/// One validated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: Key,
    pub value: Value,
}

/// Checksum character for `key SP value`.
pub fn checksum(key: &str, value: &str) -> char {
    let sum = key
        .chars()
        .chain(core::iter::once(' '))
        .chain(value.chars())
        .fold(0u32, |acc, c| acc.wrapping_add(c as u32));
    char::from(((sum & 0x3f) + 0x20) as u8)
}

/// Decode one raw line.  `None` on bad UTF-8, wrong token count,
/// checksum mismatch or oversize fields.
pub fn parse_line(raw: &[u8]) -> Option<Field> {
    let text = core::str::from_utf8(raw).ok()?;

    let mut cleaned = heapless::String::<LINE_CAPACITY>::new();
    for c in text.chars().filter(|c| !is_framing(*c)) {
        cleaned.push(c).ok()?;
    }
    if cleaned.chars().count() < MIN_LINE_LEN || !cleaned.contains(' ') {
        return None;
    }

    let trailing = cleaned.chars().next_back()?;
    let mut tokens = cleaned.split_whitespace();
    let key = tokens.next()?;
    let value = tokens.next()?;
    match (tokens.next(), tokens.next()) {
        // Checksum is a space, swallowed by the split.
        (None, _) if trailing == ' ' => {}
        (Some(sum), None) if sum.chars().count() == 1 && sum.ends_with(trailing) => {}
        _ => return None,
    }

    if checksum(key, value) != trailing {
        return None;
    }

    Some(Field {
        key: Key::try_from(key).ok()?,
        value: Value::try_from(value).ok()?,
    })
}
