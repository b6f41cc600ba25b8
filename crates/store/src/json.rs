//! JSON encoding for shard lines and dictionary files.
//!
//! Output is HTML-safe: `<`, `>`, `&`, U+2028 and U+2029 are written as
//! `\uXXXX` escapes, which is how every other writer of these files encodes
//! them. Escapes only occur inside strings, so rewriting them after
//! serialisation cannot change the structure.

use serde::Serialize;

use crate::errors::{StoreError, StoreResult};

/// Compact encoding followed by `\n`.
pub(crate) fn to_line<T: Serialize>(value: &T, what: &'static str) -> StoreResult<Vec<u8>> {
    let raw = serde_json::to_vec(value).map_err(|source| StoreError::Encode { what, source })?;
    let mut line = escape_html(raw);
    line.push(b'\n');
    Ok(line)
}

/// Two-space indented encoding followed by `\n`.
pub(crate) fn to_document<T: Serialize>(value: &T, what: &'static str) -> StoreResult<Vec<u8>> {
    let raw =
        serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode { what, source })?;
    let mut document = escape_html(raw);
    document.push(b'\n');
    Ok(document)
}

fn escape_html(raw: Vec<u8>) -> Vec<u8> {
    if !raw.iter().any(|byte| matches!(byte, b'<' | b'>' | b'&' | 0xE2)) {
        return raw;
    }

    let mut out = Vec::with_capacity(raw.len() + 16);
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'<' => out.extend_from_slice(br"\u003c"),
            b'>' => out.extend_from_slice(br"\u003e"),
            b'&' => out.extend_from_slice(br"\u0026"),
            // U+2028 / U+2029 are E2 80 A8 / E2 80 A9
            0xE2 if raw.get(i + 1) == Some(&0x80)
                && matches!(raw.get(i + 2), Some(&(0xA8 | 0xA9))) =>
            {
                let escape: &[u8] = if raw[i + 2] == 0xA8 {
                    br"\u2028"
                } else {
                    br"\u2029"
                };
                out.extend_from_slice(escape);
                i += 3;
                continue;
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    out
}
