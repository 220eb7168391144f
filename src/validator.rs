//! Text validation gating keys and string values before they reach the
//! storage engine.
//!
//! A byte sequence is accepted iff it contains no NUL and consists entirely
//! of TAB/LF/CR, printable ASCII, or well-formed UTF-8 multi-byte sequences
//! in the non-overlong, non-surrogate ranges. Everything else (stray
//! continuation bytes, overlong encodings, surrogate code points, values
//! above U+10FFFF, other control characters) is rejected.

fn is_continuation(byte: u8) -> bool {
    (0x80..=0xBF).contains(&byte)
}

/// Validate a raw byte sequence as storable text.
pub fn is_valid_text(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        let rest = &bytes[i..];
        let advance = match rest[0] {
            // TAB, LF, CR and the printable ASCII range
            0x09 | 0x0A | 0x0D | 0x20..=0x7E => 1,
            // two-byte sequences (C2-DF excludes overlong C0/C1)
            0xC2..=0xDF if rest.len() >= 2 && is_continuation(rest[1]) => 2,
            // E0 requires A0-BF to exclude overlong three-byte forms
            0xE0 if rest.len() >= 3
                && (0xA0..=0xBF).contains(&rest[1])
                && is_continuation(rest[2]) =>
            {
                3
            }
            // ED caps at 9F to exclude the surrogate range U+D800-DFFF
            0xED if rest.len() >= 3
                && (0x80..=0x9F).contains(&rest[1])
                && is_continuation(rest[2]) =>
            {
                3
            }
            0xE1..=0xEC | 0xEE | 0xEF
                if rest.len() >= 3 && is_continuation(rest[1]) && is_continuation(rest[2]) =>
            {
                3
            }
            // F0 requires 90-BF to exclude overlong four-byte forms
            0xF0 if rest.len() >= 4
                && (0x90..=0xBF).contains(&rest[1])
                && is_continuation(rest[2])
                && is_continuation(rest[3]) =>
            {
                4
            }
            0xF1..=0xF3
                if rest.len() >= 4
                    && is_continuation(rest[1])
                    && is_continuation(rest[2])
                    && is_continuation(rest[3]) =>
            {
                4
            }
            // F4 caps at 8F so the maximum code point is U+10FFFF
            0xF4 if rest.len() >= 4
                && (0x80..=0x8F).contains(&rest[1])
                && is_continuation(rest[2])
                && is_continuation(rest[3]) =>
            {
                4
            }
            _ => return false,
        };
        i += advance;
    }
    true
}

/// Validate an owned string (already UTF-8, but may still carry NUL or
/// control characters outside the accepted set).
pub fn is_valid_string(s: &str) -> bool {
    is_valid_text(s.as_bytes())
}
