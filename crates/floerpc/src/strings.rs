//! # String Escaping
//!
//! Backslash escaping shared by identity strings, facets and proxy strings.
//!
//! Escapes: `\\`, `\'`, `\"`, `\b`, `\f`, `\n`, `\r`, `\t`, up to three octal
//! digits for other control characters, and `\c` for any caller-chosen special
//! character `c`.

use crate::error::Error;
use crate::error::Result;

/// Escapes `s`, additionally backslash-escaping every character in `special`.
pub fn escape(s: &str, special: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if special.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Reverses `escape`.
///
/// # Errors
/// Returns `Error::Malformed` on a trailing backslash or an octal escape above
/// 255, and `Error::InvalidUtf8` if octal escapes produce invalid UTF-8.
pub fn unescape(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&c) = bytes.get(i) else {
            return Err(Error::Malformed(format!("trailing backslash in `{}`", s)));
        };
        match c {
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'0'..=b'7' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + (bytes[i] - b'0') as u32;
                    digits += 1;
                    i += 1;
                }
                if value > 255 {
                    return Err(Error::Malformed(format!("octal escape above 255 in `{}`", s)));
                }
                out.push(value as u8);
                continue;
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8(out).map_err(|_| Error::InvalidUtf8)
}

/// Byte offset of the first occurrence of `ch` not preceded by a backslash.
pub fn find_unescaped(s: &str, ch: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ch {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrip_with_specials() {
        let raw = "a/b\\c\"d'\n\u{1}";
        let escaped = escape(raw, "/");
        assert_eq!(escaped, "a\\/b\\\\c\\\"d\\'\\n\\001");
        assert_eq!(unescape(&escaped).unwrap(), raw);
    }

    #[test]
    fn unescape_rejects_trailing_backslash() {
        assert!(matches!(unescape("abc\\"), Err(Error::Malformed(_))));
    }

    #[test]
    fn unescape_rejects_large_octal() {
        assert!(unescape("\\777").is_err());
    }

    #[test]
    fn unicode_passes_through() {
        assert_eq!(unescape(&escape("añ🦀", "")).unwrap(), "añ🦀");
    }

    #[test]
    fn find_unescaped_skips_escaped() {
        assert_eq!(find_unescaped("a\\/b/c", '/'), Some(4));
        assert_eq!(find_unescaped("a\\/b", '/'), None);
    }
}
