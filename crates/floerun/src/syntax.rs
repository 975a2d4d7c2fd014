//! Tokenizing helpers shared by the proxy and endpoint parsers.
//!
//! Tokens are either bare (ending at whitespace or a caller-chosen stop
//! character) or wrapped in double quotes. Inside quotes a backslash escapes
//! the next character, so `\"` does not close the token. Escapes are left in
//! place for the caller to `unescape`.

/// Characters that force a token to be quoted when printed.
pub(crate) const SEPARATORS: &[char] = &[' ', '\t', '\n', '\r', ':', '@'];

pub(crate) fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.contains(SEPARATORS) {
        format!("\"{}\"", s)
    } else {
        s.to_owned()
    }
}

/// Splits `s` on every `sep` outside double quotes.
pub(crate) fn split_unquoted(s: &str, sep: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    if quoted {
        return Err("unterminated quote".into());
    }
    parts.push(&s[start..]);
    Ok(parts)
}

pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Reads one quoted or bare token. Bare tokens stop at whitespace or any
    /// character in `stop`.
    pub fn token(&mut self, stop: &[char]) -> Result<&'a str, String> {
        if self.peek() == Some('"') {
            self.advance();
            let start = self.pos;
            let mut escaped = false;
            while let Some(c) = self.peek() {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    let token = &self.input[start..self.pos];
                    self.advance();
                    return Ok(token);
                }
                self.advance();
            }
            return Err("unterminated quote".into());
        }

        let start = self.pos;
        let mut escaped = false;
        while let Some(c) = self.peek() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c.is_whitespace() || stop.contains(&c) {
                break;
            }
            self.advance();
        }
        Ok(&self.input[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_token_keeps_escapes() {
        let mut s = Scanner::new("\"a \\\" b\" rest");
        assert_eq!(s.token(&[]).unwrap(), "a \\\" b");
        s.skip_whitespace();
        assert_eq!(s.rest(), "rest");
    }

    #[test]
    fn bare_token_stops_at_stop_chars() {
        let mut s = Scanner::new("ident:tcp");
        assert_eq!(s.token(&[':', '@']).unwrap(), "ident");
        assert_eq!(s.peek(), Some(':'));
    }

    #[test]
    fn split_ignores_quoted_separators() {
        assert_eq!(
            split_unquoted("tcp -h \"a:b\":udp", ':').unwrap(),
            vec!["tcp -h \"a:b\"", "udp"]
        );
        assert!(split_unquoted("\"open", ':').is_err());
    }
}
