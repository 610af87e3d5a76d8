//! Minimal recursive-descent JSON tokenizer.
//!
//! Produces a flat stream of [`Event`]s rather than a retained value tree —
//! the handler-stack engine in [`crate::handler`] consumes that stream in a
//! single forward pass, so no intermediate DOM is ever materialized. Strings
//! are borrowed from the input when they contain no escapes, and owned only
//! when unescaping is required.

use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    ObjectBegin,
    ObjectEnd,
    ArrayBegin,
    ArrayEnd,
    Key(Cow<'a, str>),
    String(Cow<'a, str>),
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TokenizeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("unexpected byte {0:?} at offset {1}")]
    UnexpectedByte(char, usize),
    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),
    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),
    #[error("trailing data after document at offset {0}")]
    TrailingData(usize),
}

/// Tokenize a complete JSON document into a flat event stream.
pub fn tokenize(input: &str) -> Result<Vec<Event<'_>>, TokenizeError> {
    let mut lexer = Lexer {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let mut events = Vec::new();
    lexer.skip_ws();
    lexer.value(&mut events)?;
    lexer.skip_ws();
    if lexer.pos != lexer.bytes.len() {
        return Err(TokenizeError::TrailingData(lexer.pos));
    }
    Ok(events)
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), TokenizeError> {
        match self.bump() {
            Some(c) if c == b => Ok(()),
            Some(c) => Err(TokenizeError::UnexpectedByte(c as char, self.pos - 1)),
            None => Err(TokenizeError::UnexpectedEof(self.pos)),
        }
    }

    fn literal(&mut self, lit: &'static [u8]) -> Result<(), TokenizeError> {
        for &want in lit {
            self.expect(want)?;
        }
        Ok(())
    }

    fn value(&mut self, out: &mut Vec<Event<'a>>) -> Result<(), TokenizeError> {
        self.skip_ws();
        match self.peek() {
            Some(b'{') => self.object(out),
            Some(b'[') => self.array(out),
            Some(b'"') => {
                let s = self.string()?;
                out.push(Event::String(s));
                Ok(())
            }
            Some(b't') => {
                self.literal(b"true")?;
                out.push(Event::Bool(true));
                Ok(())
            }
            Some(b'f') => {
                self.literal(b"false")?;
                out.push(Event::Bool(false));
                Ok(())
            }
            Some(b'n') => {
                self.literal(b"null")?;
                out.push(Event::Null);
                Ok(())
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => self.number(out),
            Some(b) => Err(TokenizeError::UnexpectedByte(b as char, self.pos)),
            None => Err(TokenizeError::UnexpectedEof(self.pos)),
        }
    }

    fn object(&mut self, out: &mut Vec<Event<'a>>) -> Result<(), TokenizeError> {
        self.expect(b'{')?;
        out.push(Event::ObjectBegin);
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            out.push(Event::ObjectEnd);
            return Ok(());
        }
        loop {
            self.skip_ws();
            let key = self.string()?;
            out.push(Event::Key(key));
            self.skip_ws();
            self.expect(b':')?;
            self.value(out)?;
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => break,
                Some(c) => return Err(TokenizeError::UnexpectedByte(c as char, self.pos - 1)),
                None => return Err(TokenizeError::UnexpectedEof(self.pos)),
            }
        }
        out.push(Event::ObjectEnd);
        Ok(())
    }

    fn array(&mut self, out: &mut Vec<Event<'a>>) -> Result<(), TokenizeError> {
        self.expect(b'[')?;
        out.push(Event::ArrayBegin);
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            out.push(Event::ArrayEnd);
            return Ok(());
        }
        loop {
            self.value(out)?;
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => break,
                Some(c) => return Err(TokenizeError::UnexpectedByte(c as char, self.pos - 1)),
                None => return Err(TokenizeError::UnexpectedEof(self.pos)),
            }
        }
        out.push(Event::ArrayEnd);
        Ok(())
    }

    fn string(&mut self) -> Result<Cow<'a, str>, TokenizeError> {
        self.expect(b'"')?;
        let start = self.pos;
        // Fast path: scan for the first escape or closing quote without allocating.
        let mut i = self.pos;
        loop {
            match self.bytes.get(i) {
                Some(b'"') => {
                    let s = std::str::from_utf8(&self.bytes[start..i])
                        .map_err(|_| TokenizeError::InvalidEscape(start))?;
                    self.pos = i + 1;
                    return Ok(Cow::Borrowed(s));
                }
                Some(b'\\') => break,
                Some(_) => i += 1,
                None => return Err(TokenizeError::UnexpectedEof(i)),
            }
        }
        // Slow path: unescape into an owned buffer, copying plain runs between escapes.
        let mut buf = String::new();
        buf.push_str(
            std::str::from_utf8(&self.bytes[start..i])
                .map_err(|_| TokenizeError::InvalidEscape(start))?,
        );
        self.pos = i;
        loop {
            match self.bytes.get(self.pos) {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Cow::Owned(buf));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let esc = *self
                        .bytes
                        .get(self.pos)
                        .ok_or(TokenizeError::UnexpectedEof(self.pos))?;
                    self.pos += 1;
                    match esc {
                        b'"' => buf.push('"'),
                        b'\\' => buf.push('\\'),
                        b'/' => buf.push('/'),
                        b'b' => buf.push('\u{0008}'),
                        b'f' => buf.push('\u{000C}'),
                        b'n' => buf.push('\n'),
                        b'r' => buf.push('\r'),
                        b't' => buf.push('\t'),
                        b'u' => {
                            let cp = self.hex4()?;
                            buf.push(
                                char::from_u32(cp as u32)
                                    .ok_or(TokenizeError::InvalidEscape(self.pos))?,
                            );
                        }
                        _ => return Err(TokenizeError::InvalidEscape(self.pos - 1)),
                    }
                }
                Some(_) => {
                    let run_start = self.pos;
                    let mut j = self.pos;
                    while let Some(&b) = self.bytes.get(j) {
                        if b == b'"' || b == b'\\' {
                            break;
                        }
                        j += 1;
                    }
                    if self.bytes.get(j).is_none() {
                        return Err(TokenizeError::UnexpectedEof(j));
                    }
                    let chunk = std::str::from_utf8(&self.bytes[run_start..j])
                        .map_err(|_| TokenizeError::InvalidEscape(run_start))?;
                    buf.push_str(chunk);
                    self.pos = j;
                }
                None => return Err(TokenizeError::UnexpectedEof(self.pos)),
            }
        }
    }

    fn hex4(&mut self) -> Result<u16, TokenizeError> {
        let mut v: u16 = 0;
        for _ in 0..4 {
            let b = self.bump().ok_or(TokenizeError::UnexpectedEof(self.pos))?;
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(TokenizeError::InvalidEscape(self.pos - 1)),
            };
            v = v * 16 + digit as u16;
        }
        Ok(v)
    }

    fn number(&mut self, out: &mut Vec<Event<'a>>) -> Result<(), TokenizeError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' | b'e' | b'E' | b'+' | b'-' => {
                    is_float = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text =
            std::str::from_utf8(&self.bytes[start..self.pos]).expect("ascii number text");
        if is_float {
            let v: f64 = text
                .parse()
                .map_err(|_| TokenizeError::InvalidNumber(start))?;
            out.push(Event::Float(v));
        } else if text.starts_with('-') {
            let v: i64 = text.parse().map_err(|_| TokenizeError::InvalidNumber(start))?;
            out.push(Event::Int(v));
        } else {
            let v: u64 = text.parse().map_err(|_| TokenizeError::InvalidNumber(start))?;
            out.push(Event::UInt(v));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_flat_object() {
        let events = tokenize(r#"{"a":1,"b":"x"}"#).unwrap();
        assert_eq!(
            events,
            vec![
                Event::ObjectBegin,
                Event::Key(Cow::Borrowed("a")),
                Event::UInt(1),
                Event::Key(Cow::Borrowed("b")),
                Event::String(Cow::Borrowed("x")),
                Event::ObjectEnd,
            ]
        );
    }

    #[test]
    fn unescapes_strings() {
        let events = tokenize(r#"{"a":"line\nbreak \"quoted\""}"#).unwrap();
        assert_eq!(
            events[2],
            Event::String(Cow::Owned("line\nbreak \"quoted\"".to_string()))
        );
    }

    #[test]
    fn nested_object_and_array() {
        let events = tokenize(r#"{"n":{"x":1},"xs":[1,2,3]}"#).unwrap();
        assert_eq!(events.first(), Some(&Event::ObjectBegin));
        assert!(events.contains(&Event::ArrayBegin));
        assert!(events.contains(&Event::ArrayEnd));
    }

    #[test]
    fn rejects_trailing_data() {
        let err = tokenize(r#"{"a":1} garbage"#).unwrap_err();
        assert!(matches!(err, TokenizeError::TrailingData(_)));
    }
}
