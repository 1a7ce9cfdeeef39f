/*
 * parser.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! One-shot JSON parser over a complete buffer, delivering push events.
//!
//! The input is always a fully received response body, so unlike a streaming
//! parser there is no partial-token bookkeeping: `parse` walks the slice once
//! and fails on the first malformed or trailing byte.

use crate::json::error::JsonError;
use crate::json::handler::JsonContentHandler;
use crate::json::number::JsonNumber;

/// Nesting depth guard. Graph responses nest a handful of levels; anything
/// deeper than this is rejected rather than risking the call stack.
const MAX_DEPTH: usize = 128;

/// Parse a complete JSON document, delivering events to `handler`.
pub fn parse<H: JsonContentHandler + ?Sized>(
    data: &[u8],
    handler: &mut H,
) -> Result<(), JsonError> {
    let mut p = Parser {
        data,
        pos: 0,
        depth: 0,
    };
    // UTF-8 BOM
    if p.data.len() >= 3 && p.data[..3] == [0xef, 0xbb, 0xbf] {
        p.pos = 3;
    }
    p.skip_whitespace();
    p.parse_value(handler)?;
    p.skip_whitespace();
    if p.pos != p.data.len() {
        return Err(p.err("trailing data after document"));
    }
    Ok(())
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, msg: impl Into<String>) -> JsonError {
        JsonError::new(msg, self.pos)
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), JsonError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(format!("expected '{}'", expected as char)))
        }
    }

    fn parse_value<H: JsonContentHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        match self.peek() {
            Some(b'{') => self.parse_object(handler),
            Some(b'[') => self.parse_array(handler),
            Some(b'"') => {
                let s = self.parse_string()?;
                handler.string_value(&s);
                Ok(())
            }
            Some(b't') => {
                self.parse_literal(b"true")?;
                handler.boolean_value(true);
                Ok(())
            }
            Some(b'f') => {
                self.parse_literal(b"false")?;
                handler.boolean_value(false);
                Ok(())
            }
            Some(b'n') => {
                self.parse_literal(b"null")?;
                handler.null_value();
                Ok(())
            }
            Some(b'-') | Some(b'0'..=b'9') => {
                let n = self.parse_number()?;
                handler.number_value(n);
                Ok(())
            }
            Some(_) => Err(self.err("unexpected character")),
            None => Err(self.err("unexpected end of input")),
        }
    }

    fn parse_object<H: JsonContentHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.err("nesting too deep"));
        }
        self.expect_byte(b'{')?;
        handler.start_object();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            handler.end_object();
            self.depth -= 1;
            return Ok(());
        }
        loop {
            self.skip_whitespace();
            let key = self.parse_string()?;
            handler.key(&key);
            self.skip_whitespace();
            self.expect_byte(b':')?;
            self.skip_whitespace();
            self.parse_value(handler)?;
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    handler.end_object();
                    self.depth -= 1;
                    return Ok(());
                }
                _ => return Err(self.err("expected ',' or '}'")),
            }
        }
    }

    fn parse_array<H: JsonContentHandler + ?Sized>(
        &mut self,
        handler: &mut H,
    ) -> Result<(), JsonError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.err("nesting too deep"));
        }
        self.expect_byte(b'[')?;
        handler.start_array();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            handler.end_array();
            self.depth -= 1;
            return Ok(());
        }
        loop {
            self.skip_whitespace();
            self.parse_value(handler)?;
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    handler.end_array();
                    self.depth -= 1;
                    return Ok(());
                }
                _ => return Err(self.err("expected ',' or ']'")),
            }
        }
    }

    fn parse_literal(&mut self, literal: &[u8]) -> Result<(), JsonError> {
        if self.data.len() - self.pos >= literal.len()
            && &self.data[self.pos..self.pos + literal.len()] == literal
        {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(self.err("invalid literal"))
        }
    }

    /// Parse a string token (opening quote at current position). Handles the
    /// standard escapes and \uXXXX including surrogate pairs.
    fn parse_string(&mut self) -> Result<String, JsonError> {
        self.expect_byte(b'"')?;
        let mut out = String::new();
        loop {
            let b = self.peek().ok_or_else(|| self.err("unterminated string"))?;
            match b {
                b'"' => {
                    self.pos += 1;
                    return Ok(out);
                }
                b'\\' => {
                    self.pos += 1;
                    let esc = self.peek().ok_or_else(|| self.err("unterminated escape"))?;
                    self.pos += 1;
                    match esc {
                        b'"' => out.push('"'),
                        b'\\' => out.push('\\'),
                        b'/' => out.push('/'),
                        b'b' => out.push('\u{0008}'),
                        b'f' => out.push('\u{000c}'),
                        b'n' => out.push('\n'),
                        b'r' => out.push('\r'),
                        b't' => out.push('\t'),
                        b'u' => {
                            let hi = self.parse_hex4()?;
                            let ch = if (0xd800..0xdc00).contains(&hi) {
                                // High surrogate: require a \uXXXX low surrogate.
                                if self.peek() == Some(b'\\') {
                                    self.pos += 1;
                                    self.expect_byte(b'u')?;
                                    let lo = self.parse_hex4()?;
                                    if !(0xdc00..0xe000).contains(&lo) {
                                        return Err(self.err("invalid low surrogate"));
                                    }
                                    let c = 0x10000 + ((hi - 0xd800) << 10) + (lo - 0xdc00);
                                    char::from_u32(c)
                                } else {
                                    return Err(self.err("lone high surrogate"));
                                }
                            } else if (0xdc00..0xe000).contains(&hi) {
                                return Err(self.err("lone low surrogate"));
                            } else {
                                char::from_u32(hi)
                            };
                            out.push(ch.ok_or_else(|| self.err("invalid unicode escape"))?);
                        }
                        _ => return Err(self.err("invalid escape")),
                    }
                }
                0x00..=0x1f => return Err(self.err("control character in string")),
                _ => {
                    // Copy one UTF-8 scalar; the body is UTF-8 per the API.
                    let rest = &self.data[self.pos..];
                    let s = std::str::from_utf8(&rest[..utf8_len(b).min(rest.len())])
                        .map_err(|_| self.err("invalid UTF-8 in string"))?;
                    let ch = s.chars().next().ok_or_else(|| self.err("invalid UTF-8"))?;
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    fn parse_hex4(&mut self) -> Result<u32, JsonError> {
        if self.data.len() - self.pos < 4 {
            return Err(self.err("truncated unicode escape"));
        }
        let hex = &self.data[self.pos..self.pos + 4];
        let s = std::str::from_utf8(hex).map_err(|_| self.err("invalid unicode escape"))?;
        let v = u32::from_str_radix(s, 16).map_err(|_| self.err("invalid unicode escape"))?;
        self.pos += 4;
        Ok(v)
    }

    fn parse_number(&mut self) -> Result<JsonNumber, JsonError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.data[start..self.pos])
            .map_err(|_| self.err("invalid number"))?;
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(JsonNumber::I64(n));
            }
        }
        text.parse::<f64>()
            .map(JsonNumber::F64)
            .map_err(|_| self.err("invalid number"))
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records events as strings for assertions.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl JsonContentHandler for Recorder {
        fn start_object(&mut self) {
            self.events.push("{".to_string());
        }
        fn end_object(&mut self) {
            self.events.push("}".to_string());
        }
        fn start_array(&mut self) {
            self.events.push("[".to_string());
        }
        fn end_array(&mut self) {
            self.events.push("]".to_string());
        }
        fn number_value(&mut self, number: JsonNumber) {
            self.events.push(format!("n:{:?}", number));
        }
        fn string_value(&mut self, value: &str) {
            self.events.push(format!("s:{}", value));
        }
        fn boolean_value(&mut self, value: bool) {
            self.events.push(format!("b:{}", value));
        }
        fn null_value(&mut self) {
            self.events.push("null".to_string());
        }
        fn key(&mut self, key: &str) {
            self.events.push(format!("k:{}", key));
        }
    }

    #[test]
    fn test_parse_object() {
        let mut r = Recorder::default();
        parse(br#"{"a": 1, "b": [true, null], "c": "x"}"#, &mut r).unwrap();
        assert_eq!(
            r.events,
            vec!["{", "k:a", "n:I64(1)", "k:b", "[", "b:true", "null", "]", "k:c", "s:x", "}"]
        );
    }

    #[test]
    fn test_parse_escapes() {
        let mut r = Recorder::default();
        parse(r#"{"s": "a\nbé😀é"}"#.as_bytes(), &mut r).unwrap();
        assert_eq!(r.events[2], "s:a\nb\u{e9}\u{1f600}\u{e9}");
    }

    #[test]
    fn test_surrogate_pair_escape() {
        let mut r = Recorder::default();
        parse(br#"["\ud83d\ude00"]"#, &mut r).unwrap();
        assert_eq!(r.events[1], "s:\u{1f600}");
    }

    #[test]
    fn test_parse_numbers() {
        let mut r = Recorder::default();
        parse(b"[0, -5, 3.5, 1e3]", &mut r).unwrap();
        assert_eq!(
            r.events,
            vec!["[", "n:I64(0)", "n:I64(-5)", "n:F64(3.5)", "n:F64(1000.0)", "]"]
        );
    }

    #[test]
    fn test_rejects_trailing_data() {
        let mut r = Recorder::default();
        assert!(parse(b"{} {}", &mut r).is_err());
    }

    #[test]
    fn test_rejects_trailing_comma() {
        let mut r = Recorder::default();
        assert!(parse(br#"{"a": 1,}"#, &mut r).is_err());
    }

    #[test]
    fn test_rejects_unterminated_string() {
        let mut r = Recorder::default();
        assert!(parse(br#"{"a": "x"#, &mut r).is_err());
    }

    #[test]
    fn test_non_ascii_passthrough() {
        let mut r = Recorder::default();
        parse("[\"scadenza: 15 marzo\u{00a0}2025\"]".as_bytes(), &mut r).unwrap();
        assert_eq!(r.events[1], "s:scadenza: 15 marzo\u{a0}2025");
    }
}
