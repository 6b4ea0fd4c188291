use bitflags::bitflags;
use serde_json::{Map, Number, Value};

use crate::tool_parser::errors::{ParserError, ParserResult};

bitflags! {
    /// Kinds of value that may be surfaced while still incomplete
    #[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
    pub struct Allow: u8 {
        const STR = 1 << 0;
        const OBJ = 1 << 1;
        const ARR = 1 << 2;
        const NUM = 1 << 3;

        const ALL = Self::STR.bits() | Self::OBJ.bits()
                  | Self::ARR.bits() | Self::NUM.bits();
    }
}

impl Allow {
    /// Only complete documents
    pub const NONE: Allow = Allow::empty();
}

/// Result of a tolerant parse
#[derive(Debug, Clone, PartialEq)]
pub struct PartialValue {
    pub value: Value,
    /// Bytes of input consumed by the value
    pub consumed: usize,
    /// Bytes at the end of the value's canonical serialization that were
    /// synthesized (implicit closers) or may still change (a number running
    /// into end of input)
    pub provisional_tail: usize,
}

impl PartialValue {
    pub fn is_complete(&self) -> bool {
        self.provisional_tail == 0
    }
}

/// Nesting limit used when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Parser for incomplete JSON
#[derive(Debug, Clone, Copy)]
pub struct PartialJson {
    /// Maximum depth for nested structures
    max_depth: usize,
}

impl PartialJson {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Parse potentially incomplete JSON.
    ///
    /// Incomplete constructs whose kind is not in `allow` are left out of the
    /// result; their enclosing container closes without them when it may
    /// itself be incomplete. Object keys are never surfaced partially.
    pub fn parse(&self, input: &str, allow: Allow) -> ParserResult<PartialValue> {
        let mut parser = Parser::new(input, self.max_depth, allow);
        let value = parser.parse_value(0)?;
        Ok(PartialValue {
            value,
            consumed: parser.position,
            provisional_tail: parser.tail,
        })
    }

    /// Parse a complete JSON document, rejecting anything after it but whitespace.
    pub fn parse_complete(&self, input: &str) -> ParserResult<Value> {
        let parsed = self.parse(input, Allow::NONE)?;
        let rest = &input.as_bytes()[parsed.consumed..];
        if rest.iter().any(|b| !is_json_whitespace(*b)) {
            return Err(ParserError::ParsingFailed(format!(
                "Trailing characters after JSON value at position {}",
                parsed.consumed
            )));
        }
        Ok(parsed.value)
    }
}

impl Default for PartialJson {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

#[inline]
fn is_json_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
}

/// Internal parser state - byte-based, only ever stops on ASCII bytes
struct Parser<'a> {
    text: &'a str,
    input: &'a [u8],
    position: usize,
    max_depth: usize,
    allow: Allow,
    tail: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, max_depth: usize, allow: Allow) -> Self {
        Self {
            text,
            input: text.as_bytes(),
            position: 0,
            max_depth,
            allow,
            tail: 0,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    #[inline]
    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if !is_json_whitespace(b) {
                break;
            }
            self.position += 1;
        }
    }

    fn unexpected(&self, expected: &str) -> ParserError {
        ParserError::ParsingFailed(format!(
            "Expected {} at position {}",
            expected, self.position
        ))
    }

    /// Close a container that ran into end of input.
    fn close_implicitly(&mut self, kind: Allow, value: Value) -> ParserResult<Value> {
        if self.allow.contains(kind) {
            self.tail += 1;
            Ok(value)
        } else {
            Err(ParserError::Incomplete)
        }
    }

    fn parse_value(&mut self, depth: usize) -> ParserResult<Value> {
        if depth > self.max_depth {
            return Err(ParserError::DepthExceeded(self.max_depth));
        }

        self.skip_whitespace();

        match self.peek() {
            None => Err(ParserError::Incomplete),
            Some(b'{') => self.parse_object(depth + 1),
            Some(b'[') => self.parse_array(depth + 1),
            Some(b'"') => {
                let allow_partial = self.allow.contains(Allow::STR);
                self.parse_string(allow_partial).map(Value::String)
            }
            Some(b't') => self.parse_literal("true", Value::Bool(true)),
            Some(b'f') => self.parse_literal("false", Value::Bool(false)),
            Some(b'n') => self.parse_literal("null", Value::Null),
            Some(b) if b == b'-' || b.is_ascii_digit() => self.parse_number(),
            Some(_) => Err(self.unexpected("a JSON value")),
        }
    }

    fn parse_object(&mut self, depth: usize) -> ParserResult<Value> {
        if depth > self.max_depth {
            return Err(ParserError::DepthExceeded(self.max_depth));
        }

        let mut object = Map::new();

        // Consume '{'
        self.advance();

        loop {
            self.skip_whitespace();

            // Key, or the end of an empty object
            match self.peek() {
                Some(b'"') => {}
                Some(b'}') if object.is_empty() => {
                    self.advance();
                    return Ok(Value::Object(object));
                }
                None => return self.close_implicitly(Allow::OBJ, Value::Object(object)),
                Some(_) => return Err(self.unexpected("string key")),
            }

            let key = match self.parse_string(false) {
                Ok(key) => key,
                Err(ParserError::Incomplete) => {
                    return self.close_implicitly(Allow::OBJ, Value::Object(object));
                }
                Err(e) => return Err(e),
            };

            self.skip_whitespace();
            match self.peek() {
                Some(b':') => self.advance(),
                None => return self.close_implicitly(Allow::OBJ, Value::Object(object)),
                Some(_) => return Err(self.unexpected("':'")),
            }

            let saved_tail = self.tail;
            match self.parse_value(depth) {
                Ok(value) => {
                    object.insert(key, value);
                }
                Err(ParserError::Incomplete) => {
                    self.tail = saved_tail;
                    return self.close_implicitly(Allow::OBJ, Value::Object(object));
                }
                Err(e) => return Err(e),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.advance(),
                Some(b'}') => {
                    self.advance();
                    return Ok(Value::Object(object));
                }
                None => return self.close_implicitly(Allow::OBJ, Value::Object(object)),
                Some(_) => return Err(self.unexpected("',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self, depth: usize) -> ParserResult<Value> {
        if depth > self.max_depth {
            return Err(ParserError::DepthExceeded(self.max_depth));
        }

        let mut array = Vec::new();

        // Consume '['
        self.advance();

        loop {
            self.skip_whitespace();

            match self.peek() {
                Some(b']') if array.is_empty() => {
                    self.advance();
                    return Ok(Value::Array(array));
                }
                None => return self.close_implicitly(Allow::ARR, Value::Array(array)),
                Some(_) => {}
            }

            let saved_tail = self.tail;
            match self.parse_value(depth) {
                Ok(value) => array.push(value),
                Err(ParserError::Incomplete) => {
                    self.tail = saved_tail;
                    return self.close_implicitly(Allow::ARR, Value::Array(array));
                }
                Err(e) => return Err(e),
            }

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.advance(),
                Some(b']') => {
                    self.advance();
                    return Ok(Value::Array(array));
                }
                None => return self.close_implicitly(Allow::ARR, Value::Array(array)),
                Some(_) => return Err(self.unexpected("',' or ']'")),
            }
        }
    }

    /// String ran into end of input. A dangling escape sequence is dropped.
    fn end_partial_string(&mut self, string: String, allow_partial: bool) -> ParserResult<String> {
        self.position = self.input.len();
        if allow_partial {
            self.tail += 1;
            Ok(string)
        } else {
            Err(ParserError::Incomplete)
        }
    }

    fn parse_string(&mut self, allow_partial: bool) -> ParserResult<String> {
        // Consume opening quote
        self.advance();

        let mut string = String::new();

        loop {
            let start = self.position;
            while let Some(b) = self.peek() {
                if b == b'"' || b == b'\\' {
                    break;
                }
                self.position += 1;
            }
            if self.position > start {
                let run = self
                    .text
                    .get(start..self.position)
                    .ok_or_else(|| self.unexpected("valid UTF-8 in string"))?;
                string.push_str(run);
            }

            match self.peek() {
                None => return self.end_partial_string(string, allow_partial),
                Some(b'"') => {
                    self.advance();
                    return Ok(string);
                }
                Some(_) => {
                    // Backslash
                    self.advance();
                    let Some(escape) = self.peek() else {
                        return self.end_partial_string(string, allow_partial);
                    };
                    self.advance();
                    match escape {
                        b'"' => string.push('"'),
                        b'\\' => string.push('\\'),
                        b'/' => string.push('/'),
                        b'b' => string.push('\u{0008}'),
                        b'f' => string.push('\u{000C}'),
                        b'n' => string.push('\n'),
                        b'r' => string.push('\r'),
                        b't' => string.push('\t'),
                        b'u' => match self.parse_unicode_escape()? {
                            Some(ch) => string.push(ch),
                            None => return self.end_partial_string(string, allow_partial),
                        },
                        _ => return Err(self.unexpected("valid escape sequence")),
                    }
                }
            }
        }
    }

    /// Returns `None` when the escape is cut off by end of input.
    fn parse_unicode_escape(&mut self) -> ParserResult<Option<char>> {
        let rest = &self.input[self.position..];
        if rest.len() < 4 {
            if rest.iter().all(u8::is_ascii_hexdigit) {
                return Ok(None);
            }
            return Err(self.unexpected("four hex digits"));
        }
        let code = hex4(&rest[..4]).ok_or_else(|| self.unexpected("four hex digits"))?;
        self.position += 4;

        if (0xD800..0xDC00).contains(&code) {
            let rest = &self.input[self.position..];
            let cut_off = rest.is_empty()
                || rest == b"\\"
                || (rest.starts_with(b"\\u")
                    && rest.len() < 6
                    && rest[2..].iter().all(u8::is_ascii_hexdigit));
            if cut_off {
                return Ok(None);
            }
            if rest.starts_with(b"\\u") {
                if let Some(low) = hex4(&rest[2..6]) {
                    if (0xDC00..0xE000).contains(&low) {
                        self.position += 6;
                        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                        return Ok(Some(char::from_u32(combined).unwrap_or('\u{FFFD}')));
                    }
                }
            }
            // Lone high surrogate
            return Ok(Some('\u{FFFD}'));
        }

        Ok(Some(char::from_u32(code).unwrap_or('\u{FFFD}')))
    }

    fn skip_digits(&mut self) {
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            self.position += 1;
        }
    }

    /// Require at least one digit; end of input here is a cut-off number.
    fn require_digits(&mut self) -> ParserResult<()> {
        match self.peek() {
            Some(b) if b.is_ascii_digit() => {
                self.skip_digits();
                Ok(())
            }
            None => Err(ParserError::Incomplete),
            Some(_) => Err(self.unexpected("digit")),
        }
    }

    fn parse_number(&mut self) -> ParserResult<Value> {
        let start = self.position;
        let mut integral = true;

        if self.peek() == Some(b'-') {
            self.advance();
        }

        match self.peek() {
            Some(b'0') => self.advance(),
            _ => self.require_digits()?,
        }

        if self.peek() == Some(b'.') {
            integral = false;
            self.advance();
            self.require_digits()?;
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            integral = false;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            self.require_digits()?;
        }

        let at_end = self.position == self.input.len();
        if at_end && !self.allow.contains(Allow::NUM) {
            return Err(ParserError::Incomplete);
        }

        let literal = self
            .text
            .get(start..self.position)
            .ok_or_else(|| self.unexpected("number"))?;

        let number = if integral {
            literal
                .parse::<i64>()
                .map(Number::from)
                .or_else(|_| literal.parse::<u64>().map(Number::from))
                .ok()
        } else {
            None
        };
        let number = match number {
            Some(n) => n,
            None => literal
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| {
                    ParserError::ParsingFailed(format!("Invalid number '{}'", literal))
                })?,
        };

        if at_end {
            self.tail += number.to_string().len();
        }

        Ok(Value::Number(number))
    }

    fn parse_literal(&mut self, word: &str, value: Value) -> ParserResult<Value> {
        let rest = &self.input[self.position..];
        if rest.starts_with(word.as_bytes()) {
            self.position += word.len();
            return Ok(value);
        }
        if word.as_bytes().starts_with(rest) {
            // Cut off by end of input
            self.position = self.input.len();
            return Err(ParserError::Incomplete);
        }
        Err(self.unexpected(word))
    }
}

/// Convenience wrapper with the default depth limit
pub fn parse_partial(input: &str, allow: Allow) -> ParserResult<PartialValue> {
    PartialJson::default().parse(input, allow)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(input: &str, allow: Allow) -> PartialValue {
        parse_partial(input, allow).unwrap()
    }

    #[test]
    fn test_allow_flags() {
        let mask = Allow::ALL & !Allow::STR;
        assert!(!mask.contains(Allow::STR));
        assert!(mask.contains(Allow::OBJ | Allow::ARR | Allow::NUM));
        assert_eq!(!Allow::ALL, Allow::NONE);
        assert_eq!(Allow::STR | Allow::OBJ | Allow::ARR | Allow::NUM, Allow::ALL);
    }

    #[test]
    fn test_complete_json() {
        let result = parse(r#"{"name": "test", "value": 42}"#, Allow::NONE);
        assert_eq!(result.value, json!({"name": "test", "value": 42}));
        assert!(result.is_complete());
        assert_eq!(result.consumed, 29);
    }

    #[test]
    fn test_partial_string_closes_implicitly() {
        let result = parse(r#"{"city": "Par"#, Allow::ALL);
        assert_eq!(result.value, json!({"city": "Par"}));
        // closing quote and closing brace
        assert_eq!(result.provisional_tail, 2);
    }

    #[test]
    fn test_partial_string_dropped_without_str() {
        let result = parse(r#"{"name": "get_wea"#, Allow::ALL & !Allow::STR);
        assert_eq!(result.value, json!({}));
        assert_eq!(result.provisional_tail, 1);

        let result = parse(
            r#"{"name": "get_weather", "arguments": {"city": "Par"#,
            Allow::ALL & !Allow::STR,
        );
        assert_eq!(result.value, json!({"name": "get_weather", "arguments": {}}));
    }

    #[test]
    fn test_partial_keys_never_surface() {
        for input in [r#"{"na"#, r#"{"name""#, r#"{"name":"#, r#"{"name": "#] {
            let result = parse(input, Allow::ALL);
            assert_eq!(result.value, json!({}), "input: {}", input);
        }

        let result = parse(r#"{"a": 1, "b"#, Allow::ALL);
        assert_eq!(result.value, json!({"a": 1}));
    }

    #[test]
    fn test_trailing_number_is_provisional() {
        let result = parse(r#"{"a": [1, 2"#, Allow::ALL);
        assert_eq!(result.value, json!({"a": [1, 2]}));
        assert_eq!(result.provisional_tail, 3);

        let result = parse(r#"{"a": [1, 2"#, Allow::ALL & !Allow::NUM);
        assert_eq!(result.value, json!({"a": [1]}));
        assert_eq!(result.provisional_tail, 2);

        // whitespace terminates the number
        let result = parse(r#"{"a": 12 "#, Allow::ALL);
        assert_eq!(result.provisional_tail, 1);
    }

    #[test]
    fn test_cut_off_numbers_and_literals_dropped() {
        for input in [
            r#"{"a": -"#,
            r#"{"a": 1."#,
            r#"{"a": 1e"#,
            r#"{"a": 1e+"#,
            r#"{"a": tr"#,
            r#"{"a": fals"#,
            r#"{"a": nu"#,
        ] {
            let result = parse(input, Allow::ALL);
            assert_eq!(result.value, json!({}), "input: {}", input);
        }
    }

    #[test]
    fn test_partial_escape_dropped() {
        let result = parse(r#""abc\"#, Allow::ALL);
        assert_eq!(result.value, json!("abc"));

        let result = parse(r#""caf\u00e"#, Allow::ALL);
        assert_eq!(result.value, json!("caf"));

        let result = parse(r#""café""#, Allow::ALL);
        assert_eq!(result.value, json!("café"));
        assert!(result.is_complete());

        let result = parse(r#""\ud83d"#, Allow::ALL);
        assert_eq!(result.value, json!(""));

        let result = parse(r#""😀""#, Allow::ALL);
        assert_eq!(result.value, json!("😀"));
    }

    #[test]
    fn test_multibyte_content() {
        let result = parse(r#"{"city": "東京"#, Allow::ALL);
        assert_eq!(result.value, json!({"city": "東京"}));
    }

    #[test]
    fn test_disallowed_incomplete_root_fails() {
        assert!(matches!(
            parse_partial(r#"{"a": 1"#, Allow::NONE),
            Err(ParserError::Incomplete)
        ));
        assert!(matches!(
            parse_partial("", Allow::ALL),
            Err(ParserError::Incomplete)
        ));
    }

    #[test]
    fn test_structural_errors() {
        for input in [r#"{"a" 1}"#, "]", r#"{"a": 1]"#, "{a: 1}", r#"["x" "y"]"#] {
            assert!(
                matches!(
                    parse_partial(input, Allow::ALL),
                    Err(ParserError::ParsingFailed(_))
                ),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_trailing_commas_rejected() {
        for input in [r#"{"a": 1,}"#, "[1,]", r#"{"x": [1,], }"#, "[,]", "{,}"] {
            for allow in [Allow::NONE, Allow::ALL] {
                assert!(
                    matches!(parse_partial(input, allow), Err(ParserError::ParsingFailed(_))),
                    "input: {}",
                    input
                );
            }
        }

        // a comma at end of input is only a member still to come
        let result = parse_partial(r#"{"a": [1, "#, Allow::ALL).unwrap();
        assert_eq!(result.value, json!({"a": [1]}));
        assert!(parse_partial("{}", Allow::NONE).is_ok());
        assert!(parse_partial("[]", Allow::NONE).is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let parser = PartialJson::new(2);
        assert!(parser.parse("[[1]]", Allow::NONE).is_ok());
        assert!(matches!(
            parser.parse("[[[1]]]", Allow::NONE),
            Err(ParserError::DepthExceeded(2))
        ));
    }

    #[test]
    fn test_parse_complete_rejects_trailing_content() {
        let parser = PartialJson::default();
        assert!(parser.parse_complete("{\"a\": 1}  \n").is_ok());
        assert!(parser.parse_complete("{\"a\": 1}}").is_err());
        assert!(parser.parse_complete("{\"a\": 1").is_err());
    }
}
