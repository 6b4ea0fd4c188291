use serde_json::Value;

/// What a scanned byte did to the bracket structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    Open,
    Close,
    Other,
}

/// String-aware bracket tracking over JSON-like text
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanState {
    /// Bracket/brace depth
    pub depth: usize,
    /// Whether currently inside a string literal
    pub in_string: bool,
    /// Whether next byte is escaped
    pub escape_next: bool,
    /// Whether any bracket was opened so far
    pub seen_open: bool,
}

impl ScanState {
    /// Process a single byte. With `square` unset only braces count.
    pub fn process_byte(&mut self, b: u8, square: bool) -> ScanEvent {
        if self.escape_next {
            self.escape_next = false;
            return ScanEvent::Other;
        }

        if self.in_string {
            match b {
                b'\\' => self.escape_next = true,
                b'"' => self.in_string = false,
                _ => {}
            }
            return ScanEvent::Other;
        }

        match b {
            b'"' => {
                self.in_string = true;
                ScanEvent::Other
            }
            b'{' => self.open(),
            b'[' if square => self.open(),
            b'}' => self.close(),
            b']' if square => self.close(),
            _ => ScanEvent::Other,
        }
    }

    fn open(&mut self) -> ScanEvent {
        self.depth += 1;
        self.seen_open = true;
        ScanEvent::Open
    }

    fn close(&mut self) -> ScanEvent {
        self.depth = self.depth.saturating_sub(1);
        ScanEvent::Close
    }

    /// Something was opened and everything opened is closed again
    pub fn is_balanced(&self) -> bool {
        self.seen_open && self.depth == 0 && !self.in_string
    }
}

fn is_scaffolding_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | ',' | ';')
}

/// Drop JSON list scaffolding and a code fence from the start of a piece
pub fn trim_scaffolding_start(piece: &str) -> &str {
    let mut text = piece;
    loop {
        let before = text.len();
        text = text.trim_start_matches(is_scaffolding_char);
        if let Some(rest) = text.strip_prefix("```") {
            // Drop the info string of an opening fence
            text = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        }
        if text.len() == before {
            return text;
        }
    }
}

/// Drop JSON list scaffolding and a code fence from the end of a piece
pub fn trim_scaffolding_end(piece: &str) -> &str {
    let mut text = piece;
    loop {
        let before = text.len();
        text = text.trim_end_matches(is_scaffolding_char);
        if let Some(pos) = text.rfind("```") {
            // Closing fence, or an opening fence right before a call
            if text[pos + 3..].chars().all(|c| c.is_ascii_alphanumeric()) {
                text = &text[..pos];
            }
        }
        if text.len() == before {
            return text;
        }
    }
}

/// Strip JSON array scaffolding and code fences around a piece of content.
pub fn strip_scaffolding(piece: &str) -> &str {
    trim_scaffolding_end(trim_scaffolding_start(piece))
}

/// Start of the trailing run of `text` that could still lead into a bare
/// JSON call: list scaffolding, fences and a lone `{`
pub fn scaffolding_tail(text: &str) -> usize {
    let mut rest = text;
    loop {
        let before = rest.len();
        rest = rest.trim_end_matches(|c: char| is_scaffolding_char(c) || matches!(c, '{' | '`'));
        if let Some(pos) = rest.rfind("```") {
            if rest[pos + 3..].chars().all(|c| c.is_ascii_alphanumeric()) {
                rest = &rest[..pos];
            }
        }
        if rest.len() == before {
            return rest.len();
        }
    }
}

/// First key of an object's text, as far as it has arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstKey<'a> {
    Complete(String),
    Partial(&'a str),
    Missing,
}

/// Read the first key of text starting with `{`
pub fn first_key(body: &str) -> FirstKey<'_> {
    let Some(rest) = body.strip_prefix('{') else {
        return FirstKey::Missing;
    };
    let rest = rest.trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'));
    let Some(key) = rest.strip_prefix('"') else {
        return FirstKey::Missing;
    };

    let bytes = key.as_bytes();
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => {
                let quoted = &rest[..i + 2];
                return match serde_json::from_str::<String>(quoted) {
                    Ok(key) => FirstKey::Complete(key),
                    Err(_) => FirstKey::Complete(key[..i].to_string()),
                };
            }
            _ => {}
        }
    }
    FirstKey::Partial(key)
}

/// Object with at least one member
pub fn is_non_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| !map.is_empty())
}
