use regex::Regex;

use crate::{
    tokenizer::Vocabulary,
    tool_parser::{
        errors::{ParserError, ParserResult},
        traits::{CallFramer, CallSpan, MarkerCounts},
    },
};

/// Calls wrapped in start/end marker tags, e.g. `<tool_call>{...}</tool_call>`.
///
/// A trailing start tag without its end tag frames an open call that runs to
/// the end of the text.
#[derive(Debug, Clone)]
pub struct TagFramer {
    start: String,
    end: String,
    start_id: Option<u32>,
    end_id: Option<u32>,
    pattern: Regex,
}

impl TagFramer {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> ParserResult<Self> {
        let start = start.into();
        let end = end.into();
        let pattern = Regex::new(&format!(
            r"(?s){start}(.*?){end}|{start}(.*)",
            start = regex::escape(&start),
            end = regex::escape(&end),
        ))?;
        Ok(Self {
            start,
            end,
            start_id: None,
            end_id: None,
            pattern,
        })
    }

    pub fn start_marker(&self) -> &str {
        &self.start
    }

    pub fn end_marker(&self) -> &str {
        &self.end
    }

    /// Whether counting runs on token ids
    pub fn is_bound(&self) -> bool {
        self.start_id.is_some() && self.end_id.is_some()
    }
}

impl CallFramer for TagFramer {
    fn bind(&mut self, parser: &str, vocab: &dyn Vocabulary) -> ParserResult<()> {
        let lookup = |token: &str| {
            vocab
                .token_to_id(token)
                .ok_or_else(|| ParserError::MissingMarkerToken {
                    parser: parser.to_string(),
                    token: token.to_string(),
                })
        };
        self.start_id = Some(lookup(&self.start)?);
        self.end_id = Some(lookup(&self.end)?);
        Ok(())
    }

    fn has_markers(&self, text: &str) -> bool {
        text.contains(&self.start)
    }

    fn spans<'a>(&self, text: &'a str) -> Vec<CallSpan<'a>> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let (body, closed) = match caps.get(1) {
                    Some(body) => (body, true),
                    None => (caps.get(2)?, false),
                };
                Some(CallSpan {
                    body: body.as_str(),
                    start: whole.start(),
                    end: whole.end(),
                    closed,
                })
            })
            .collect()
    }

    fn counts(&self, text: &str, token_ids: &[u32]) -> MarkerCounts {
        match (self.start_id, self.end_id) {
            (Some(start_id), Some(end_id)) if !token_ids.is_empty() => MarkerCounts {
                opened: token_ids.iter().filter(|id| **id == start_id).count(),
                closed: token_ids.iter().filter(|id| **id == end_id).count(),
            },
            _ => MarkerCounts {
                opened: text.matches(self.start.as_str()).count(),
                closed: text.matches(self.end.as_str()).count(),
            },
        }
    }

    fn content(&self, text: &str, spans: &[CallSpan<'_>], _accepted: &[bool]) -> Option<String> {
        let mut content = String::new();
        let mut cursor = 0;
        for span in spans {
            content.push_str(&text[cursor..span.start]);
            cursor = span.end;
        }
        content.push_str(&text[cursor..]);

        if content.trim().is_empty() {
            None
        } else {
            Some(content)
        }
    }

    fn content_end(&self, text: &str, spans: &[CallSpan<'_>], finished: bool) -> usize {
        let from = match spans.last() {
            Some(span) if !span.closed => return text.len(),
            Some(span) => span.end,
            None => 0,
        };
        if finished {
            return text.len();
        }

        // A start tag may be arriving one piece at a time
        let partial = self
            .start
            .char_indices()
            .skip(1)
            .map(|(len, _)| &self.start[..len])
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find(|prefix| text[from..].ends_with(prefix));
        match partial {
            Some(prefix) => text.len() - prefix.len(),
            None => text.len(),
        }
    }
}
