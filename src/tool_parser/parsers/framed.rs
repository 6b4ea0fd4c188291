use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::tool_parser::{
    canonical::{stable_prefix, to_canonical_json},
    diff::intermediate_diff,
    errors::{ParserError, ParserResult},
    parsers::helpers::{first_key, is_non_empty_object, FirstKey},
    partial_json::{Allow, PartialJson, PartialValue},
    state::{ArgumentsSnapshot, StreamState},
    traits::{CallFramer, CallSpan, MarkerCounts, ToolParser},
    types::{DeltaMessage, DeltaToolCall, ExtractionResult, FunctionCall, StreamChunk, ToolCall},
};

/// Field names of a call object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSchema {
    pub name_key: String,
    /// Keys that may hold the arguments object, first match wins
    pub argument_keys: Vec<String>,
}

impl CallSchema {
    pub fn new<I, S>(name_key: impl Into<String>, argument_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name_key: name_key.into(),
            argument_keys: argument_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Complete, non-empty call name
    pub fn name<'v>(&self, call: &'v Value) -> Option<&'v str> {
        call.get(&self.name_key)?
            .as_str()
            .filter(|name| !name.is_empty())
    }

    /// Key that may open a call object
    pub fn is_call_key(&self, key: &str) -> bool {
        key == self.name_key || self.argument_keys.iter().any(|k| k == key)
    }

    fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name_key.as_str()).chain(self.argument_keys.iter().map(String::as_str))
    }

    /// Arguments value together with the key it was found under
    pub fn arguments<'s, 'v>(&'s self, call: &'v Value) -> Option<(&'s str, &'v Value)> {
        let map = call.as_object()?;
        self.argument_keys
            .iter()
            .find_map(|key| map.get(key).map(|value| (key.as_str(), value)))
    }
}

impl Default for CallSchema {
    fn default() -> Self {
        Self::new("name", ["arguments"])
    }
}

/// Whether framed text holds a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanKind {
    Call,
    /// First key still arriving
    Pending,
    NotCall,
}

/// Tool parser built from a framing behaviour and a call schema.
///
/// Shares one extraction algorithm across conventions: the framer locates
/// call text, the tolerant JSON reader parses it, and the diff engine turns
/// successive parses into argument fragments.
pub struct FramedParser<F: CallFramer> {
    name: String,
    framer: F,
    schema: CallSchema,
    json: PartialJson,
}

impl<F: CallFramer> FramedParser<F> {
    pub fn new(name: impl Into<String>, framer: F, schema: CallSchema) -> Self {
        Self {
            name: name.into(),
            framer,
            schema,
            json: PartialJson::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.json = PartialJson::new(max_depth);
        self
    }

    pub fn framer(&self) -> &F {
        &self.framer
    }

    pub fn schema(&self) -> &CallSchema {
        &self.schema
    }

    /// Parse the text of one finished call
    fn parse_call(&self, body: &str) -> ParserResult<FunctionCall> {
        let value = self.json.parse_complete(body.trim())?;
        let name = self.schema.name(&value).ok_or_else(|| {
            ParserError::ParsingFailed(format!("missing '{}' field", self.schema.name_key))
        })?;
        let (key, arguments) = self.schema.arguments(&value).ok_or_else(|| {
            ParserError::ParsingFailed(format!(
                "missing arguments field (one of {:?})",
                self.schema.argument_keys
            ))
        })?;
        if !arguments.is_object() {
            return Err(ParserError::ParsingFailed(format!(
                "'{}' must be an object",
                key
            )));
        }

        Ok(FunctionCall {
            name: name.to_string(),
            arguments: to_canonical_json(arguments)?,
        })
    }

    /// Tolerant parse of a call that is still being generated
    fn parse_open(&self, body: &str, allow: Allow) -> Option<PartialValue> {
        match self.json.parse(body, allow) {
            Ok(parsed) if parsed.value.is_object() => Some(parsed),
            Ok(_) | Err(ParserError::Incomplete) => None,
            Err(e) => {
                debug!(parser = %self.name, error = %e, "open call text does not parse");
                None
            }
        }
    }

    /// Arguments of a partial call with their stable canonical text.
    ///
    /// Missing and empty arguments both count as absent.
    fn arguments_snapshot(&self, parsed: &PartialValue) -> ParserResult<Option<ArgumentsSnapshot>> {
        let Some((key, arguments)) = self.schema.arguments(&parsed.value) else {
            return Ok(None);
        };
        if !is_non_empty_object(arguments) {
            return Ok(None);
        }

        // Only the last member of an unterminated call shares its provisional tail
        let is_last = parsed
            .value
            .as_object()
            .and_then(|map| map.keys().last())
            .is_some_and(|last| last == key);
        let tail = if is_last {
            parsed.provisional_tail.saturating_sub(1)
        } else {
            0
        };

        Ok(Some(ArgumentsSnapshot {
            value: arguments.clone(),
            stable_text: stable_prefix(arguments, tail)?,
        }))
    }

    /// Tentative spans are calls only once their first key is a call field
    fn span_kind(&self, span: &CallSpan<'_>, finished: bool) -> SpanKind {
        if !self.framer.is_tentative() {
            return SpanKind::Call;
        }
        let kind = match first_key(span.body) {
            FirstKey::Complete(key) if self.schema.is_call_key(&key) => SpanKind::Call,
            FirstKey::Complete(_) => SpanKind::NotCall,
            FirstKey::Partial(partial) if self.schema.keys().any(|key| key.starts_with(partial)) => {
                SpanKind::Pending
            }
            FirstKey::Partial(_) => SpanKind::NotCall,
            FirstKey::Missing if span.closed => SpanKind::NotCall,
            FirstKey::Missing => SpanKind::Pending,
        };
        if finished && kind == SpanKind::Pending {
            SpanKind::NotCall
        } else {
            kind
        }
    }

    fn step(
        &self,
        state: &mut StreamState,
        chunk: &StreamChunk<'_>,
    ) -> ParserResult<Option<DeltaMessage>> {
        let prev = self
            .framer
            .counts(chunk.previous_text, chunk.previous_token_ids);
        let cur = self
            .framer
            .counts(chunk.current_text, chunk.current_token_ids);
        let known = state.known_calls();

        if cur.closed > cur.opened
            || cur.opened < prev.opened
            || cur.closed < prev.closed
            || cur.opened < known
        {
            return Err(ParserError::InvariantViolation(format!(
                "marker counts went from {:?} to {:?} with {} calls started",
                prev, cur, known
            )));
        }

        self.emit(state, chunk.current_text, cur, false)
    }

    /// One message for `text`: content settled ahead of any call that has
    /// deltas due, otherwise those deltas. Deferred deltas are picked up by
    /// the next round since they only depend on the state.
    fn emit(
        &self,
        state: &mut StreamState,
        text: &str,
        counts: MarkerCounts,
        finished: bool,
    ) -> ParserResult<Option<DeltaMessage>> {
        let spans = self.framer.spans(text);
        let kinds: Vec<SpanKind> = spans
            .iter()
            .map(|span| self.span_kind(span, finished))
            .collect();

        let mut progressed = state.clone();
        let mut calls = Vec::new();
        let first_with_deltas =
            self.advance_calls(&mut progressed, &spans, &kinds, counts, &mut calls)?;
        let limit = first_with_deltas
            .and_then(|index| spans.get(index))
            .map(|span| span.start);

        let (content, cursor) =
            self.settled_content(text, &spans, &kinds, state.content_cursor, limit, finished)?;
        if !content.is_empty() {
            state.content_cursor = cursor;
            return Ok(Some(DeltaMessage::Content { content }));
        }

        *state = progressed;
        state.content_cursor = cursor;
        Ok(tool_calls_message(calls))
    }

    /// Content between `cursor` and the point where call material, or text
    /// that may still become call material, begins. Returns the content and
    /// the cursor past it.
    fn settled_content(
        &self,
        text: &str,
        spans: &[CallSpan<'_>],
        kinds: &[SpanKind],
        cursor: usize,
        limit: Option<usize>,
        finished: bool,
    ) -> ParserResult<(String, usize)> {
        if cursor > text.len() || !text.is_char_boundary(cursor) {
            return Err(ParserError::InvariantViolation(format!(
                "content cursor {} is outside the output",
                cursor
            )));
        }

        let mut end = self.framer.content_end(text, spans, finished);
        if let Some(limit) = limit {
            end = end.min(limit);
        }
        if end <= cursor {
            return Ok((String::new(), cursor));
        }

        let claimed: Vec<&CallSpan<'_>> = spans
            .iter()
            .zip(kinds)
            .filter(|(_, kind)| **kind != SpanKind::NotCall)
            .map(|(span, _)| span)
            .collect();

        let mut content = String::new();
        let mut pos = cursor;
        let mut after_call = claimed
            .iter()
            .any(|span| span.end == cursor && span.start < span.end);

        for span in claimed {
            if span.end <= pos {
                continue;
            }
            if span.start >= end {
                break;
            }
            if span.start > pos {
                let piece = &text[pos..span.start];
                content.push_str(self.framer.content_piece(piece, after_call, true));
                pos = span.start;
            }
            if !span.closed || span.end > end {
                return Ok((content, pos));
            }
            pos = span.end;
            after_call = true;
        }

        if end > pos {
            content.push_str(self.framer.content_piece(&text[pos..end], after_call, false));
            pos = end;
        }
        Ok((content, pos))
    }

    /// Stream or flush every call from the current index up to
    /// `counts.opened`. Returns the first span index that produced deltas.
    fn advance_calls(
        &self,
        state: &mut StreamState,
        spans: &[CallSpan<'_>],
        kinds: &[SpanKind],
        counts: MarkerCounts,
        calls: &mut Vec<DeltaToolCall>,
    ) -> ParserResult<Option<usize>> {
        let mut first_with_deltas = None;
        let first = state.current().unwrap_or(0);
        for index in first..counts.opened {
            let kind = kinds.get(index).copied().unwrap_or(SpanKind::Call);
            if kind == SpanKind::Pending {
                break;
            }
            if state.known_calls() <= index {
                state.begin_call();
                debug!(parser = %self.name, index, "tool call started");
            }
            if state.closed {
                continue;
            }
            if kind == SpanKind::NotCall {
                debug!(parser = %self.name, index, "framed text is not a tool call");
                state.closed = true;
                continue;
            }

            let emitted = calls.len();
            let body = spans.get(index).map(|span| span.body);
            if index < counts.closed {
                self.flush_call(state, index, body, calls)?;
            } else {
                self.stream_call(state, index, body, calls)?;
            }
            if calls.len() > emitted && first_with_deltas.is_none() {
                first_with_deltas = Some(index);
            }
        }
        Ok(first_with_deltas)
    }

    /// Emit the next delta a call in progress has ready: its initial delta,
    /// then its name, then argument fragments, one kind per step.
    fn stream_call(
        &self,
        state: &mut StreamState,
        index: usize,
        body: Option<&str>,
        calls: &mut Vec<DeltaToolCall>,
    ) -> ParserResult<()> {
        let Some(body) = body.map(str::trim_start).filter(|body| !body.is_empty()) else {
            return Ok(());
        };

        let allow = if state.name_sent {
            Allow::ALL
        } else {
            Allow::ALL & !Allow::STR
        };
        let Some(parsed) = self.parse_open(body, allow) else {
            return Ok(());
        };

        if !state.initial_sent {
            calls.push(DeltaToolCall::initial(state.announce_call()));
            return Ok(());
        }

        if !state.name_sent {
            if let Some(name) = self.schema.name(&parsed.value) {
                calls.push(DeltaToolCall::name(delta_index(state)?, name));
                state.name_sent = true;
            }
            return Ok(());
        }

        self.stream_arguments(state, index, &parsed, calls)
    }

    fn stream_arguments(
        &self,
        state: &mut StreamState,
        index: usize,
        parsed: &PartialValue,
        calls: &mut Vec<DeltaToolCall>,
    ) -> ParserResult<()> {
        let previous = state
            .previous_snapshot
            .get(index)
            .ok_or_else(|| missing_slot(index))?;

        let Some(current) = self.arguments_snapshot(parsed)? else {
            if previous.is_some() {
                return Err(ParserError::InvariantViolation(format!(
                    "arguments of call {} disappeared",
                    index
                )));
            }
            return Ok(());
        };

        let fragment = match previous {
            None => current.stable_text.clone(),
            // A number cut off before a digit drops its member for a step
            Some(previous) if previous.stable_text.starts_with(&current.stable_text) => {
                return Ok(());
            }
            Some(previous) => {
                intermediate_diff(&current.stable_text, &previous.stable_text).to_string()
            }
        };

        let delta_index = delta_index(state)?;
        let streamed = state
            .streamed_argument_text
            .get_mut(index)
            .ok_or_else(|| missing_slot(index))?;
        if !fragment.is_empty() {
            let extends = current
                .stable_text
                .strip_prefix(streamed.as_str())
                .is_some_and(|rest| rest.starts_with(&fragment));
            if !extends {
                return Err(ParserError::InvariantViolation(format!(
                    "fragment {:?} for call {} does not extend {:?}",
                    fragment, index, streamed
                )));
            }
            streamed.push_str(&fragment);
            calls.push(DeltaToolCall::arguments(delta_index, fragment));
        }

        state.previous_snapshot[index] = Some(current);
        Ok(())
    }

    /// Emit whatever is still outstanding for a finished call and freeze its index
    fn flush_call(
        &self,
        state: &mut StreamState,
        index: usize,
        body: Option<&str>,
        calls: &mut Vec<DeltaToolCall>,
    ) -> ParserResult<()> {
        state.closed = true;

        let call = match body.map(|body| self.parse_call(body)) {
            Some(Ok(call)) => call,
            Some(Err(e)) => {
                debug!(parser = %self.name, index, error = %e, "closed call is not a tool call");
                return Ok(());
            }
            None => {
                debug!(parser = %self.name, index, "closed call has no text");
                return Ok(());
            }
        };

        if !state.initial_sent {
            calls.push(DeltaToolCall::initial(state.announce_call()));
        }
        let delta_index = delta_index(state)?;
        if !state.name_sent {
            calls.push(DeltaToolCall::name(delta_index, call.name.as_str()));
            state.name_sent = true;
        }

        let streamed = state
            .streamed_argument_text
            .get_mut(index)
            .ok_or_else(|| missing_slot(index))?;
        match call.arguments.strip_prefix(streamed.as_str()) {
            Some(rest) => {
                if !rest.is_empty() {
                    calls.push(DeltaToolCall::arguments(delta_index, rest));
                    streamed.push_str(rest);
                }
            }
            None => {
                error!(
                    parser = %self.name,
                    index,
                    streamed = %streamed,
                    arguments = %call.arguments,
                    "final arguments diverge from streamed text"
                );
            }
        }
        Ok(())
    }

    fn log_step_error(&self, e: &ParserError) {
        match e {
            ParserError::InvariantViolation(_) => {
                error!(parser = %self.name, error = %e, "streaming step dropped");
            }
            _ => {
                warn!(parser = %self.name, error = %e, "streaming step failed");
            }
        }
    }
}

fn missing_slot(index: usize) -> ParserError {
    ParserError::InvariantViolation(format!("no stream state for call {}", index))
}

fn delta_index(state: &StreamState) -> ParserResult<usize> {
    state.delta_index.ok_or_else(|| {
        ParserError::InvariantViolation(format!(
            "call {} has no delta index before its initial delta",
            state.current_index
        ))
    })
}

fn tool_calls_message(tool_calls: Vec<DeltaToolCall>) -> Option<DeltaMessage> {
    if tool_calls.is_empty() {
        None
    } else {
        Some(DeltaMessage::ToolCalls { tool_calls })
    }
}

#[async_trait]
impl<F: CallFramer> ToolParser for FramedParser<F> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn parse_complete(&self, output: &str) -> ParserResult<ExtractionResult> {
        let spans = self.framer.spans(output);
        if spans.is_empty() {
            return Ok(ExtractionResult::no_tools(output));
        }

        let mut accepted = Vec::with_capacity(spans.len());
        let mut tool_calls = Vec::new();
        for (index, span) in spans.iter().enumerate() {
            match self.parse_call(span.body) {
                Ok(function) => {
                    tool_calls.push(ToolCall::new(function));
                    accepted.push(true);
                }
                Err(e) => {
                    warn!(parser = %self.name, index, error = %e, "skipping malformed tool call");
                    accepted.push(false);
                }
            }
        }

        if tool_calls.is_empty() {
            return Ok(ExtractionResult::no_tools(output));
        }

        let content = self.framer.content(output, &spans, &accepted);
        Ok(ExtractionResult::with_calls(tool_calls, content))
    }

    async fn parse_incremental(
        &self,
        state: &mut StreamState,
        chunk: &StreamChunk<'_>,
    ) -> Option<DeltaMessage> {
        let mut next = state.clone();
        match self.step(&mut next, chunk) {
            Ok(delta) => {
                *state = next;
                delta
            }
            Err(e) => {
                self.log_step_error(&e);
                None
            }
        }
    }

    async fn finish_stream(&self, state: &mut StreamState, final_text: &str) -> Vec<DeltaMessage> {
        let spans = self.framer.spans(final_text);
        let total = spans.len().max(state.known_calls());
        let counts = MarkerCounts {
            opened: total,
            closed: total,
        };

        let mut next = state.clone();
        let mut messages = Vec::new();
        loop {
            match self.emit(&mut next, final_text, counts, true) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => break,
                Err(e) => {
                    self.log_step_error(&e);
                    return Vec::new();
                }
            }
        }
        *state = next;
        messages
    }

    fn has_tool_markers(&self, text: &str) -> bool {
        self.framer.has_markers(text)
    }
}
