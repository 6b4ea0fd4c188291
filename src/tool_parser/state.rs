use serde_json::Value;

/// Arguments of a call as of the last step that saw them
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentsSnapshot {
    /// Arguments value from the tolerant parse
    pub value: Value,
    /// Canonical text of `value` without its provisional tail
    pub stable_text: String,
}

/// Per-request streaming state.
///
/// One writer only; the caller threads it through every step of a stream.
/// `streamed_argument_text` and `previous_snapshot` always hold one entry per
/// call index up to and including `current_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    /// Index of the call being streamed, -1 before the first call
    pub current_index: i32,
    /// Initial delta (id and kind) emitted for the current call
    pub initial_sent: bool,
    /// Name delta emitted for the current call
    pub name_sent: bool,
    /// Current call has been flushed or frozen
    pub closed: bool,
    /// Concatenation of every argument fragment emitted, per call index
    pub streamed_argument_text: Vec<String>,
    pub previous_snapshot: Vec<Option<ArgumentsSnapshot>>,
    /// Index the current call carries in its deltas, once announced
    pub delta_index: Option<usize>,
    /// Calls that emitted their initial delta. Delta indices stay contiguous
    /// even when a framed call turns out not to be one.
    pub announced_calls: usize,
    /// Bytes of the output already forwarded as content or claimed by calls
    pub content_cursor: usize,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            current_index: -1,
            initial_sent: false,
            name_sent: false,
            closed: false,
            streamed_argument_text: Vec::new(),
            previous_snapshot: Vec::new(),
            delta_index: None,
            announced_calls: 0,
            content_cursor: 0,
        }
    }

    /// Number of calls this stream has started
    pub fn known_calls(&self) -> usize {
        usize::try_from(self.current_index + 1).unwrap_or(0)
    }

    pub fn current(&self) -> Option<usize> {
        usize::try_from(self.current_index).ok()
    }

    /// Advance to the next call index with fresh per-call flags
    pub fn begin_call(&mut self) {
        self.current_index += 1;
        self.initial_sent = false;
        self.name_sent = false;
        self.closed = false;
        self.delta_index = None;
        self.streamed_argument_text.push(String::new());
        self.previous_snapshot.push(None);
    }

    /// Give the current call the next delta index and mark its initial delta sent
    pub fn announce_call(&mut self) -> usize {
        let index = self.announced_calls;
        self.announced_calls += 1;
        self.delta_index = Some(index);
        self.initial_sent = true;
        index
    }

    pub fn streamed_arguments(&self, index: usize) -> Option<&str> {
        self.streamed_argument_text.get(index).map(String::as_str)
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}
