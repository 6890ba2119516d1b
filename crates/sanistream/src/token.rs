//! Tokens handed from the tokenizer to the formatter.

/// Kind of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    /// Anything that is not whitespace.
    Text,
    /// One or more U+0020.
    Space,
    /// Exactly one line break: `\r\n`, `\r`, or `\n`.
    Newline,
    /// One or more tabs.
    Tabulation,
    /// One or more U+00A0.
    Nbsp,
    /// Quote markers at the start of a line. The payload is the quoting
    /// level.
    Special,
}

/// A span of the parse buffer classified as one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// The run kind.
    pub kind: RunKind,
    /// Byte offset into the parse buffer.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
    /// Kind-specific value; the quoting level for [`RunKind::Special`].
    pub payload: u16,
}

impl Run {
    /// One past the last byte.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Outcome of one tokenizer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenId {
    /// Nothing to hand out until more input arrives.
    None,
    /// A token with at least one run is available.
    Text,
    /// The input is exhausted. Returned exactly once per document.
    EndOfFile,
}

/// A borrowed token, valid until the next tokenizer step.
#[derive(Debug, Clone, Copy)]
pub struct TokenView<'a> {
    runs: &'a [Run],
    buffer: &'a str,
}

impl<'a> TokenView<'a> {
    pub(crate) fn new(runs: &'a [Run], buffer: &'a str) -> Self {
        Self { runs, buffer }
    }

    /// Number of runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Returns `true` for a token without runs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// The raw runs, with offsets into the parse buffer.
    #[must_use]
    pub fn raw_runs(&self) -> &'a [Run] {
        self.runs
    }

    /// Iterates over the runs together with their text.
    pub fn runs(&self) -> impl Iterator<Item = RunView<'a>> + 'a {
        let buffer = self.buffer;
        self.runs.iter().map(move |run| RunView {
            kind: run.kind,
            text: &buffer[run.start..run.end()],
            payload: run.payload,
        })
    }

    /// The text covered by the whole token.
    #[must_use]
    pub fn text(&self) -> &'a str {
        match (self.runs.first(), self.runs.last()) {
            (Some(first), Some(last)) => &self.buffer[first.start..last.end()],
            _ => "",
        }
    }
}

/// A run resolved against the parse buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunView<'a> {
    /// The run kind.
    pub kind: RunKind,
    /// The text of the run.
    pub text: &'a str,
    /// Kind-specific value; see [`Run::payload`].
    pub payload: u16,
}
