//! Run-based incremental tokenizer.
//!
//! Overview
//! - The tokenizer walks the [`ParseWindow`] one character at a time and
//!   groups characters of the same kind into runs. A token is the list of
//!   runs gathered in one step.
//! - When the window runs dry it pulls from its [`InputSource`]. If nothing
//!   is available it hands out the runs closed so far, or [`TokenId::None`].
//!   The still-open run stays in the window and is resumed on the next call,
//!   so the run sequence does not depend on how the input was chunked.
//! - A CR is only classified once the character after it is known (or the
//!   input ended), so a CRLF split across reads is still one newline.
//! - Controls and noncharacters are cut out of the window in place.
//!
//! Bounds
//! - A token holds at most `max_runs` runs; more splits the token.
//! - A run longer than the input's `max_token_size` is split into several
//!   runs of the same kind.

use crate::{
    ConversionError,
    classify::{CharClass, classify},
    input::{InputSource, ParseWindow},
    token::{Run, RunKind, TokenId, TokenView},
};

/// Smallest usable run bound per token.
const MIN_RUNS_PER_TOKEN: usize = 2;

/// Incremental tokenizer over an [`InputSource`].
#[derive(Debug)]
pub struct TextTokenizer<I> {
    input: I,
    window: ParseWindow,
    runs: Vec<Run>,
    /// A token was handed out and its runs are still borrowed from the window.
    token_valid: bool,
    open: Option<(RunKind, usize)>,
    line_start: bool,
    recognize_quoting: bool,
    max_runs: usize,
    eof_emitted: bool,
    processed: u64,
}

impl<I: InputSource> TextTokenizer<I> {
    /// Creates a tokenizer reading from `input`.
    pub fn new(input: I, max_runs: usize, recognize_quoting: bool) -> Self {
        let max_runs = max_runs.max(MIN_RUNS_PER_TOKEN);
        Self {
            input,
            window: ParseWindow::new(),
            runs: Vec::with_capacity(max_runs),
            token_valid: false,
            open: None,
            line_start: true,
            recognize_quoting,
            max_runs,
            eof_emitted: false,
            processed: 0,
        }
    }

    /// The input source.
    pub fn input(&self) -> &I {
        &self.input
    }

    /// Mutable access to the input source, for push-mode feeding.
    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    /// Unwraps the input source.
    pub fn into_input(self) -> I {
        self.input
    }

    /// Bytes of decoded input classified so far, dropped characters
    /// included. Monotonic within a document.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Returns `true` once [`TokenId::EndOfFile`] was handed out.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.eof_emitted
    }

    /// Returns `true` while anything from the current document is buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.token_valid
            || !self.runs.is_empty()
            || self.open.is_some()
            || self.window.remaining() > 0
    }

    /// Restarts on a new input, keeping the allocated buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::RestartPending`] while a token or
    /// unconsumed input of the current document is pending.
    pub fn initialize(&mut self, input: I) -> Result<(), ConversionError> {
        if self.has_pending() {
            return Err(ConversionError::RestartPending);
        }
        self.input = input;
        self.restart();
        Ok(())
    }

    /// Like [`initialize`](Self::initialize), keeping the current input
    /// object. Used when the input was refilled in place.
    ///
    /// # Errors
    ///
    /// Same as [`initialize`](Self::initialize).
    pub fn reinitialize(&mut self) -> Result<(), ConversionError> {
        if self.has_pending() {
            return Err(ConversionError::RestartPending);
        }
        self.restart();
        Ok(())
    }

    fn restart(&mut self) {
        self.window.clear();
        self.runs.clear();
        self.open = None;
        self.line_start = true;
        self.eof_emitted = false;
        self.processed = 0;
    }

    /// The token handed out by the last [`next_token`](Self::next_token) call
    /// that returned [`TokenId::Text`].
    #[must_use]
    pub fn token(&self) -> TokenView<'_> {
        let runs = if self.token_valid { &self.runs[..] } else { &[] };
        TokenView::new(runs, self.window.as_str())
    }

    /// Advances to the next token.
    ///
    /// # Errors
    ///
    /// Propagates failures of the input source.
    pub fn next_token(&mut self) -> Result<TokenId, ConversionError> {
        if self.token_valid {
            self.token_valid = false;
            self.runs.clear();
            let start = self.open.map_or(self.window.current(), |(_, start)| start);
            self.window.set_start(start);
        }
        if self.eof_emitted {
            return Ok(TokenId::None);
        }

        loop {
            if self.runs.len() >= self.max_runs {
                return Ok(self.emit());
            }

            let needs_more = match self.window.peek() {
                None => true,
                Some('\r') => {
                    self.skip_controls_after_cr();
                    self.window.peek_second().is_none()
                }
                Some(_) => false,
            };
            if needs_more && !self.input.end_of_file() {
                if self.window.compact() {
                    self.rebase();
                }
                if self.input.read_more(&mut self.window)? {
                    continue;
                }
                if self.input.end_of_file() {
                    continue;
                }
                if self.runs.is_empty() {
                    return Ok(TokenId::None);
                }
                return Ok(self.emit());
            }

            let Some(ch) = self.window.peek() else {
                self.close_open();
                if !self.runs.is_empty() {
                    return Ok(self.emit());
                }
                self.eof_emitted = true;
                return Ok(TokenId::EndOfFile);
            };

            self.step(ch);
        }
    }

    fn step(&mut self, ch: char) {
        let class = classify(ch);
        let current = self.window.current();
        let len = ch.len_utf8();

        if class.intersects(CharClass::SKIPPABLE) {
            self.window.remove_gap(current, current + len);
            self.processed += len as u64;
            return;
        }

        let kind = if class.intersects(CharClass::NEWLINE) {
            RunKind::Newline
        } else if class.intersects(CharClass::SPACE) {
            RunKind::Space
        } else if class.intersects(CharClass::TAB) {
            RunKind::Tabulation
        } else if class.intersects(CharClass::NBSP) {
            RunKind::Nbsp
        } else if class.intersects(CharClass::GT)
            && self.recognize_quoting
            && (self.line_start || matches!(self.open, Some((RunKind::Special, _))))
        {
            RunKind::Special
        } else {
            RunKind::Text
        };

        if kind == RunKind::Newline {
            if self.open.is_some() {
                // The newline is looked at again after the run bound check.
                self.close_open();
                return;
            }
            let newline_len = if ch == '\r' && self.window.peek_second() == Some('\n') {
                2
            } else {
                1
            };
            self.runs.push(Run {
                kind,
                start: current,
                len: newline_len,
                payload: 0,
            });
            self.window.advance(newline_len);
            self.processed += newline_len as u64;
            self.line_start = true;
            return;
        }

        if let Some((open_kind, open_start)) = self.open {
            if open_kind != kind || current - open_start >= self.input.max_token_size().max(1) {
                self.close_open();
                return;
            }
        } else {
            self.open = Some((kind, current));
        }
        self.window.advance(len);
        self.processed += len as u64;
        self.line_start = false;
    }

    /// Removes skippable characters right after a CR so the look-ahead sees
    /// the character that decides between CR and CRLF.
    fn skip_controls_after_cr(&mut self) {
        let after_cr = self.window.current() + 1;
        while let Some(next) = self.window.peek_second() {
            if !classify(next).intersects(CharClass::SKIPPABLE) {
                break;
            }
            let len = next.len_utf8();
            self.window.remove_gap(after_cr, after_cr + len);
            self.processed += len as u64;
        }
    }

    fn close_open(&mut self) {
        if let Some((kind, start)) = self.open.take() {
            let len = self.window.current() - start;
            let payload = if kind == RunKind::Special {
                u16::try_from(len).unwrap_or(u16::MAX)
            } else {
                0
            };
            self.runs.push(Run {
                kind,
                start,
                len,
                payload,
            });
        }
    }

    fn emit(&mut self) -> TokenId {
        self.token_valid = true;
        TokenId::Text
    }

    fn rebase(&mut self) {
        let shift = self.window.take_shift();
        if shift == 0 {
            return;
        }
        for run in &mut self.runs {
            run.start -= shift;
        }
        if let Some((_, start)) = &mut self.open {
            *start -= shift;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decode::InputEncoding,
        input::{CacheInput, FragmentInput},
    };

    fn collect(tokenizer: &mut TextTokenizer<impl InputSource>) -> Vec<(RunKind, String, u16)> {
        let mut out = Vec::new();
        loop {
            match tokenizer.next_token().unwrap() {
                TokenId::Text => {
                    for run in tokenizer.token().runs() {
                        out.push((run.kind, run.text.to_owned(), run.payload));
                    }
                }
                TokenId::EndOfFile => return out,
                TokenId::None => panic!("fragment input never runs dry"),
            }
        }
    }

    fn runs(text: &str, quoting: bool) -> Vec<(RunKind, String, u16)> {
        let mut tokenizer = TextTokenizer::new(FragmentInput::new(text), 64, quoting);
        collect(&mut tokenizer)
    }

    fn run(kind: RunKind, text: &str) -> (RunKind, String, u16) {
        (kind, text.to_owned(), 0)
    }

    #[test]
    fn splits_text_into_runs() {
        assert_eq!(
            runs("a b\tc\r\nd", false),
            vec![
                run(RunKind::Text, "a"),
                run(RunKind::Space, " "),
                run(RunKind::Text, "b"),
                run(RunKind::Tabulation, "\t"),
                run(RunKind::Text, "c"),
                run(RunKind::Newline, "\r\n"),
                run(RunKind::Text, "d"),
            ]
        );
    }

    #[test]
    fn every_line_break_is_its_own_run() {
        assert_eq!(
            runs("\n\n\r\r\n\r", false),
            vec![
                run(RunKind::Newline, "\n"),
                run(RunKind::Newline, "\n"),
                run(RunKind::Newline, "\r"),
                run(RunKind::Newline, "\r\n"),
                run(RunKind::Newline, "\r"),
            ]
        );
    }

    #[test]
    fn controls_are_removed_without_closing_the_run() {
        assert_eq!(
            runs("ab\u{0}\u{7}cd\u{fdd0} x", false),
            vec![
                run(RunKind::Text, "abcd"),
                run(RunKind::Space, " "),
                run(RunKind::Text, "x"),
            ]
        );
    }

    #[test]
    fn quote_markers_at_line_start_are_special() {
        assert_eq!(
            runs(">> hi >x\n>y", true),
            vec![
                (RunKind::Special, ">>".to_owned(), 2),
                run(RunKind::Space, " "),
                run(RunKind::Text, "hi"),
                run(RunKind::Space, " "),
                run(RunKind::Text, ">x"),
                run(RunKind::Newline, "\n"),
                (RunKind::Special, ">".to_owned(), 1),
                run(RunKind::Text, "y"),
            ]
        );
        assert_eq!(runs(">x", false), vec![run(RunKind::Text, ">x")]);
    }

    #[test]
    fn run_bound_splits_tokens() {
        let mut tokenizer = TextTokenizer::new(FragmentInput::new("a b c d e"), 2, false);
        let mut sizes = Vec::new();
        while tokenizer.next_token().unwrap() == TokenId::Text {
            sizes.push(tokenizer.token().len());
        }
        assert_eq!(sizes, vec![2, 2, 2, 2, 1]);
    }

    #[test]
    fn long_runs_are_split_at_max_token_size() {
        let mut input = CacheInput::new(InputEncoding::Utf8, 64, 4);
        input.push(b"abcdefghij");
        input.set_end_of_file();
        let mut tokenizer = TextTokenizer::new(input, 64, false);
        let texts: Vec<String> = collect(&mut tokenizer).into_iter().map(|(_, t, _)| t).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn cr_waits_for_look_ahead() {
        let mut input = CacheInput::new(InputEncoding::Utf8, 64, 64);
        input.push(b"a\r");
        let mut tokenizer = TextTokenizer::new(input, 64, false);

        // The text run stays open: the CR cannot be classified yet.
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::None);

        tokenizer.input_mut().push(b"\nb");
        tokenizer.input_mut().set_end_of_file();
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::Text);
        let kinds: Vec<_> = tokenizer.token().runs().map(|r| (r.kind, r.text)).collect();
        assert_eq!(
            kinds,
            vec![
                (RunKind::Text, "a"),
                (RunKind::Newline, "\r\n"),
                (RunKind::Text, "b")
            ]
        );
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::EndOfFile);
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::None);
    }

    #[test]
    fn open_run_survives_a_dry_input() {
        let mut input = CacheInput::new(InputEncoding::Utf8, 64, 64);
        input.push(b"hel");
        let mut tokenizer = TextTokenizer::new(input, 64, false);
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::None);
        tokenizer.input_mut().push(b"lo");
        tokenizer.input_mut().set_end_of_file();
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::Text);
        assert_eq!(tokenizer.token().text(), "hello");
    }

    #[test]
    fn restart_is_refused_while_input_is_pending() {
        let mut tokenizer = TextTokenizer::new(FragmentInput::new("a b"), 64, false);
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::Text);
        assert!(matches!(
            tokenizer.initialize(FragmentInput::new("x")),
            Err(ConversionError::RestartPending)
        ));
        assert_eq!(tokenizer.next_token().unwrap(), TokenId::EndOfFile);
        tokenizer.initialize(FragmentInput::new("x")).unwrap();
        assert_eq!(collect(&mut tokenizer), vec![run(RunKind::Text, "x")]);
    }
}
