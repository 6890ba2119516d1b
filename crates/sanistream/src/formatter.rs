//! Adaptive text formatter.
//!
//! Overview
//! - The formatter receives runs one call at a time (`text`, `space`, `tab`,
//!   `nbsp`, `quote`, `newline`) and writes the formatted document to an
//!   [`OutputSink`].
//! - Text output:
//!   - Without wrapping, text is written as soon as it arrives. Whitespace is
//!     held back until the next text on the same line and dropped at line end.
//!   - With a wrap width, the current word is buffered. When the word is
//!     complete it goes on the current line if it fits, otherwise the line is
//!     broken at the preceding whitespace. A word that outgrows the buffer is
//!     placed as it is.
//!   - Flowed output (RFC 3676) keeps one trailing space on soft breaks and
//!     space-stuffs unquoted lines starting with a space, `>`, or `From`.
//!     A `-- ` signature separator keeps its trailing space.
//!   - Quoted lines start with one `>` per level and a space.
//!   - Pending whitespace is capped at [`MAX_PENDING_WHITESPACE`] bytes per
//!     gap; the pending word is capped at the wrap buffer capacity.
//! - HTML output never wraps. Text is escaped, runs of spaces alternate
//!   between `' '` and `&nbsp;` so browsers keep them, tabs expand to the
//!   next tab stop, newlines become `<br>`, and quoting levels open and close
//!   `<blockquote type="cite">` elements.

use crate::{
    fallback::{Fallback, FallbackMode, HtmlFallback},
    options::{
        FormatOptions, HTML_TAB_STOP, MAX_PENDING_WHITESPACE, OutputFormat,
        WRAP_BUFFER_MULTIPLIER,
    },
    output::OutputSink,
};

/// Where the formatter is within the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterState {
    /// Nothing placed on the current line yet.
    Idle,
    /// Text placed, no whitespace pending.
    InLine,
    /// Text placed and whitespace pending: the line may break here.
    AtBreakOpportunity,
    /// The document was closed; further input is ignored.
    Closed,
}

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    /// Characters placed on the line, prefix included.
    length: usize,
    quoting_level: u16,
    /// Quote prefix and space-stuffing have been written.
    started: bool,
    /// Text was placed on the line.
    has_content: bool,
    /// One space after the quote markers is still to be skipped.
    skip_space: bool,
    /// The line consists of `--` so far.
    signature: bool,
    /// The last HTML output was a plain `' '`.
    plain_space: bool,
}

/// Formats runs into text or HTML.
#[derive(Debug)]
pub struct TextFormatter<O> {
    output: O,
    options: FormatOptions,
    escape: Option<Box<dyn Fallback>>,
    state: FormatterState,
    line: LineState,
    word: String,
    word_width: usize,
    /// The current word already had a piece placed; the rest follows without
    /// a break.
    word_continues: bool,
    gap: String,
    gap_width: usize,
    wrap_capacity: usize,
    /// Some run reached the formatter in this document.
    saw_input: bool,
    wrote_anything: bool,
    wrote_newline: bool,
    html_started: bool,
    open_blockquotes: u16,
}

impl<O: OutputSink> TextFormatter<O> {
    /// Creates a formatter writing to `output`.
    pub fn new(output: O, options: FormatOptions) -> Self {
        let escape: Option<Box<dyn Fallback>> = if options.output_format.is_html() {
            Some(Box::new(HtmlFallback::new(
                options.fallback == FallbackMode::AsciiText,
            )))
        } else {
            options.fallback.build()
        };
        let wrap_capacity = options
            .wrap_width
            .map_or(0, |w| (w + 1) * WRAP_BUFFER_MULTIPLIER);
        Self {
            output,
            options,
            escape,
            state: FormatterState::Idle,
            line: LineState {
                quoting_level: options.base_quoting_level,
                ..LineState::default()
            },
            word: String::with_capacity(wrap_capacity),
            word_width: 0,
            word_continues: false,
            gap: String::new(),
            gap_width: 0,
            wrap_capacity,
            saw_input: false,
            wrote_anything: false,
            wrote_newline: false,
            html_started: false,
            open_blockquotes: 0,
        }
    }

    /// The options this formatter was created with.
    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Current state.
    pub fn state(&self) -> FormatterState {
        self.state
    }

    /// The output sink.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Mutable access to the output sink.
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Unwraps the output sink.
    pub fn into_output(self) -> O {
        self.output
    }

    /// Returns `false` while the sink wants its staged output drained.
    pub fn can_accept_more(&self) -> bool {
        self.output.can_accept_more()
    }

    /// Restores the initial state for the next document. Staged output is
    /// left alone.
    pub fn reset(&mut self) {
        self.state = FormatterState::Idle;
        self.line = LineState {
            quoting_level: self.options.base_quoting_level,
            ..LineState::default()
        };
        self.word.clear();
        self.word_width = 0;
        self.word_continues = false;
        self.gap.clear();
        self.gap_width = 0;
        self.saw_input = false;
        self.wrote_anything = false;
        self.wrote_newline = false;
        self.html_started = false;
        self.open_blockquotes = 0;
    }

    fn is_html(&self) -> bool {
        self.options.output_format.is_html()
    }

    fn wrap_width(&self) -> Option<usize> {
        match self.options.wrap_width {
            Some(w) if w > 0 && !self.is_html() => Some(w),
            _ => None,
        }
    }

    /// Sets the quoting level of the current line from quote markers.
    pub fn quote(&mut self, level: u16) {
        if self.state == FormatterState::Closed {
            return;
        }
        self.saw_input = true;
        self.line.quoting_level = self.options.base_quoting_level.saturating_add(level);
        self.line.skip_space = true;
    }

    /// Places text.
    pub fn text(&mut self, text: &str) {
        if self.state == FormatterState::Closed || text.is_empty() {
            return;
        }
        self.saw_input = true;
        self.line.skip_space = false;
        if self.is_html() {
            self.html_text(text);
        } else if self.wrap_width().is_some() {
            self.push_word(text);
        } else {
            self.start_line(text);
            self.write_gap();
            self.write_content(text);
        }
    }

    /// Places a run of spaces.
    pub fn space(&mut self, spaces: &str) {
        if self.state == FormatterState::Closed || spaces.is_empty() {
            return;
        }
        self.saw_input = true;
        let mut spaces = spaces;
        if self.line.skip_space {
            self.line.skip_space = false;
            spaces = spaces.get(1..).unwrap_or_default();
        }
        if spaces.is_empty() {
            return;
        }
        if self.is_html() {
            self.html_spaces(spaces.len());
        } else {
            self.whitespace(spaces);
        }
    }

    /// Places a run of tabs.
    pub fn tab(&mut self, tabs: &str) {
        if self.state == FormatterState::Closed || tabs.is_empty() {
            return;
        }
        self.saw_input = true;
        self.line.skip_space = false;
        if self.is_html() {
            for _ in 0..tabs.len() {
                let width = HTML_TAB_STOP - self.line.length % HTML_TAB_STOP;
                self.html_spaces(width);
            }
        } else {
            self.whitespace(tabs);
        }
    }

    /// Places a run of non-breaking spaces.
    pub fn nbsp(&mut self, nbsp: &str) {
        if self.state == FormatterState::Closed || nbsp.is_empty() {
            return;
        }
        self.saw_input = true;
        self.line.skip_space = false;
        if self.is_html() {
            self.html_begin_line();
            for _ in nbsp.chars() {
                self.output.write_str("&nbsp;", None);
                self.line.length += 1;
            }
            self.line.plain_space = false;
            self.mark_content();
        } else if self.wrap_width().is_some() {
            // Glues the surrounding words together.
            self.push_word(nbsp);
        } else {
            self.whitespace(nbsp);
        }
    }

    /// Ends the current line.
    pub fn newline(&mut self) {
        if self.state == FormatterState::Closed {
            return;
        }
        if self.is_html() {
            self.html_begin_line();
            self.output.write_str("<br>", None);
        } else {
            self.place_word();
            if self.line.signature && self.gap.starts_with(' ') {
                self.output.write_str(" ", None);
            }
            if !self.line.started && self.line.quoting_level > 0 {
                for _ in 0..self.line.quoting_level {
                    self.output.write_str(">", None);
                }
            }
        }
        self.gap.clear();
        self.gap_width = 0;
        self.end_line();
    }

    /// Writes markup verbatim. Only meaningful for HTML output.
    pub fn write_raw(&mut self, markup: &str) {
        if self.state == FormatterState::Closed || markup.is_empty() {
            return;
        }
        self.html_begin_document();
        self.output.write_str(markup, None);
        self.wrote_anything = true;
    }

    /// Flushes pending text and closes the document.
    pub fn close_document(&mut self) {
        if self.state == FormatterState::Closed {
            return;
        }
        if self.is_html() {
            self.html_begin_document();
            self.sync_blockquotes(0);
            if self.options.output_format == OutputFormat::Html {
                self.output.write_str("</body></html>", None);
            }
        } else {
            self.place_word();
            self.gap.clear();
            self.gap_width = 0;
            if (self.saw_input || self.wrote_anything) && !self.wrote_newline {
                self.output.write_str(self.options.line_ending.as_str(), None);
            }
        }
        self.state = FormatterState::Closed;
    }

    fn end_line(&mut self) {
        self.output.write_str(self.options.line_ending.as_str(), None);
        self.wrote_anything = true;
        self.wrote_newline = true;
        self.word_continues = false;
        self.line = LineState {
            quoting_level: self.options.base_quoting_level,
            ..LineState::default()
        };
        self.state = FormatterState::Idle;
    }

    fn whitespace(&mut self, ws: &str) {
        if self.wrap_width().is_some() {
            self.place_word();
            self.word_continues = false;
        }
        let mut kept = ws.len().min(MAX_PENDING_WHITESPACE.saturating_sub(self.gap.len()));
        while !ws.is_char_boundary(kept) {
            kept -= 1;
        }
        let ws = &ws[..kept];
        self.gap.push_str(ws);
        self.gap_width += ws.chars().count();
        if self.line.has_content {
            self.state = FormatterState::AtBreakOpportunity;
        }
    }

    /// Appends to the pending word, placing it early once the buffer is
    /// full.
    fn push_word(&mut self, piece: &str) {
        self.word.push_str(piece);
        self.word_width += piece.chars().count();
        if self.word.len() >= self.wrap_capacity {
            self.place_word();
            self.word_continues = true;
        }
    }

    /// Writes the quote prefix and space-stuffing before the first text of
    /// a line.
    fn start_line(&mut self, first_text: &str) {
        if self.line.started {
            return;
        }
        self.line.started = true;
        let level = self.line.quoting_level;
        if level > 0 {
            for _ in 0..level {
                self.output.write_str(">", None);
            }
            self.output.write_str(" ", None);
            self.line.length += usize::from(level) + 1;
        } else if self.options.flowed
            && (!self.gap.is_empty() || first_text.starts_with('>') || first_text == "From")
        {
            self.output.write_str(" ", None);
            self.line.length += 1;
        }
    }

    fn write_gap(&mut self) {
        if self.gap.is_empty() {
            return;
        }
        self.output.write_str(&self.gap, self.escape.as_deref());
        self.line.length += self.gap_width;
        self.line.signature = false;
        self.gap.clear();
        self.gap_width = 0;
    }

    fn write_content(&mut self, text: &str) {
        self.line.signature = !self.line.has_content && text == "--";
        self.output.write_str(text, self.escape.as_deref());
        self.line.length += text.chars().count();
        self.mark_content();
    }

    fn mark_content(&mut self) {
        self.line.has_content = true;
        self.wrote_anything = true;
        self.state = FormatterState::InLine;
    }

    fn place_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        let Some(width) = self.wrap_width() else {
            return;
        };
        if !self.word_continues
            && self.line.has_content
            && self.line.length + self.gap_width + self.word_width > width
        {
            self.soft_break();
        }

        let word = core::mem::take(&mut self.word);
        self.start_line(&word);
        self.write_gap();
        self.line.signature = !self.line.has_content && word == "--";
        self.output.write_str(&word, self.escape.as_deref());
        self.line.length += self.word_width;
        self.mark_content();
        self.word = word;
        self.word.clear();
        self.word_width = 0;
    }

    fn soft_break(&mut self) {
        if self.options.flowed && !self.line.signature {
            self.output.write_str(" ", None);
        }
        self.output.write_str(self.options.line_ending.as_str(), None);
        self.wrote_newline = true;
        self.gap.clear();
        self.gap_width = 0;
        self.line = LineState {
            quoting_level: self.line.quoting_level,
            ..LineState::default()
        };
        self.state = FormatterState::Idle;
    }

    fn html_begin_document(&mut self) {
        if !self.html_started && self.options.output_format == OutputFormat::Html {
            self.output.write_str("<html><body>", None);
            self.wrote_anything = true;
        }
        self.html_started = true;
    }

    fn html_begin_line(&mut self) {
        self.html_begin_document();
        if !self.line.started {
            self.line.started = true;
            self.sync_blockquotes(self.line.quoting_level);
        }
    }

    fn sync_blockquotes(&mut self, level: u16) {
        while self.open_blockquotes < level {
            self.output.write_str("<blockquote type=\"cite\">", None);
            self.open_blockquotes += 1;
        }
        while self.open_blockquotes > level {
            self.output.write_str("</blockquote>", None);
            self.open_blockquotes -= 1;
        }
    }

    fn html_text(&mut self, text: &str) {
        self.html_begin_line();
        self.output.write_str(text, self.escape.as_deref());
        self.line.length += text.chars().count();
        self.line.plain_space = false;
        self.mark_content();
    }

    fn html_spaces(&mut self, count: usize) {
        self.html_begin_line();
        for _ in 0..count {
            if self.line.length == 0 || self.line.plain_space {
                self.output.write_str("&nbsp;", None);
                self.line.plain_space = false;
            } else {
                self.output.write_str(" ", None);
                self.line.plain_space = true;
            }
            self.line.length += 1;
        }
        self.mark_content();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        options::LineEnding,
        output::CacheOutput,
    };

    fn text_options() -> FormatOptions {
        FormatOptions {
            line_ending: LineEnding::Lf,
            ..FormatOptions::default()
        }
    }

    fn formatter(options: FormatOptions) -> TextFormatter<CacheOutput> {
        TextFormatter::new(CacheOutput::new(1 << 16), options)
    }

    fn finish(mut formatter: TextFormatter<CacheOutput>) -> String {
        formatter.close_document();
        let mut out = Vec::new();
        formatter.output_mut().drain_into(&mut out);
        String::from_utf8(out).unwrap()
    }

    fn words(formatter: &mut TextFormatter<CacheOutput>, text: &str) {
        for (i, word) in text.split(' ').enumerate() {
            if i > 0 {
                formatter.space(" ");
            }
            formatter.text(word);
        }
    }

    #[test]
    fn trailing_whitespace_is_dropped_at_line_end() {
        let mut f = formatter(text_options());
        f.text("a");
        f.space("  ");
        f.tab("\t");
        assert_eq!(f.state(), FormatterState::AtBreakOpportunity);
        f.newline();
        assert_eq!(f.state(), FormatterState::Idle);
        f.text("b");
        f.space(" ");
        f.text("c");
        assert_eq!(finish(f), "a\nb c");
    }

    #[test]
    fn terminator_added_when_no_newline_was_written() {
        let mut f = formatter(text_options());
        f.text("only");
        assert_eq!(finish(f), "only\n");
        assert_eq!(finish(formatter(text_options())), "");
    }

    #[test]
    fn whitespace_only_document_is_terminated() {
        let mut f = formatter(text_options());
        f.space("   ");
        assert_eq!(finish(f), "\n");
        let mut f = formatter(text_options());
        f.tab("\t");
        assert_eq!(finish(f), "\n");
        let mut f = formatter(text_options());
        f.nbsp("\u{a0}");
        assert_eq!(finish(f), "\n");
    }

    #[test]
    fn pending_whitespace_is_capped() {
        let run = " ".repeat(4096);
        let mut f = formatter(text_options());
        f.text("a");
        for _ in 0..2048 {
            f.space(&run);
        }
        assert_eq!(f.gap.len(), MAX_PENDING_WHITESPACE);
        f.text("b");
        assert_eq!(
            finish(f),
            format!("a{}b\n", " ".repeat(MAX_PENDING_WHITESPACE))
        );
    }

    #[test]
    fn capped_whitespace_keeps_whole_characters() {
        let mut f = formatter(text_options());
        f.text("a");
        f.space(" ");
        f.nbsp(&"\u{a0}".repeat(1000));
        assert_eq!(f.gap.len(), MAX_PENDING_WHITESPACE - 1);
        f.text("b");
        let out = finish(f);
        assert!(out.starts_with("a \u{a0}") && out.ends_with("\u{a0}b\n"));
    }

    #[test]
    fn nbsp_runs_respect_the_word_buffer() {
        let mut f = formatter(FormatOptions {
            wrap_width: Some(76),
            ..text_options()
        });
        let run = "\u{a0}".repeat(2048);
        for _ in 0..64 {
            f.nbsp(&run);
            assert!(f.word.len() < f.wrap_capacity);
        }
        f.text("x");
        f.newline();
        let out = finish(f);
        assert_eq!(out.chars().filter(|&c| c == '\u{a0}').count(), 64 * 2048);
        assert!(out.ends_with("x\n"));
    }

    #[test]
    fn wraps_at_whitespace() {
        let mut f = formatter(FormatOptions {
            wrap_width: Some(10),
            ..text_options()
        });
        words(&mut f, "aaa bbb ccc ddd eeeeeeeeeeeeee f");
        f.newline();
        assert_eq!(finish(f), "aaa bbb\nccc ddd\neeeeeeeeeeeeee\nf\n");
    }

    #[test]
    fn flowed_soft_breaks_keep_a_space_and_lines_are_stuffed() {
        let mut f = formatter(FormatOptions {
            wrap_width: Some(10),
            flowed: true,
            ..text_options()
        });
        words(&mut f, "aaa bbb ccc");
        f.newline();
        words(&mut f, "From me");
        f.newline();
        f.text(">not quote");
        f.newline();
        assert_eq!(finish(f), "aaa bbb \nccc\n From me\n >not quote\n");
    }

    #[test]
    fn signature_separator_keeps_its_space() {
        let mut f = formatter(FormatOptions {
            flowed: true,
            ..text_options()
        });
        f.text("--");
        f.space(" ");
        f.newline();
        f.text("me");
        f.space(" ");
        f.newline();
        assert_eq!(finish(f), "-- \nme\n");
    }

    #[test]
    fn quote_prefix_and_marker_space() {
        let mut f = formatter(FormatOptions {
            base_quoting_level: 1,
            ..text_options()
        });
        f.quote(1);
        f.space(" ");
        f.text("hi");
        f.newline();
        f.quote(2);
        f.newline();
        f.text("base");
        f.newline();
        assert_eq!(finish(f), ">> hi\n>>>\n> base\n");
    }

    #[test]
    fn wrapped_quoted_lines_repeat_the_prefix() {
        let mut f = formatter(FormatOptions {
            wrap_width: Some(8),
            ..text_options()
        });
        f.quote(1);
        words(&mut f, " one two three");
        f.newline();
        assert_eq!(finish(f), "> one\n> two\n> three\n");
    }

    #[test]
    fn html_escapes_and_preserves_spacing() {
        let mut f = formatter(FormatOptions {
            output_format: OutputFormat::HtmlFragment,
            ..text_options()
        });
        f.space("  ");
        f.text("a<b");
        f.space("   ");
        f.text("c");
        f.tab("\t");
        f.text("d");
        f.nbsp("\u{a0}");
        f.newline();
        assert_eq!(
            finish(f),
            "&nbsp; a&lt;b &nbsp; c &nbsp; &nbsp; &nbsp; d&nbsp;<br>\n"
        );
    }

    #[test]
    fn html_document_with_blockquotes() {
        let mut f = formatter(FormatOptions {
            output_format: OutputFormat::Html,
            ..text_options()
        });
        f.quote(2);
        f.space(" ");
        f.text("deep");
        f.newline();
        f.quote(1);
        f.text("x");
        f.newline();
        f.text("top");
        assert_eq!(
            finish(f),
            "<html><body><blockquote type=\"cite\"><blockquote type=\"cite\">deep<br>\n\
             </blockquote>x<br>\n</blockquote>top</body></html>"
        );
    }

    #[test]
    fn reset_allows_a_second_document() {
        let mut f = formatter(text_options());
        f.text("one");
        f.close_document();
        f.text("ignored");
        f.reset();
        f.text("two");
        f.newline();
        assert_eq!(finish(f), "one\ntwo\n");
    }
}
