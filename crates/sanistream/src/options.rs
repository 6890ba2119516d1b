//! Converter and formatter configuration.

#![allow(clippy::struct_excessive_bools)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{decode::InputEncoding, fallback::FallbackMode};

/// Default number of bytes pulled from a source per read.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 4096;
/// Default number of staged output bytes at which the formatter pauses.
pub const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 4096;
/// Default constant part of the no-progress bound.
pub const DEFAULT_LOOP_FLOOR: u32 = 100_000;
/// Default bound on runs per token.
pub const DEFAULT_MAX_RUNS_PER_TOKEN: usize = 64;
/// Default bound on the byte length of a single run.
pub const DEFAULT_MAX_TOKEN_SIZE: usize = 4096;
/// Conventional wrap width for mail-style text.
pub const DEFAULT_WRAP_WIDTH: usize = 76;
/// The pending-word buffer holds `(wrap_width + 1) * WRAP_BUFFER_MULTIPLIER`
/// bytes before a word is placed without looking for a break.
pub const WRAP_BUFFER_MULTIPLIER: usize = 4;
/// Bytes of whitespace the formatter holds between two words. Whitespace
/// beyond this within one gap is dropped.
pub const MAX_PENDING_WHITESPACE: usize = 1024;
/// Tab stop used when expanding tabs in HTML output.
pub const HTML_TAB_STOP: usize = 8;

/// Shape of the produced document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputFormat {
    /// Plain text, optionally wrapped and flowed.
    #[default]
    Text,
    /// A complete HTML document.
    Html,
    /// HTML without the `<html><body>` wrapper.
    HtmlFragment,
}

impl OutputFormat {
    /// Returns `true` for both HTML variants.
    #[must_use]
    pub fn is_html(self) -> bool {
        matches!(self, Self::Html | Self::HtmlFragment)
    }
}

/// Line terminator written for every newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineEnding {
    /// `\r\n`
    #[default]
    CrLf,
    /// `\n`
    Lf,
}

impl LineEnding {
    /// The terminator text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrLf => "\r\n",
            Self::Lf => "\n",
        }
    }
}

/// How header and footer fragments are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderFooterFormat {
    /// Plain text, formatted like the body.
    #[default]
    Text,
    /// Markup, written verbatim into HTML output. Treated as text when the
    /// output is not HTML.
    Html,
}

/// Options for the text formatter.
///
/// # Examples
///
/// ```rust
/// use sanistream::{FormatOptions, LineEnding, DEFAULT_WRAP_WIDTH};
///
/// let options = FormatOptions {
///     wrap_width: Some(DEFAULT_WRAP_WIDTH),
///     flowed: true,
///     line_ending: LineEnding::Lf,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FormatOptions {
    /// Shape of the produced document.
    ///
    /// # Default
    ///
    /// [`OutputFormat::Text`]
    pub output_format: OutputFormat,

    /// Wrap text lines at this many characters.
    ///
    /// Lines only break at whitespace; a word longer than the width is kept
    /// whole. Ignored for HTML output.
    ///
    /// # Default
    ///
    /// `None` (no wrapping)
    pub wrap_width: Option<usize>,

    /// Produce `format=flowed` text: soft line breaks keep a trailing space,
    /// and lines that would be misread are space-stuffed.
    ///
    /// # Default
    ///
    /// `false`
    pub flowed: bool,

    /// Terminator written for every newline.
    ///
    /// # Default
    ///
    /// [`LineEnding::CrLf`]
    pub line_ending: LineEnding,

    /// Fallback applied to text output. HTML output always escapes.
    ///
    /// # Default
    ///
    /// [`FallbackMode::Text`]
    pub fallback: FallbackMode,

    /// Quoting level added to every line.
    ///
    /// # Default
    ///
    /// `0`
    pub base_quoting_level: u16,
}

/// Configuration of a converter.
///
/// # Examples
///
/// ```rust
/// use sanistream::{ConverterOptions, FormatOptions, OutputFormat};
///
/// let options = ConverterOptions {
///     recognize_quoting: true,
///     format: FormatOptions {
///         output_format: OutputFormat::HtmlFragment,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// assert_eq!(options.max_loops_without_progress(), 108_192);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConverterOptions {
    /// Encoding of byte input.
    ///
    /// # Default
    ///
    /// [`InputEncoding::Utf8`]
    pub input_encoding: InputEncoding,

    /// Bytes pulled from a source per read.
    ///
    /// # Default
    ///
    /// [`DEFAULT_INPUT_BUFFER_SIZE`]
    pub input_buffer_size: usize,

    /// Staged output bytes at which the formatter pauses.
    ///
    /// # Default
    ///
    /// [`DEFAULT_OUTPUT_BUFFER_SIZE`]
    pub output_buffer_size: usize,

    /// Constant part of the no-progress bound; see
    /// [`max_loops_without_progress`](Self::max_loops_without_progress).
    ///
    /// # Default
    ///
    /// [`DEFAULT_LOOP_FLOOR`]
    pub loop_floor: u32,

    /// Runs per token before the token is split.
    ///
    /// # Default
    ///
    /// [`DEFAULT_MAX_RUNS_PER_TOKEN`]
    pub max_runs_per_token: usize,

    /// Bytes per run before the run is split.
    ///
    /// # Default
    ///
    /// [`DEFAULT_MAX_TOKEN_SIZE`]
    pub max_token_size: usize,

    /// Treat `>` markers at the start of a line as reply quoting.
    ///
    /// # Default
    ///
    /// `false`
    pub recognize_quoting: bool,

    /// Fragment injected before the body.
    ///
    /// # Default
    ///
    /// `None`
    pub header: Option<String>,

    /// Fragment injected after the body.
    ///
    /// # Default
    ///
    /// `None`
    pub footer: Option<String>,

    /// Interpretation of `header` and `footer`.
    ///
    /// # Default
    ///
    /// [`HeaderFooterFormat::Text`]
    pub header_footer_format: HeaderFooterFormat,

    /// Formatter options.
    pub format: FormatOptions,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            input_encoding: InputEncoding::Utf8,
            input_buffer_size: DEFAULT_INPUT_BUFFER_SIZE,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
            loop_floor: DEFAULT_LOOP_FLOOR,
            max_runs_per_token: DEFAULT_MAX_RUNS_PER_TOKEN,
            max_token_size: DEFAULT_MAX_TOKEN_SIZE,
            recognize_quoting: false,
            header: None,
            footer: None,
            header_footer_format: HeaderFooterFormat::Text,
            format: FormatOptions::default(),
        }
    }
}

impl ConverterOptions {
    /// Iterations without progress after which conversion fails:
    /// `loop_floor + input_buffer_size + output_buffer_size`, saturating.
    #[must_use]
    pub fn max_loops_without_progress(&self) -> u32 {
        let sizes = self.input_buffer_size.saturating_add(self.output_buffer_size);
        self.loop_floor
            .saturating_add(u32::try_from(sizes).unwrap_or(u32::MAX))
    }
}
