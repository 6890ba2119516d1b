//! Streaming conversion of untrusted plain text into sanitized text or HTML.
//!
//! Overview
//! - Input arrives as bytes in any chunking, from a [`std::io::Read`]er or
//!   pushed into a [`CacheInput`], and is decoded to UTF-8 incrementally.
//! - [`TextTokenizer`] splits it into bounded tokens of classified runs:
//!   text, spaces, tabs, non-breaking spaces, newlines and quote markers.
//!   Control characters are dropped on the way.
//! - [`TextFormatter`] renders runs as wrapped or `format=flowed` text, or as
//!   escaped HTML, through an [`OutputSink`] that applies a [`Fallback`] to
//!   characters the target cannot carry.
//! - [`TextConverter`] drives both in bounded steps with optional header and
//!   footer fragments; [`ConverterReader`] and [`ConverterWriter`] adapt it to
//!   `std::io`.
//! - Memory stays bounded by the configured buffer sizes, and every driving
//!   loop fails with [`ConversionError::TooComplex`] instead of spinning.
//!
//! ```rust
//! use sanistream::{ConverterOptions, FormatOptions, OutputFormat, convert_str};
//!
//! let options = ConverterOptions {
//!     format: FormatOptions {
//!         output_format: OutputFormat::HtmlFragment,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! let html = convert_str("<script>alert(1)</script>", &options).unwrap();
//! assert_eq!(html, "&lt;script&gt;alert(1)&lt;/script&gt;");
//! ```

mod cache;
mod classify;
mod converter;
mod decode;
mod error;
mod fallback;
mod formatter;
mod input;
mod options;
mod output;
mod progress;
mod stream;
mod token;
mod tokenizer;

#[doc(hidden)]
pub mod chunk_utils;

#[cfg(test)]
mod tests;

pub use cache::{BLOCK_ROUNDING, COMPACT_THRESHOLD, ChunkedCache, MIN_BLOCK_SIZE};
pub use classify::{CharClass, classify, classify_latin1};
pub use converter::{Converter, TextConverter, format_token};
pub use decode::{InputDecoder, InputEncoding};
pub use error::ConversionError;
pub use fallback::{
    Fallback, FallbackMode, HtmlFallback, MAX_FALLBACK_LEN, TextFallback, UNSAFE_ASCII,
    UNSAFE_IN_HTML, UNSAFE_IN_TEXT, latin1_entity,
};
pub use formatter::{FormatterState, TextFormatter};
pub use input::{CacheInput, FragmentInput, InputSource, ParseWindow, ReaderInput};
pub use options::{
    ConverterOptions, DEFAULT_INPUT_BUFFER_SIZE, DEFAULT_LOOP_FLOOR, DEFAULT_MAX_RUNS_PER_TOKEN,
    DEFAULT_MAX_TOKEN_SIZE, DEFAULT_OUTPUT_BUFFER_SIZE, DEFAULT_WRAP_WIDTH, FormatOptions,
    HTML_TAB_STOP, HeaderFooterFormat, LineEnding, MAX_PENDING_WHITESPACE, OutputFormat,
    WRAP_BUFFER_MULTIPLIER,
};
pub use output::{CacheOutput, OutputSink, WriterOutput};
pub use progress::ProgressMonitor;
pub use stream::{ConverterReader, ConverterWriter, convert_bytes, convert_str};
pub use token::{Run, RunKind, RunView, TokenId, TokenView};
pub use tokenizer::TextTokenizer;
