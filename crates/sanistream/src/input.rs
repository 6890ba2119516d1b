//! Input side of the pipeline.
//!
//! Overview
//! - [`ParseWindow`] is the decoded text the tokenizer works on, with the
//!   `start` and `current` cursors. Sources only ever append to it.
//! - [`InputSource`] is the pull contract: `read_more` appends whatever is
//!   available right now and reports whether anything changed.
//! - Three sources are provided: [`ReaderInput`] pulls from any
//!   [`std::io::Read`], [`CacheInput`] is filled by the caller (push mode), and
//!   [`FragmentInput`] serves a short self-contained string.

use std::io::{self, Read};

use tracing::trace;

use crate::{
    ConversionError,
    cache::ChunkedCache,
    decode::{InputDecoder, InputEncoding},
};

/// The tokenizer's view of the decoded input.
///
/// Bytes before `start` are consumed and may be discarded by
/// [`compact`](Self::compact). Bytes in `start..current` belong to the token
/// being built. `current..end` is look-ahead that has been decoded but not
/// classified yet.
#[derive(Debug, Default)]
pub struct ParseWindow {
    buffer: String,
    start: usize,
    current: usize,
    shift: usize,
}

impl ParseWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The whole buffer, consumed prefix included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Appends decoded text.
    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Direct access for decoders. Callers may only append.
    pub fn buffer_mut(&mut self) -> &mut String {
        &mut self.buffer
    }

    /// First byte that has not been handed out in a token.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// First byte that has not been classified.
    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    /// End of the decoded text.
    #[must_use]
    pub fn end(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes available past `current`.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.current
    }

    /// The character at `current`, if any.
    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.buffer[self.current..].chars().next()
    }

    /// The character right after the one at `current`, if decoded already.
    #[must_use]
    pub fn peek_second(&self) -> Option<char> {
        let mut chars = self.buffer[self.current..].chars();
        chars.next();
        chars.next()
    }

    pub(crate) fn set_start(&mut self, start: usize) {
        debug_assert!(start <= self.current);
        self.start = start;
    }

    pub(crate) fn advance(&mut self, len: usize) {
        self.current += len;
        debug_assert!(self.current <= self.buffer.len());
    }

    /// Removes `begin..end` from the buffer and returns the number of bytes
    /// removed. Cursors past the gap move back accordingly.
    pub fn remove_gap(&mut self, begin: usize, end: usize) -> usize {
        debug_assert!(self.start <= begin && begin <= end && end <= self.buffer.len());
        self.buffer.replace_range(begin..end, "");
        let removed = end - begin;
        if self.current >= end {
            self.current -= removed;
        } else if self.current > begin {
            self.current = begin;
        }
        removed
    }

    /// Drops the consumed prefix once it makes up at least half the buffer.
    ///
    /// Returns `true` when the buffer moved; the distance is accumulated for
    /// [`take_shift`](Self::take_shift).
    pub fn compact(&mut self) -> bool {
        if self.start == 0 || self.start < self.buffer.len() / 2 {
            return false;
        }
        let shift = self.start;
        trace!(shift, kept = self.buffer.len() - shift, "compacting parse window");
        self.buffer.drain(..shift);
        self.current -= shift;
        self.start = 0;
        self.shift += shift;
        true
    }

    /// Returns how far the buffer moved since the last call.
    pub fn take_shift(&mut self) -> usize {
        core::mem::take(&mut self.shift)
    }

    /// Empties the window, keeping its allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start = 0;
        self.current = 0;
        self.shift = 0;
    }
}

/// Pull contract between the tokenizer and whatever feeds it.
pub trait InputSource {
    /// Appends any text that is available without blocking.
    ///
    /// Returns `Ok(true)` when text was appended or end of input was reached
    /// during this call, and `Ok(false)` when nothing is available right now.
    ///
    /// # Errors
    ///
    /// Propagates failures of the underlying source.
    fn read_more(&mut self, window: &mut ParseWindow) -> Result<bool, ConversionError>;

    /// Returns `true` once all input has been appended to the window.
    fn end_of_file(&self) -> bool;

    /// Longest run the tokenizer may accumulate before splitting it.
    fn max_token_size(&self) -> usize;
}

impl<T: InputSource + ?Sized> InputSource for &mut T {
    fn read_more(&mut self, window: &mut ParseWindow) -> Result<bool, ConversionError> {
        (**self).read_more(window)
    }

    fn end_of_file(&self) -> bool {
        (**self).end_of_file()
    }

    fn max_token_size(&self) -> usize {
        (**self).max_token_size()
    }
}

/// Pulls bytes from a [`Read`] implementation.
#[derive(Debug)]
pub struct ReaderInput<R> {
    reader: R,
    decoder: InputDecoder,
    scratch: Vec<u8>,
    max_token_size: usize,
    eof: bool,
}

impl<R: Read> ReaderInput<R> {
    /// Wraps `reader`, reading at most `buffer_size` bytes per call.
    pub fn new(reader: R, encoding: InputEncoding, buffer_size: usize, max_token_size: usize) -> Self {
        Self {
            reader,
            decoder: InputDecoder::new(encoding),
            scratch: vec![0; buffer_size.max(1)],
            max_token_size,
            eof: false,
        }
    }

    /// Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Unwraps the reader. Bytes already read but not yet tokenized are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> InputSource for ReaderInput<R> {
    fn read_more(&mut self, window: &mut ParseWindow) -> Result<bool, ConversionError> {
        if self.eof {
            return Ok(false);
        }
        loop {
            match self.reader.read(&mut self.scratch) {
                Ok(0) => {
                    self.eof = true;
                    self.decoder.finish(window.buffer_mut());
                    return Ok(true);
                }
                Ok(n) => {
                    self.decoder.decode(&self.scratch[..n], window.buffer_mut());
                    return Ok(true);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn end_of_file(&self) -> bool {
        self.eof
    }

    fn max_token_size(&self) -> usize {
        self.max_token_size
    }
}

/// Push-mode input: the caller queues bytes and closes the stream.
#[derive(Debug)]
pub struct CacheInput {
    cache: ChunkedCache,
    decoder: InputDecoder,
    read_size: usize,
    max_token_size: usize,
    closed: bool,
    eof: bool,
}

impl CacheInput {
    /// Creates an empty queue that hands at most `read_size` bytes to the
    /// decoder per `read_more` call.
    #[must_use]
    pub fn new(encoding: InputEncoding, read_size: usize, max_token_size: usize) -> Self {
        Self {
            cache: ChunkedCache::new(),
            decoder: InputDecoder::new(encoding),
            read_size: read_size.max(1),
            max_token_size,
            closed: false,
            eof: false,
        }
    }

    /// Queues `bytes` for conversion.
    pub fn push(&mut self, bytes: &[u8]) {
        debug_assert!(!self.closed, "push after end of file");
        self.cache.write(bytes);
    }

    /// Marks the end of the input. Queued bytes are still delivered.
    pub fn set_end_of_file(&mut self) {
        self.closed = true;
    }

    /// Returns `true` when every queued byte has been handed to the window.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of queued bytes not yet decoded.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.cache.len()
    }

    /// Clears the queue and the end-of-file state for the next document.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.decoder.reset();
        self.closed = false;
        self.eof = false;
    }
}

impl InputSource for CacheInput {
    fn read_more(&mut self, window: &mut ParseWindow) -> Result<bool, ConversionError> {
        if !self.cache.is_empty() {
            let chunk = self.cache.readable_slice();
            let n = chunk.len().min(self.read_size);
            self.decoder.decode(&chunk[..n], window.buffer_mut());
            self.cache.report_read(n);
            return Ok(true);
        }
        if self.closed && !self.eof {
            self.eof = true;
            self.decoder.finish(window.buffer_mut());
            return Ok(true);
        }
        Ok(false)
    }

    fn end_of_file(&self) -> bool {
        self.eof
    }

    fn max_token_size(&self) -> usize {
        self.max_token_size
    }
}

/// A short string delivered in one piece, used for headers and footers.
#[derive(Debug, Default)]
pub struct FragmentInput {
    text: String,
    delivered: bool,
}

impl FragmentInput {
    /// Wraps `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            delivered: false,
        }
    }

    /// Replaces the fragment, keeping the allocation.
    pub fn set(&mut self, text: &str) {
        self.text.clear();
        self.text.push_str(text);
        self.delivered = false;
    }
}

impl InputSource for FragmentInput {
    fn read_more(&mut self, window: &mut ParseWindow) -> Result<bool, ConversionError> {
        if self.delivered {
            return Ok(false);
        }
        window.push_str(&self.text);
        self.delivered = true;
        Ok(true)
    }

    fn end_of_file(&self) -> bool {
        self.delivered
    }

    fn max_token_size(&self) -> usize {
        self.text.len().max(1)
    }
}
