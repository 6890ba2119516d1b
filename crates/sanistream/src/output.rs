//! Output side of the pipeline.
//!
//! Both sinks stage formatted bytes in a [`ChunkedCache`]. Writes never fail
//! and never block: the formatter checks [`OutputSink::can_accept_more`]
//! between tokens, and the driver moves staged bytes on with
//! [`OutputSink::flush`] (or by draining a [`CacheOutput`] directly).

use std::io::{self, Write};

use tracing::trace;

use crate::{
    ConversionError,
    cache::ChunkedCache,
    fallback::{Fallback, MAX_FALLBACK_LEN},
};

/// Push contract between the formatter and whatever stores its output.
pub trait OutputSink {
    /// Appends `text`, routing unsafe characters through `fallback`.
    fn write_str(&mut self, text: &str, fallback: Option<&dyn Fallback>);

    /// Appends one character, routing it through `fallback` when unsafe.
    fn write_char(&mut self, ch: char, fallback: Option<&dyn Fallback>) {
        let mut buf = [0u8; 4];
        self.write_str(ch.encode_utf8(&mut buf), fallback);
    }

    /// Moves staged output to its destination.
    ///
    /// Returns `Ok(true)` once nothing is staged.
    ///
    /// # Errors
    ///
    /// Propagates failures of the destination.
    fn flush(&mut self) -> Result<bool, ConversionError>;

    /// Returns `false` once the staged output reached the configured bound.
    fn can_accept_more(&self) -> bool;

    /// Number of staged bytes.
    fn pending(&self) -> usize;
}

/// Writes `text` into `cache`, escaping through `fallback`.
fn write_escaped(cache: &mut ChunkedCache, text: &str, fallback: Option<&dyn Fallback>) {
    let Some(fallback) = fallback else {
        cache.write(text.as_bytes());
        return;
    };

    let bytes = text.as_bytes();
    let mut clean = 0;
    for (i, ch) in text.char_indices() {
        if !fallback.is_unsafe(ch, i == 0) {
            continue;
        }
        cache.write(&bytes[clean..i]);
        write_fallback(cache, fallback, ch);
        clean = i + ch.len_utf8();
    }
    cache.write(&bytes[clean..]);
}

fn write_fallback(cache: &mut ChunkedCache, fallback: &dyn Fallback, ch: char) {
    // Try the room left in the tail first; only grow it when that fails.
    if let Some(n) = fallback.fallback_char(ch, cache.writable_slice(1)) {
        cache.commit(n);
    } else if let Some(n) = fallback.fallback_char(ch, cache.writable_slice(MAX_FALLBACK_LEN)) {
        cache.commit(n);
    } else {
        trace!(ch = u32::from(ch), "fallback does not fit, dropping character");
    }
}

/// Stages output for a pull-style consumer.
#[derive(Debug)]
pub struct CacheOutput {
    cache: ChunkedCache,
    high_water: usize,
}

impl CacheOutput {
    /// Creates a sink that asks the formatter to pause at `high_water` staged
    /// bytes.
    #[must_use]
    pub fn new(high_water: usize) -> Self {
        Self {
            cache: ChunkedCache::new(),
            high_water: high_water.max(1),
        }
    }

    /// Moves up to `out.len()` staged bytes into `out`.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        self.cache.read(out)
    }

    /// Moves every staged byte into `out`.
    pub fn drain_into(&mut self, out: &mut Vec<u8>) {
        while !self.cache.is_empty() {
            let chunk = self.cache.readable_slice();
            let n = chunk.len();
            out.extend_from_slice(chunk);
            self.cache.report_read(n);
        }
    }

    /// Drops staged output.
    pub fn reset(&mut self) {
        self.cache.reset();
    }
}

impl OutputSink for CacheOutput {
    fn write_str(&mut self, text: &str, fallback: Option<&dyn Fallback>) {
        write_escaped(&mut self.cache, text, fallback);
    }

    fn flush(&mut self) -> Result<bool, ConversionError> {
        Ok(self.cache.is_empty())
    }

    fn can_accept_more(&self) -> bool {
        self.cache.len() < self.high_water
    }

    fn pending(&self) -> usize {
        self.cache.len()
    }
}

/// Stages output and forwards it to a [`Write`] implementation.
#[derive(Debug)]
pub struct WriterOutput<W> {
    writer: W,
    cache: ChunkedCache,
    high_water: usize,
}

impl<W: Write> WriterOutput<W> {
    /// Wraps `writer`, pausing the formatter at `high_water` staged bytes.
    pub fn new(writer: W, high_water: usize) -> Self {
        Self {
            writer,
            cache: ChunkedCache::new(),
            high_water: high_water.max(1),
        }
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the wrapped writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Unwraps the writer. Staged bytes are lost.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriterOutput<W> {
    fn write_str(&mut self, text: &str, fallback: Option<&dyn Fallback>) {
        write_escaped(&mut self.cache, text, fallback);
    }

    fn flush(&mut self) -> Result<bool, ConversionError> {
        loop {
            let chunk = self.cache.readable_slice();
            if chunk.is_empty() {
                return Ok(true);
            }
            match self.writer.write(chunk) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => self.cache.report_read(n),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn can_accept_more(&self) -> bool {
        self.cache.len() < self.high_water
    }

    fn pending(&self) -> usize {
        self.cache.len()
    }
}
