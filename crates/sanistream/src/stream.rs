//! `std::io` adapters around [`TextConverter`].
//!
//! Overview
//! - [`ConverterReader`] is the pull side: it wraps a [`Read`] source and is
//!   itself a [`Read`] yielding converted bytes.
//! - [`ConverterWriter`] is the push side: it is a [`Write`] sink that
//!   converts everything written to it into an inner [`Write`]. It queues
//!   at most `input_buffer_size` unconverted bytes; while the inner writer
//!   blocks and the queue is full, `write` fails with
//!   [`io::ErrorKind::WouldBlock`].
//! - Every external call runs the converter under a fresh
//!   [`ProgressMonitor`], so a call either makes progress or fails with
//!   [`ConversionError::TooComplex`].
//! - A failed call poisons the adapter: every later call fails with
//!   [`ConversionError::Poisoned`]. A call that unwinds leaves the adapter
//!   marked busy, which has the same effect.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::{
    ConversionError,
    converter::{Converter, TextConverter},
    input::{CacheInput, InputSource, ReaderInput},
    options::ConverterOptions,
    output::{CacheOutput, OutputSink, WriterOutput},
    progress::ProgressMonitor,
};

#[derive(Debug, Default)]
struct ConsistencyGuard {
    in_operation: bool,
    poisoned: bool,
}

impl ConsistencyGuard {
    fn enter(&mut self) -> Result<(), ConversionError> {
        if self.poisoned || self.in_operation {
            self.poisoned = true;
            return Err(ConversionError::Poisoned);
        }
        self.in_operation = true;
        Ok(())
    }

    fn leave<T>(&mut self, result: Result<T, ConversionError>) -> Result<T, ConversionError> {
        self.in_operation = false;
        match &result {
            Err(ConversionError::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => {
                debug!(%err, "conversion failed, poisoning stream");
                self.poisoned = true;
            }
            Ok(_) => {}
        }
        result
    }
}

/// Pull-style converter: reads plain text from `R`, yields converted bytes.
///
/// ```rust
/// use std::io::Read;
///
/// use sanistream::{ConverterOptions, ConverterReader, FormatOptions, OutputFormat};
///
/// let options = ConverterOptions {
///     format: FormatOptions {
///         output_format: OutputFormat::HtmlFragment,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// let mut reader = ConverterReader::new("1 < 2".as_bytes(), options);
/// let mut html = String::new();
/// reader.read_to_string(&mut html).unwrap();
/// assert_eq!(html, "1 &lt; 2");
/// ```
#[derive(Debug)]
pub struct ConverterReader<R> {
    converter: TextConverter<ReaderInput<R>, CacheOutput>,
    monitor: ProgressMonitor,
    guard: ConsistencyGuard,
}

impl<R: Read> ConverterReader<R> {
    /// Wraps `reader`.
    pub fn new(reader: R, options: ConverterOptions) -> Self {
        let input = ReaderInput::new(
            reader,
            options.input_encoding,
            options.input_buffer_size,
            options.max_token_size,
        );
        let output = CacheOutput::new(options.output_buffer_size);
        let monitor = ProgressMonitor::new(options.max_loops_without_progress());
        Self {
            converter: TextConverter::new(input, output, options),
            monitor,
            guard: ConsistencyGuard::default(),
        }
    }

    /// Returns a reference to the wrapped reader.
    pub fn get_ref(&self) -> &R {
        self.converter.tokenizer().input().get_ref()
    }

    /// Unwraps the reader.
    pub fn into_inner(self) -> R {
        self.converter.into_parts().0.into_inner()
    }

    fn read_converted(&mut self, buf: &mut [u8]) -> Result<usize, ConversionError> {
        self.monitor.reset();
        loop {
            let n = self.converter.output_mut().read(buf);
            if n > 0 {
                return Ok(n);
            }
            if self.converter.is_finished() {
                return Ok(0);
            }
            self.converter.run(&mut self.monitor)?;
            if self.converter.is_starved()
                && !self.monitor.made_progress()
                && self.converter.output().pending() == 0
            {
                return Err(io::Error::from(io::ErrorKind::WouldBlock).into());
            }
            self.monitor.check()?;
        }
    }
}

impl<R: Read> Read for ConverterReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.guard.enter()?;
        let result = self.read_converted(buf);
        Ok(self.guard.leave(result)?)
    }
}

/// Push-style converter: plain text written to it is converted into `W`.
///
/// ```rust
/// use std::io::Write;
///
/// use sanistream::{ConverterOptions, ConverterWriter, FormatOptions, LineEnding};
///
/// let options = ConverterOptions {
///     format: FormatOptions {
///         wrap_width: Some(12),
///         line_ending: LineEnding::Lf,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// let mut writer = ConverterWriter::new(Vec::new(), options);
/// writer.write_all(b"the quick brown fox").unwrap();
/// let out = writer.finish().unwrap();
/// assert_eq!(out, b"the quick\nbrown fox");
/// ```
#[derive(Debug)]
pub struct ConverterWriter<W: Write> {
    converter: TextConverter<CacheInput, WriterOutput<W>>,
    monitor: ProgressMonitor,
    guard: ConsistencyGuard,
    queue_limit: usize,
}

impl<W: Write> ConverterWriter<W> {
    /// Wraps `writer`.
    pub fn new(writer: W, options: ConverterOptions) -> Self {
        let input = CacheInput::new(
            options.input_encoding,
            options.input_buffer_size,
            options.max_token_size,
        );
        let output = WriterOutput::new(writer, options.output_buffer_size);
        let monitor = ProgressMonitor::new(options.max_loops_without_progress());
        let queue_limit = options.input_buffer_size.max(1);
        Self {
            converter: TextConverter::new(input, output, options),
            monitor,
            guard: ConsistencyGuard::default(),
            queue_limit,
        }
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        self.converter.output().get_ref()
    }

    /// Runs the converter until the queued input is consumed or the inner
    /// writer stops accepting data.
    fn pump(&mut self) -> Result<(), ConversionError> {
        self.monitor.reset();
        loop {
            if !self.converter.output().can_accept_more()
                && !self.converter.flush(&mut self.monitor)?
            {
                // The inner writer is blocked; queued input waits for the
                // next call.
                return Ok(());
            }
            if self.converter.is_finished() {
                return Ok(());
            }
            self.converter.run(&mut self.monitor)?;
            if self.converter.is_starved() {
                return Ok(());
            }
            self.monitor.check()?;
        }
    }

    /// Queues as much of `buf` as the queue has room for and converts it.
    fn accept(&mut self, buf: &[u8]) -> Result<usize, ConversionError> {
        if self.converter.input_mut().queued() >= self.queue_limit {
            self.pump()?;
        }
        let room = self
            .queue_limit
            .saturating_sub(self.converter.input_mut().queued());
        if room == 0 {
            return Err(io::Error::from(io::ErrorKind::WouldBlock).into());
        }
        let accepted = buf.len().min(room);
        self.converter.input_mut().push(&buf[..accepted]);
        self.pump()?;
        Ok(accepted)
    }

    /// Converts everything written so far that can be converted without
    /// more input, and flushes the inner writer.
    fn flush_converted(&mut self) -> Result<(), ConversionError> {
        self.pump()?;
        if self.converter.flush(&mut self.monitor)? {
            self.converter.output_mut().get_mut().flush()?;
            Ok(())
        } else {
            Err(io::Error::from(io::ErrorKind::WouldBlock).into())
        }
    }

    /// Marks the end of input, converts and writes everything, and returns
    /// the inner writer.
    ///
    /// # Errors
    ///
    /// Fails when the adapter is poisoned, the inner writer fails, or the
    /// document is too complex.
    pub fn finish(mut self) -> Result<W, ConversionError> {
        self.guard.enter()?;
        let result = self.finish_converted();
        self.guard.leave(result)?;
        Ok(self.converter.into_parts().1.into_inner())
    }

    fn finish_converted(&mut self) -> Result<(), ConversionError> {
        self.converter.input_mut().set_end_of_file();
        self.monitor.reset();
        loop {
            let flushed = self.converter.flush(&mut self.monitor)?;
            if self.converter.is_finished() {
                if flushed {
                    break;
                }
            } else if self.converter.output().can_accept_more() {
                self.converter.run(&mut self.monitor)?;
            }
            self.monitor.check()?;
        }
        self.converter.output_mut().get_mut().flush()?;
        debug!(
            queued = self.converter.input_mut().queued(),
            "converter writer finished"
        );
        Ok(())
    }
}

impl<W: Write> Write for ConverterWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.enter()?;
        let result = self.accept(buf);
        Ok(self.guard.leave(result)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard.enter()?;
        let result = self.flush_converted();
        Ok(self.guard.leave(result)?)
    }
}

/// Converts a byte slice in one call.
///
/// # Errors
///
/// Fails only when the document is too complex.
pub fn convert_bytes(input: &[u8], options: &ConverterOptions) -> Result<Vec<u8>, ConversionError> {
    let mut source = CacheInput::new(
        options.input_encoding,
        options.input_buffer_size,
        options.max_token_size,
    );
    source.push(input);
    source.set_end_of_file();
    let mut converter = TextConverter::new(
        source,
        CacheOutput::new(options.output_buffer_size),
        options.clone(),
    );
    let mut monitor = ProgressMonitor::new(options.max_loops_without_progress());
    let mut out = Vec::with_capacity(input.len());
    while !converter.is_finished() {
        converter.run(&mut monitor)?;
        let before = out.len();
        converter.output_mut().drain_into(&mut out);
        if out.len() > before {
            monitor.report_progress();
        }
        monitor.check()?;
    }
    converter.output_mut().drain_into(&mut out);
    Ok(out)
}

/// Converts a string in one call.
///
/// ```rust
/// use sanistream::{ConverterOptions, FormatOptions, LineEnding, convert_str};
///
/// let options = ConverterOptions {
///     recognize_quoting: true,
///     format: FormatOptions {
///         line_ending: LineEnding::Lf,
///         ..Default::default()
///     },
///     ..Default::default()
/// };
/// let text = convert_str(">>  quoted  \n\u{1b}[0mplain", &options).unwrap();
/// assert_eq!(text, ">>  quoted\n[0mplain");
/// ```
///
/// # Errors
///
/// Fails only when the document is too complex.
pub fn convert_str(input: &str, options: &ConverterOptions) -> Result<String, ConversionError> {
    let options = ConverterOptions {
        input_encoding: crate::InputEncoding::Utf8,
        ..options.clone()
    };
    let bytes = convert_bytes(input.as_bytes(), &options)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
