//! Text conversion driver.
//!
//! [`TextConverter`] ties a tokenizer to a formatter and exposes the bounded
//! step contract of [`Converter`]. A document goes through three phases: the
//! header fragment, the body, and the footer fragment followed by closing
//! the document. Fragments are tokenized by a second, reusable tokenizer so
//! the body tokenizer's position is never disturbed.

use tracing::debug;

use crate::{
    ConversionError,
    formatter::TextFormatter,
    input::{FragmentInput, InputSource},
    options::{ConverterOptions, HeaderFooterFormat},
    output::OutputSink,
    progress::ProgressMonitor,
    token::{RunKind, TokenId, TokenView},
    tokenizer::TextTokenizer,
};

/// A converter driven one bounded step at a time.
pub trait Converter {
    /// Performs one bounded unit of work: reads what input is available,
    /// tokenizes it, and formats it until the output asks for draining.
    ///
    /// # Errors
    ///
    /// Propagates input failures.
    fn run(&mut self, monitor: &mut ProgressMonitor) -> Result<(), ConversionError>;

    /// Pushes staged output on. Returns `true` once nothing is staged.
    ///
    /// # Errors
    ///
    /// Propagates output failures.
    fn flush(&mut self, monitor: &mut ProgressMonitor) -> Result<bool, ConversionError>;

    /// Returns `true` once the whole document, footer included, was
    /// formatted.
    fn is_finished(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
    Footer,
    Finished,
}

/// Feeds the runs of `token` to `formatter`.
pub fn format_token<O: OutputSink>(token: TokenView<'_>, formatter: &mut TextFormatter<O>) {
    for run in token.runs() {
        match run.kind {
            RunKind::Text => formatter.text(run.text),
            RunKind::Space => formatter.space(run.text),
            RunKind::Newline => formatter.newline(),
            RunKind::Tabulation => formatter.tab(run.text),
            RunKind::Nbsp => formatter.nbsp(run.text),
            RunKind::Special => formatter.quote(run.payload),
        }
    }
}

/// Converts plain text from `I` into formatted text or HTML in `O`.
#[derive(Debug)]
pub struct TextConverter<I, O> {
    tokenizer: TextTokenizer<I>,
    fragments: TextTokenizer<FragmentInput>,
    formatter: TextFormatter<O>,
    options: ConverterOptions,
    phase: Phase,
    starved: bool,
}

impl<I: InputSource, O: OutputSink> TextConverter<I, O> {
    /// Creates a converter over `input` and `output`.
    pub fn new(input: I, output: O, options: ConverterOptions) -> Self {
        debug!(
            format = ?options.format.output_format,
            wrap_width = ?options.format.wrap_width,
            flowed = options.format.flowed,
            "creating text converter"
        );
        Self {
            tokenizer: TextTokenizer::new(
                input,
                options.max_runs_per_token,
                options.recognize_quoting,
            ),
            fragments: TextTokenizer::new(
                FragmentInput::default(),
                options.max_runs_per_token,
                false,
            ),
            formatter: TextFormatter::new(output, options.format),
            options,
            phase: Phase::Header,
            starved: false,
        }
    }

    /// The options this converter was created with.
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// The body tokenizer.
    pub fn tokenizer(&self) -> &TextTokenizer<I> {
        &self.tokenizer
    }

    /// Mutable access to the input source.
    pub fn input_mut(&mut self) -> &mut I {
        self.tokenizer.input_mut()
    }

    /// The output sink.
    pub fn output(&self) -> &O {
        self.formatter.output()
    }

    /// Mutable access to the output sink.
    pub fn output_mut(&mut self) -> &mut O {
        self.formatter.output_mut()
    }

    /// Unwraps the input source and output sink.
    pub fn into_parts(self) -> (I, O) {
        (self.tokenizer.into_input(), self.formatter.into_output())
    }

    /// Returns `true` when the last step stopped because the input had
    /// nothing available.
    pub fn is_starved(&self) -> bool {
        self.starved
    }

    /// Restarts on a new document, keeping all buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::RestartPending`] unless the previous
    /// document was fully converted and its output fully drained.
    pub fn initialize(&mut self, input: I) -> Result<(), ConversionError> {
        if self.phase != Phase::Finished || self.formatter.output().pending() > 0 {
            return Err(ConversionError::RestartPending);
        }
        self.tokenizer.initialize(input)?;
        self.formatter.reset();
        self.phase = Phase::Header;
        self.starved = false;
        debug!("text converter restarted");
        Ok(())
    }

    fn inject(&mut self, fragment: Option<&str>) -> Result<(), ConversionError> {
        let Some(fragment) = fragment.filter(|f| !f.is_empty()) else {
            return Ok(());
        };
        if self.options.header_footer_format == HeaderFooterFormat::Html
            && self.options.format.output_format.is_html()
        {
            self.formatter.write_raw(fragment);
            return Ok(());
        }

        self.fragments.input_mut().set(fragment);
        self.fragments.reinitialize()?;
        loop {
            match self.fragments.next_token()? {
                TokenId::Text => format_token(self.fragments.token(), &mut self.formatter),
                TokenId::EndOfFile | TokenId::None => return Ok(()),
            }
        }
    }

    fn run_body(&mut self, monitor: &mut ProgressMonitor) -> Result<(), ConversionError> {
        while self.formatter.can_accept_more() {
            let processed = self.tokenizer.processed();
            let id = self.tokenizer.next_token()?;
            if self.tokenizer.processed() != processed {
                monitor.report_progress();
            }
            match id {
                TokenId::Text => {
                    format_token(self.tokenizer.token(), &mut self.formatter);
                    monitor.report_progress();
                }
                TokenId::EndOfFile => {
                    self.phase = Phase::Footer;
                    monitor.report_progress();
                    return Ok(());
                }
                TokenId::None => {
                    self.starved = true;
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl<I: InputSource, O: OutputSink> Converter for TextConverter<I, O> {
    fn run(&mut self, monitor: &mut ProgressMonitor) -> Result<(), ConversionError> {
        self.starved = false;
        match self.phase {
            Phase::Header => {
                let header = self.options.header.take();
                let result = self.inject(header.as_deref());
                self.options.header = header;
                result?;
                self.phase = Phase::Body;
                monitor.report_progress();
            }
            Phase::Body => self.run_body(monitor)?,
            Phase::Footer => {
                let footer = self.options.footer.take();
                let result = self.inject(footer.as_deref());
                self.options.footer = footer;
                result?;
                self.formatter.close_document();
                self.phase = Phase::Finished;
                monitor.report_progress();
                debug!(processed = self.tokenizer.processed(), "text converter finished");
            }
            Phase::Finished => {}
        }
        Ok(())
    }

    fn flush(&mut self, monitor: &mut ProgressMonitor) -> Result<bool, ConversionError> {
        let before = self.formatter.output().pending();
        let done = self.formatter.output_mut().flush()?;
        if self.formatter.output().pending() < before {
            monitor.report_progress();
        }
        Ok(done)
    }

    fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }
}
