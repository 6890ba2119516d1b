use std::io;

use thiserror::Error;

/// Errors raised by the streaming conversion pipeline.
///
/// Malformed input is never an error: invalid code units and control
/// characters are dropped or substituted where they are found. What remains
/// are usage errors, I/O failures of the underlying source or sink, and the
/// progress bound firing.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The driving loop ran `loops` iterations in a row without consuming
    /// input or producing output.
    ///
    /// The document is either pathological or triggered a logic error; it is
    /// not safe to retry the same document.
    #[error("document too complex to convert: no progress after {loops} iterations")]
    TooComplex {
        /// Number of consecutive iterations without progress.
        loops: u32,
    },
    /// A previous operation on this instance failed or unwound, leaving it in
    /// an unknown state.
    #[error("converter is unusable after a failed operation")]
    Poisoned,
    /// Attempted to restart a tokenizer or converter while tokens, input, or
    /// output from the previous document are still pending.
    #[error("cannot restart while the previous document is not fully flushed")]
    RestartPending,
    /// The input source or output sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ConversionError {
    /// Returns `true` for the progress-bound failure.
    #[must_use]
    pub fn is_too_complex(&self) -> bool {
        matches!(self, Self::TooComplex { .. })
    }
}

impl From<ConversionError> for io::Error {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_unwrap_when_converted_back() {
        let err = ConversionError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn too_complex_is_wrapped_as_other() {
        let io_err: io::Error = ConversionError::TooComplex { loops: 7 }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::Other);
        assert!(io_err.to_string().contains("no progress after 7 iterations"));
    }
}
