//! Incremental byte-to-text decoding.
//!
//! Byte sources hand over arbitrary slices; a multi-byte sequence or a
//! surrogate pair can be cut anywhere. [`InputDecoder`] carries the cut prefix
//! over to the next call so that the decoded text is independent of how the
//! input was chunked.
//!
//! Malformed input never fails:
//! - UTF-8: each maximal invalid subpart becomes one U+FFFD. An unterminated
//!   sequence at end of input becomes one U+FFFD.
//! - UTF-16: unpaired surrogates and a trailing odd byte are dropped.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Character encoding of a byte input.
///
/// The encoding is configured, never detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InputEncoding {
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-16, big endian.
    Utf16Be,
}

const REPLACEMENT: char = '\u{FFFD}';

/// Streaming decoder for one document.
#[derive(Debug, Clone)]
pub struct InputDecoder {
    encoding: InputEncoding,
    pending: [u8; 4],
    pending_len: usize,
    high_surrogate: Option<u16>,
}

impl InputDecoder {
    /// Creates a decoder with nothing carried over.
    #[must_use]
    pub fn new(encoding: InputEncoding) -> Self {
        Self {
            encoding,
            pending: [0; 4],
            pending_len: 0,
            high_surrogate: None,
        }
    }

    /// The configured encoding.
    #[must_use]
    pub fn encoding(&self) -> InputEncoding {
        self.encoding
    }

    /// Returns `true` while part of a sequence is carried over.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_len > 0 || self.high_surrogate.is_some()
    }

    /// Drops anything carried over.
    pub fn reset(&mut self) {
        self.pending_len = 0;
        self.high_surrogate = None;
    }

    /// Decodes `bytes`, appending the text to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        match self.encoding {
            InputEncoding::Utf8 => self.decode_utf8(bytes, out),
            InputEncoding::Utf16Le => self.decode_utf16(bytes, out, u16::from_le_bytes),
            InputEncoding::Utf16Be => self.decode_utf16(bytes, out, u16::from_be_bytes),
        }
    }

    /// Flushes the carried-over state at end of input.
    pub fn finish(&mut self, out: &mut String) {
        if self.encoding == InputEncoding::Utf8 && self.pending_len > 0 {
            out.push(REPLACEMENT);
        }
        self.reset();
    }

    fn decode_utf8(&mut self, mut bytes: &[u8], out: &mut String) {
        while self.pending_len > 0 && !bytes.is_empty() {
            let have = self.pending_len;
            let take = (4 - have).min(bytes.len());
            let mut tmp = [0u8; 4];
            tmp[..have].copy_from_slice(&self.pending[..have]);
            tmp[have..have + take].copy_from_slice(&bytes[..take]);
            let n = have + take;

            match bstr::decode_utf8(&tmp[..n]) {
                (Some(ch), size) => {
                    out.push(ch);
                    self.pending_len = 0;
                    bytes = &bytes[size - have..];
                }
                (None, size) if size == n => {
                    // Valid prefix, still short.
                    self.pending[..n].copy_from_slice(&tmp[..n]);
                    self.pending_len = n;
                    bytes = &bytes[take..];
                }
                (None, size) => {
                    out.push(REPLACEMENT);
                    if size >= have {
                        self.pending_len = 0;
                        bytes = &bytes[size - have..];
                    } else {
                        self.pending.copy_within(size..have, 0);
                        self.pending_len = have - size;
                    }
                }
            }
        }
        if self.pending_len > 0 {
            return;
        }

        loop {
            match core::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(prefix) = core::str::from_utf8(&bytes[..valid]) {
                        out.push_str(prefix);
                    }
                    if let Some(len) = err.error_len() {
                        out.push(REPLACEMENT);
                        bytes = &bytes[valid + len..];
                    } else {
                        let rest = &bytes[valid..];
                        self.pending[..rest.len()].copy_from_slice(rest);
                        self.pending_len = rest.len();
                        return;
                    }
                }
            }
        }
    }

    fn decode_utf16(&mut self, bytes: &[u8], out: &mut String, unit: fn([u8; 2]) -> u16) {
        let mut pos = 0;
        if self.pending_len == 1 {
            let Some(&second) = bytes.first() else {
                return;
            };
            self.push_utf16_unit(unit([self.pending[0], second]), out);
            self.pending_len = 0;
            pos = 1;
        }
        while pos + 1 < bytes.len() {
            self.push_utf16_unit(unit([bytes[pos], bytes[pos + 1]]), out);
            pos += 2;
        }
        if pos < bytes.len() {
            self.pending[0] = bytes[pos];
            self.pending_len = 1;
        }
    }

    fn push_utf16_unit(&mut self, unit: u16, out: &mut String) {
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let cp = 0x1_0000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(unit) - 0xDC00);
                    if let Some(ch) = char::from_u32(cp) {
                        out.push(ch);
                    }
                }
            }
            _ => {
                self.high_surrogate = None;
                if let Some(ch) = char::from_u32(u32::from(unit)) {
                    out.push(ch);
                }
            }
        }
    }
}
