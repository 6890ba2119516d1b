//! Safe-character fallback encoding.
//!
//! Overview
//! - A [`Fallback`] decides which characters are unsafe in the output context
//!   and how to re-encode them. ASCII goes through a 128-entry bitmap so the
//!   common case is one table lookup; everything else asks
//!   [`Fallback::is_unsafe_unicode`].
//! - [`Fallback::fallback_char`] writes the replacement into a caller-supplied
//!   slice and returns `None` when the slice is too small. The caller makes
//!   room and retries; nothing is ever written past the slice.
//! - [`HtmlFallback`] produces character references, [`TextFallback`] drops
//!   controls and optionally transliterates to ASCII.

use std::{
    fmt,
    io::{Cursor, Write as _},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::classify::{CharClass, classify};

/// Longest replacement any provided fallback writes for one character.
pub const MAX_FALLBACK_LEN: usize = 16;

/// Bit in [`UNSAFE_ASCII`] for characters unsafe in HTML text.
pub const UNSAFE_IN_HTML: u8 = 0x01;
/// Bit in [`UNSAFE_ASCII`] for characters unsafe in plain text.
pub const UNSAFE_IN_TEXT: u8 = 0x02;

const fn build_unsafe_ascii() -> [u8; 128] {
    let mut map = [0u8; 128];
    let mut i = 0;
    while i < 128 {
        let is_control = (i < 0x20 && i != 0x09 && i != 0x0A && i != 0x0D) || i == 0x7F;
        if is_control {
            map[i] = UNSAFE_IN_HTML | UNSAFE_IN_TEXT;
        }
        i += 1;
    }
    map[b'<' as usize] = UNSAFE_IN_HTML;
    map[b'>' as usize] = UNSAFE_IN_HTML;
    map[b'&' as usize] = UNSAFE_IN_HTML;
    map[b'"' as usize] = UNSAFE_IN_HTML;
    map[b'\'' as usize] = UNSAFE_IN_HTML;
    map
}

/// Per-context unsafe bits for every ASCII byte.
pub static UNSAFE_ASCII: [u8; 128] = build_unsafe_ascii();

/// Named references for U+00A0..=U+00FF.
static LATIN1_ENTITIES: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf",
    "laquo", "not", "shy", "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro",
    "para", "middot", "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil", "Egrave", "Eacute",
    "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve", "Oacute",
    "Ocirc", "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute",
    "THORN", "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil",
    "egrave", "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde",
    "ograve", "oacute", "ocirc", "otilde", "ouml", "divide", "oslash", "ugrave", "uacute", "ucirc",
    "uuml", "yacute", "thorn", "yuml",
];

/// Named reference for a Latin-1 supplement character.
#[must_use]
pub fn latin1_entity(ch: char) -> Option<&'static str> {
    let index = u32::from(ch).checked_sub(0xA0)?;
    LATIN1_ENTITIES.get(index as usize).copied()
}

/// Strategy for re-encoding characters that are unsafe or unrepresentable in
/// the output context.
pub trait Fallback: fmt::Debug {
    /// The ASCII bitmap and the mask selecting this context's bits. Byte `b`
    /// is unsafe when `map[b] & mask != 0`.
    fn unsafe_ascii_map(&self) -> (&[u8; 128], u8);

    /// Whether a non-ASCII character needs [`fallback_char`](Self::fallback_char).
    /// `is_first_char` is `true` for the first character of a write.
    fn is_unsafe_unicode(&self, ch: char, is_first_char: bool) -> bool;

    /// Writes the replacement for `ch` into `out` and returns its length;
    /// `Some(0)` drops the character. Returns `None` when `out` is too small.
    fn fallback_char(&self, ch: char, out: &mut [u8]) -> Option<usize>;

    /// Returns `true` when `ch` must go through the fallback.
    fn is_unsafe(&self, ch: char, is_first_char: bool) -> bool {
        if ch.is_ascii() {
            let (map, mask) = self.unsafe_ascii_map();
            map[ch as usize] & mask != 0
        } else {
            self.is_unsafe_unicode(ch, is_first_char)
        }
    }
}

/// Bidirectional embedding, override, and isolate controls.
fn is_bidi_control(ch: char) -> bool {
    matches!(ch, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}')
}

fn is_combining_mark(ch: char) -> bool {
    matches!(
        ch,
        '\u{0300}'..='\u{036F}'
            | '\u{1AB0}'..='\u{1AFF}'
            | '\u{1DC0}'..='\u{1DFF}'
            | '\u{20D0}'..='\u{20FF}'
            | '\u{FE20}'..='\u{FE2F}'
    )
}

fn must_drop(ch: char) -> bool {
    classify(ch).intersects(CharClass::SKIPPABLE) || is_bidi_control(ch)
}

fn write_into(out: &mut [u8], args: fmt::Arguments<'_>) -> Option<usize> {
    let mut cursor = Cursor::new(out);
    cursor.write_fmt(args).ok()?;
    usize::try_from(cursor.position()).ok()
}

/// Escapes for HTML text and attribute values.
///
/// ```rust
/// use sanistream::{Fallback, HtmlFallback};
///
/// let fallback = HtmlFallback::default();
/// let mut out = [0u8; 16];
/// let n = fallback.fallback_char('<', &mut out).unwrap();
/// assert_eq!(&out[..n], b"&lt;");
/// assert_eq!(fallback.fallback_char('<', &mut out[..2]), None);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFallback {
    /// Encode every non-ASCII character as a reference.
    pub encode_non_ascii: bool,
}

impl HtmlFallback {
    /// Creates an HTML fallback.
    #[must_use]
    pub fn new(encode_non_ascii: bool) -> Self {
        Self { encode_non_ascii }
    }
}

impl Fallback for HtmlFallback {
    fn unsafe_ascii_map(&self) -> (&[u8; 128], u8) {
        (&UNSAFE_ASCII, UNSAFE_IN_HTML)
    }

    fn is_unsafe_unicode(&self, ch: char, is_first_char: bool) -> bool {
        self.encode_non_ascii
            || must_drop(ch)
            || (is_first_char && is_combining_mark(ch))
    }

    fn fallback_char(&self, ch: char, out: &mut [u8]) -> Option<usize> {
        let named = match ch {
            '<' => "lt",
            '>' => "gt",
            '&' => "amp",
            '"' => "quot",
            '\'' => return write_into(out, format_args!("&#39;")),
            _ if must_drop(ch) => return Some(0),
            _ => match latin1_entity(ch) {
                Some(name) => name,
                None => return write_into(out, format_args!("&#{};", u32::from(ch))),
            },
        };
        write_into(out, format_args!("&{named};"))
    }
}

/// Plain-text fallback: drops controls, optionally restricts output to ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFallback {
    /// Transliterate or replace every non-ASCII character.
    pub ascii_only: bool,
}

impl TextFallback {
    /// Creates a text fallback.
    #[must_use]
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }
}

fn transliterate(ch: char) -> &'static str {
    match ch {
        '\u{A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => " ",
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => "\"",
        '\u{2010}'..='\u{2013}' | '\u{2212}' => "-",
        '\u{2014}' | '\u{2015}' => "--",
        '\u{2026}' => "...",
        '\u{A9}' => "(C)",
        '\u{AE}' => "(R)",
        '\u{2122}' => "(TM)",
        '\u{AB}' => "<<",
        '\u{BB}' => ">>",
        '\u{2039}' => "<",
        '\u{203A}' => ">",
        '\u{2022}' | '\u{B7}' => "*",
        _ => "?",
    }
}

impl Fallback for TextFallback {
    fn unsafe_ascii_map(&self) -> (&[u8; 128], u8) {
        (&UNSAFE_ASCII, UNSAFE_IN_TEXT)
    }

    fn is_unsafe_unicode(&self, ch: char, _is_first_char: bool) -> bool {
        self.ascii_only || must_drop(ch)
    }

    fn fallback_char(&self, ch: char, out: &mut [u8]) -> Option<usize> {
        if must_drop(ch) {
            Some(0)
        } else if self.ascii_only {
            write_into(out, format_args!("{}", transliterate(ch)))
        } else {
            write_into(out, format_args!("{ch}"))
        }
    }
}

/// Fallback applied to text output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FallbackMode {
    /// Write characters unchanged.
    None,
    /// Escape as HTML text, for plain text embedded in markup.
    Html,
    /// Drop controls and bidi controls.
    #[default]
    Text,
    /// Like `Text`, and transliterate everything else to ASCII.
    AsciiText,
}

impl FallbackMode {
    /// Instantiates the fallback, if any.
    #[must_use]
    pub fn build(self) -> Option<Box<dyn Fallback>> {
        match self {
            Self::None => None,
            Self::Html => Some(Box::new(HtmlFallback::new(false))),
            Self::Text => Some(Box::new(TextFallback::new(false))),
            Self::AsciiText => Some(Box::new(TextFallback::new(true))),
        }
    }
}
