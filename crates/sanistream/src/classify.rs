//! Character classification.
//!
//! Every code point maps to a [`CharClass`] bitset. Latin-1 is served from a
//! 256-entry table built at compile time; anything above U+00FF goes through
//! a short range test. Composite classes are unions of primitive bits, so a
//! membership test is a single AND.

use core::ops::BitOr;

/// A set of syntactic classes a character belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CharClass(u32);

impl CharClass {
    /// The empty set.
    pub const NONE: Self = Self(0);
    /// Noncharacters and other code points that must never be emitted.
    pub const INVALID: Self = Self(1 << 0);
    /// C0 and C1 controls other than tab, CR, and LF, plus DEL.
    pub const CONTROL: Self = Self(1 << 1);
    /// U+0020.
    pub const SPACE: Self = Self(1 << 2);
    /// U+0009.
    pub const TAB: Self = Self(1 << 3);
    /// U+000D.
    pub const CR: Self = Self(1 << 4);
    /// U+000A.
    pub const LF: Self = Self(1 << 5);
    /// U+00A0.
    pub const NBSP: Self = Self(1 << 6);
    /// `"`
    pub const QUOTE_DOUBLE: Self = Self(1 << 7);
    /// `'`
    pub const QUOTE_SINGLE: Self = Self(1 << 8);
    /// `` ` ``
    pub const GRAVE: Self = Self(1 << 9);
    /// `<`
    pub const LT: Self = Self(1 << 10);
    /// `>`
    pub const GT: Self = Self(1 << 11);
    /// `&`
    pub const AMP: Self = Self(1 << 12);
    /// `=`
    pub const EQUALS: Self = Self(1 << 13);
    /// `/`
    pub const SLASH: Self = Self(1 << 14);
    /// `( ) [ ] { }`
    pub const BRACKET: Self = Self(1 << 15);
    /// ASCII and Latin-1 letters.
    pub const ALPHA: Self = Self(1 << 16);
    /// `0-9`
    pub const DIGIT: Self = Self(1 << 17);
    /// `0-9 A-F a-f`
    pub const HEX: Self = Self(1 << 18);
    /// Printable ASCII punctuation.
    pub const PUNCT: Self = Self(1 << 19);
    /// Anything that belongs in a text run.
    pub const TEXT: Self = Self(1 << 20);
    /// Latin-1 supplement letters and symbols (U+00A1..=U+00FF).
    pub const LATIN1: Self = Self(1 << 21);
    /// General punctuation band, ideographic space, and the BOM.
    pub const UNICODE_SPECIAL: Self = Self(1 << 22);

    /// Space, tab, CR, LF, or nbsp.
    pub const WHITESPACE: Self = Self(
        Self::SPACE.0 | Self::TAB.0 | Self::CR.0 | Self::LF.0 | Self::NBSP.0,
    );
    /// CR or LF.
    pub const NEWLINE: Self = Self(Self::CR.0 | Self::LF.0);
    /// Any quote character.
    pub const QUOTE: Self = Self(Self::QUOTE_DOUBLE.0 | Self::QUOTE_SINGLE.0 | Self::GRAVE.0);
    /// Characters that need escaping in HTML text.
    pub const HTML_SPECIAL: Self = Self(
        Self::LT.0 | Self::GT.0 | Self::AMP.0 | Self::QUOTE_DOUBLE.0 | Self::QUOTE_SINGLE.0,
    );
    /// Characters that end an unquoted HTML attribute value.
    pub const HTML_ATTR_UNSAFE: Self = Self(
        Self::WHITESPACE.0
            | Self::QUOTE.0
            | Self::LT.0
            | Self::GT.0
            | Self::EQUALS.0
            | Self::AMP.0
            | Self::CONTROL.0
            | Self::INVALID.0,
    );
    /// Letters or digits.
    pub const ALNUM: Self = Self(Self::ALPHA.0 | Self::DIGIT.0);
    /// Characters the tokenizer removes from the stream.
    pub const SKIPPABLE: Self = Self(Self::CONTROL.0 | Self::INVALID.0);

    /// Returns `true` if `self` shares at least one class with `other`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if every class of `other` is present in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for CharClass {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

const fn latin1_class(b: u8) -> CharClass {
    match b {
        b'\t' => CharClass::TAB,
        b'\n' => CharClass::LF,
        b'\r' => CharClass::CR,
        b' ' => CharClass::SPACE,
        0x00..=0x1F | 0x7F..=0x9F => CharClass::CONTROL,
        0xA0 => CharClass::NBSP,
        b'0'..=b'9' => CharClass::TEXT
            .union(CharClass::DIGIT)
            .union(CharClass::HEX),
        b'A'..=b'F' | b'a'..=b'f' => CharClass::TEXT
            .union(CharClass::ALPHA)
            .union(CharClass::HEX),
        b'G'..=b'Z' | b'g'..=b'z' => CharClass::TEXT.union(CharClass::ALPHA),
        0xD7 | 0xF7 => CharClass::TEXT.union(CharClass::LATIN1),
        0xC0..=0xFF => CharClass::TEXT
            .union(CharClass::LATIN1)
            .union(CharClass::ALPHA),
        0xA1..=0xBF => CharClass::TEXT.union(CharClass::LATIN1),
        _ => {
            let punct = CharClass::TEXT.union(CharClass::PUNCT);
            match b {
                b'"' => punct.union(CharClass::QUOTE_DOUBLE),
                b'\'' => punct.union(CharClass::QUOTE_SINGLE),
                b'`' => punct.union(CharClass::GRAVE),
                b'<' => punct.union(CharClass::LT),
                b'>' => punct.union(CharClass::GT),
                b'&' => punct.union(CharClass::AMP),
                b'=' => punct.union(CharClass::EQUALS),
                b'/' => punct.union(CharClass::SLASH),
                b'(' | b')' | b'[' | b']' | b'{' | b'}' => punct.union(CharClass::BRACKET),
                _ => punct,
            }
        }
    }
}

const fn build_table() -> [CharClass; 256] {
    let mut table = [CharClass::NONE; 256];
    let mut i = 0;
    while i < 256 {
        #[allow(clippy::cast_possible_truncation)]
        {
            table[i] = latin1_class(i as u8);
        }
        i += 1;
    }
    table
}

static LATIN1_TABLE: [CharClass; 256] = build_table();

/// Classifies a single code point.
#[inline]
#[must_use]
pub fn classify(ch: char) -> CharClass {
    let cp = u32::from(ch);
    if cp < 0x100 {
        return LATIN1_TABLE[cp as usize];
    }
    if (0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE {
        CharClass::INVALID
    } else if (0x2000..=0x206F).contains(&cp) || cp == 0x3000 || cp == 0xFEFF {
        CharClass::UNICODE_SPECIAL | CharClass::TEXT
    } else {
        CharClass::TEXT
    }
}

/// Classifies a byte as a Latin-1 code point.
#[inline]
#[must_use]
pub fn classify_latin1(b: u8) -> CharClass {
    LATIN1_TABLE[b as usize]
}
