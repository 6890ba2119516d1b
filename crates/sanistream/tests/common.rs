#![allow(missing_docs)]
#![allow(dead_code)]

use core::fmt::Write;

use sanistream::{ConverterOptions, FormatOptions, LineEnding, convert_str};

// A short reply-quoted mail. The chunks cut on the seams the tokenizer has
// to carry across: inside words, between `\r` and `\n`, between quote
// markers, and inside the `--` signature delimiter.
#[rustfmt::skip]
pub const STREAM: [&str; 10] = [
    "Hi te",                                                    // open text run
    "am,\r",                                                    // CR waiting for its LF
    "\n\r\n>",                                                  // CRLF, empty line, first quote marker
    " Can we ship on Fri",
    "day?\r\n>",
    "> Only if the tests pass.\r\n\r",                          // second marker continues the quote run
    "\nYes. The fix for <scr",
    "ipt> handling & \"quo",
    "tes\" is in; caf\u{e9} menu attached.\r\n-",
    "- \r\nrelease bot\r\n",                                    // `-` + `- ` is the signature delimiter
];

pub fn message() -> String {
    STREAM.concat()
}

pub fn lf_options(format: FormatOptions) -> ConverterOptions {
    ConverterOptions {
        format: FormatOptions {
            line_ending: LineEnding::Lf,
            ..format
        },
        ..ConverterOptions::default()
    }
}

/// One-shot conversion of the whole message.
pub fn convert(options: &ConverterOptions) -> String {
    convert_str(&message(), options).expect("conversion failed")
}

/// Renders output one line per row, with line endings and trailing spaces
/// visible.
pub fn show_lines(out: &str) -> String {
    let mut shown = String::new();
    for line in out.split_inclusive('\n') {
        writeln!(shown, "{line:?}").unwrap();
    }
    shown
}
