#![expect(missing_docs)]

use insta::assert_snapshot;
use sanistream::{ConverterOptions, FallbackMode, FormatOptions};

mod common;

#[test]
fn snapshot_flowed_reply() {
    let options = ConverterOptions {
        recognize_quoting: true,
        ..common::lf_options(FormatOptions {
            wrap_width: Some(30),
            flowed: true,
            ..FormatOptions::default()
        })
    };
    assert_snapshot!(common::show_lines(&common::convert(&options)), @r#"
    "Hi team,\n"
    "\n"
    "> Can we ship on Friday?\n"
    ">> Only if the tests pass.\n"
    "\n"
    "Yes. The fix for <script> \n"
    "handling & \"quotes\" is in; \n"
    "café menu attached.\n"
    "-- \n"
    "release bot\n"
    "#);
}

#[test]
fn snapshot_wrapped_without_flowed_spaces() {
    let options = ConverterOptions {
        recognize_quoting: true,
        ..common::lf_options(FormatOptions {
            wrap_width: Some(30),
            ..FormatOptions::default()
        })
    };
    assert_snapshot!(common::show_lines(&common::convert(&options)), @r#"
    "Hi team,\n"
    "\n"
    "> Can we ship on Friday?\n"
    ">> Only if the tests pass.\n"
    "\n"
    "Yes. The fix for <script>\n"
    "handling & \"quotes\" is in;\n"
    "café menu attached.\n"
    "-- \n"
    "release bot\n"
    "#);
}

#[test]
fn snapshot_forwarded_ascii() {
    let options = ConverterOptions {
        format: FormatOptions {
            base_quoting_level: 1,
            fallback: FallbackMode::AsciiText,
            ..FormatOptions::default()
        },
        ..ConverterOptions::default()
    };
    assert_snapshot!(common::show_lines(&common::convert(&options)), @r#"
    "> Hi team,\r\n"
    ">\r\n"
    "> > Can we ship on Friday?\r\n"
    "> >> Only if the tests pass.\r\n"
    ">\r\n"
    "> Yes. The fix for <script> handling & \"quotes\" is in; caf? menu attached.\r\n"
    "> -- \r\n"
    "> release bot\r\n"
    "#);
}
