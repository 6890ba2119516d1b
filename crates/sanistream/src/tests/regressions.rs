use std::io::{self, Write};

use rstest::rstest;

use super::{lf_options, tokenize_chunks};
use crate::{
    ConversionError, ConverterOptions, ConverterWriter, FormatOptions, InputEncoding,
    OutputFormat, RunKind, convert_bytes, convert_str,
};

#[test]
fn mixed_whitespace_runs_survive_one_byte_chunks() {
    let text: &[u8] = b"a b\tc\r\nd";
    let expected = vec![
        (RunKind::Text, "a".to_owned()),
        (RunKind::Space, " ".to_owned()),
        (RunKind::Text, "b".to_owned()),
        (RunKind::Tabulation, "\t".to_owned()),
        (RunKind::Text, "c".to_owned()),
        (RunKind::Newline, "\r\n".to_owned()),
        (RunKind::Text, "d".to_owned()),
    ];
    assert_eq!(tokenize_chunks(&[text], false), expected);
    let one_byte: Vec<&[u8]> = text.chunks(1).collect();
    assert_eq!(tokenize_chunks(&one_byte, false), expected);
}

#[rstest]
#[case::newline_free("no newline", "no newline\n")]
#[case::already_terminated("one\n", "one\n")]
#[case::only_controls("\u{0}\u{1}\u{7f}", "")]
#[case::empty("", "")]
#[case::only_spaces("   ", "\n")]
#[case::only_tab("\t", "\n")]
#[case::only_nbsp("\u{a0}", "\n")]
#[case::lone_cr("a\rb", "a\nb")]
#[case::trailing_cr("a\r", "a\n")]
fn text_document_termination(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(convert_str(input, &lf_options()).unwrap(), expected);
}

#[test]
fn control_between_cr_and_lf_keeps_one_line_break() {
    let text: &[u8] = b"a\r\x00\nb";
    let expected = vec![
        (RunKind::Text, "a".to_owned()),
        (RunKind::Newline, "\r\n".to_owned()),
        (RunKind::Text, "b".to_owned()),
    ];
    assert_eq!(tokenize_chunks(&[text], false), expected);
    let one_byte: Vec<&[u8]> = text.chunks(1).collect();
    assert_eq!(tokenize_chunks(&one_byte, false), expected);
    assert_eq!(convert_str("a\r\u{1}\u{7f}\nb", &lf_options()).unwrap(), "a\nb\n");
}

#[test]
fn utf16_input_is_decoded() {
    let bytes: Vec<u8> = "h\u{e9} \u{1f600}\n"
        .encode_utf16()
        .flat_map(u16::to_be_bytes)
        .collect();
    let options = ConverterOptions {
        input_encoding: InputEncoding::Utf16Be,
        ..lf_options()
    };
    let out = convert_bytes(&bytes, &options).unwrap();
    assert_eq!(out, "h\u{e9} \u{1f600}\n".as_bytes());
}

#[test]
fn invalid_utf8_becomes_replacement_characters() {
    let out = convert_bytes(b"a\xffb\xe2\x82", &lf_options()).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "a\u{fffd}b\u{fffd}\n");
}

#[test]
fn html_document_is_wrapped() {
    let options = ConverterOptions {
        recognize_quoting: true,
        format: FormatOptions {
            output_format: OutputFormat::Html,
            ..lf_options().format
        },
        ..lf_options()
    };
    let out = convert_str("> q\nx", &options).unwrap();
    assert_eq!(
        out,
        "<html><body><blockquote type=\"cite\">q<br>\n</blockquote>x</body></html>"
    );
}

struct Broken;

impl Write for Broken {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("pipe closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn writer_errors_poison_the_converter() {
    let options = ConverterOptions {
        output_buffer_size: 1,
        ..lf_options()
    };
    let mut writer = ConverterWriter::new(Broken, options);
    let err = writer.write_all(b"one\ntwo\n").unwrap_err();
    assert!(err.to_string().contains("pipe closed"));
    assert!(writer.write(b"x").is_err());
    assert!(matches!(writer.finish(), Err(ConversionError::Poisoned)));
}
