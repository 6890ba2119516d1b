mod regressions;

use crate::{
    CacheInput, CacheOutput, Converter, ConverterOptions, FormatOptions, InputEncoding,
    LineEnding, ProgressMonitor, RunKind, TextConverter, TextTokenizer, TokenId,
};

#[cfg(not(miri))]
pub(crate) fn quickcheck_tests() -> u64 {
    if is_ci::cached() { 10_000 } else { 1_000 }
}

#[cfg(miri)]
pub(crate) fn quickcheck_tests() -> u64 {
    10
}

pub(crate) fn lf_options() -> ConverterOptions {
    ConverterOptions {
        format: FormatOptions {
            line_ending: LineEnding::Lf,
            ..FormatOptions::default()
        },
        ..ConverterOptions::default()
    }
}

/// Appends a run, merging it into the previous one when both are the same
/// splittable kind. Run boundaries inside one kind depend on the token
/// bounds, not on the text.
fn push_run(runs: &mut Vec<(RunKind, String)>, kind: RunKind, text: &str) {
    let mergeable = !matches!(kind, RunKind::Newline | RunKind::Special);
    match runs.last_mut() {
        Some((last_kind, last_text)) if mergeable && *last_kind == kind => {
            last_text.push_str(text);
        }
        _ => runs.push((kind, text.to_owned())),
    }
}

fn drain_tokens(tokenizer: &mut TextTokenizer<CacheInput>, runs: &mut Vec<(RunKind, String)>) -> bool {
    loop {
        match tokenizer.next_token().unwrap() {
            TokenId::Text => {
                for run in tokenizer.token().runs() {
                    push_run(runs, run.kind, run.text);
                }
            }
            TokenId::None => return false,
            TokenId::EndOfFile => return true,
        }
    }
}

/// Tokenizes `chunks` pushed one at a time and returns the merged runs.
pub(crate) fn tokenize_chunks(chunks: &[&[u8]], recognize_quoting: bool) -> Vec<(RunKind, String)> {
    let mut tokenizer =
        TextTokenizer::new(CacheInput::new(InputEncoding::Utf8, 5, 16), 4, recognize_quoting);
    let mut runs = Vec::new();
    for chunk in chunks {
        tokenizer.input_mut().push(chunk);
        assert!(!drain_tokens(&mut tokenizer, &mut runs));
    }
    tokenizer.input_mut().set_end_of_file();
    assert!(drain_tokens(&mut tokenizer, &mut runs));
    runs
}

/// Converts `chunks` pushed one at a time, draining output between steps.
pub(crate) fn convert_chunks(
    chunks: &[&[u8]],
    options: &ConverterOptions,
) -> Result<Vec<u8>, crate::ConversionError> {
    let input = CacheInput::new(
        options.input_encoding,
        options.input_buffer_size,
        options.max_token_size,
    );
    let output = CacheOutput::new(options.output_buffer_size);
    let mut converter = TextConverter::new(input, output, options.clone());
    let mut monitor = ProgressMonitor::new(options.max_loops_without_progress());
    let mut out = Vec::new();
    let mut chunks = chunks.iter();
    while !converter.is_finished() {
        if converter.is_starved() {
            match chunks.next() {
                Some(chunk) => converter.input_mut().push(chunk),
                None => converter.input_mut().set_end_of_file(),
            }
        }
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
