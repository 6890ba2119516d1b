#![no_main]
use std::cell::RefCell;
use std::io::Write;

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use sanistream::{
    ChunkedCache, ConverterOptions, ConverterWriter, FallbackMode, FormatOptions, InputEncoding,
    LineEnding, OutputFormat, convert_bytes,
};

const HEADER: usize = 5; // 1 flag byte + 4-byte split seed

thread_local! {
    static RNG: RefCell<SmallRng> =
        RefCell::new(SmallRng::from_os_rng());
}

// Byte sequences the tokenizer and formatter treat specially.
static SEAM_TABLE: &[&[u8]] = &[
    b" ",
    b"  ",
    b"\t",
    b"\r",
    b"\n",
    b"\r\n",
    b">",
    b"> ",
    b">>",
    b"-- ",
    b"From ",
    b"<",
    b"&",
    b"\"",
    b"\x00",
    b"\x1b[0m",
    b"\xe2\x82",     // truncated UTF-8
    b"\xff",
    "\u{a0}".as_bytes(),
    "\u{202e}".as_bytes(),
    "\u{2028}".as_bytes(),
    "\u{301}".as_bytes(),
    "\u{e9}".as_bytes(),
    "\u{1f600}".as_bytes(),
    "\u{fffe}".as_bytes(),
];

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[..HEADER].copy_from_slice(&with_rng(|rng| {
            let mut header = [0u8; HEADER];
            rng.fill_bytes(&mut header);
            header
        }));

        let mut prefix = HEADER;
        while prefix < size.max(HEADER + 1) && prefix < max_size {
            let limit = max_size - prefix;
            prefix += append_word(&mut data[prefix..], limit);
            prefix += append_seam(&mut data[prefix..], limit);
        }
        prefix
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

/// Append one seam sequence, never exceeding `limit`.
fn append_seam(buf: &mut [u8], limit: usize) -> usize {
    with_rng(|rng| {
        let seam = SEAM_TABLE[rng.random_range(0..SEAM_TABLE.len())];
        if seam.len() > limit {
            return 0;
        }
        buf[..seam.len()].copy_from_slice(seam);
        seam.len()
    })
}

/// Append a run of lowercase letters, never exceeding `limit`.
fn append_word(buf: &mut [u8], limit: usize) -> usize {
    with_rng(|rng| {
        let len = rng.random_range(0..=limit.min(12));
        for b in &mut buf[..len] {
            *b = rng.random_range(b'a'..=b'z');
        }
        len
    })
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug, Arbitrary)]
enum FuzzFormat {
    Text,
    Flowed,
    Html,
    HtmlFragment,
}

#[derive(Debug, Arbitrary)]
struct FuzzOptions {
    format: FuzzFormat,
    recognize_quoting: bool,
    ascii: bool,
    wrap: u8,
    tiny_buffers: bool,
}

impl FuzzOptions {
    fn build(&self) -> ConverterOptions {
        let output_format = match self.format {
            FuzzFormat::Text | FuzzFormat::Flowed => OutputFormat::Text,
            FuzzFormat::Html => OutputFormat::Html,
            FuzzFormat::HtmlFragment => OutputFormat::HtmlFragment,
        };
        let (input_buffer_size, output_buffer_size) =
            if self.tiny_buffers { (3, 1) } else { (4096, 4096) };
        ConverterOptions {
            input_encoding: InputEncoding::Utf8,
            input_buffer_size,
            output_buffer_size,
            recognize_quoting: self.recognize_quoting,
            format: FormatOptions {
                output_format,
                wrap_width: (self.wrap > 0).then_some(usize::from(self.wrap)),
                flowed: matches!(self.format, FuzzFormat::Flowed),
                line_ending: LineEnding::Lf,
                fallback: if self.ascii {
                    FallbackMode::AsciiText
                } else {
                    FallbackMode::Text
                },
                base_quoting_level: 0,
            },
            ..ConverterOptions::default()
        }
    }
}

fn converter(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }
    let Ok(options) = FuzzOptions::arbitrary(&mut Unstructured::new(&data[..1])) else {
        return;
    };
    let options = options.build();
    let split_seed = u32::from_le_bytes(data[1..HEADER].try_into().unwrap()) as usize;
    let data = &data[HEADER..];

    let whole = convert_bytes(data, &options).expect("one-shot conversion failed");

    let mut cache = ChunkedCache::new();
    let mut writer = ConverterWriter::new(Vec::new(), options);
    for chunk in split_into_chunks(data, split_seed) {
        cache.write(chunk);
        cache.check_invariants();
        writer.write_all(chunk).expect("streaming write failed");
    }
    let streamed = writer.finish().expect("streaming conversion failed");
    assert_eq!(whole, streamed, "output depends on chunking");

    let mut replay = vec![0u8; data.len()];
    let n = cache.read(&mut replay);
    cache.check_invariants();
    assert_eq!(&replay[..n], data);
    assert!(cache.is_empty());
}

fuzz_target!(|data: &[u8]| converter(data));

/// Split `data` into chunks of at least one byte using a deterministic seed.
/// Chunks may split UTF-8 sequences.
fn split_into_chunks(data: &[u8], split_seed: usize) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut seed = split_seed;
    while start < data.len() {
        let remaining = data.len() - start;
        let size = seed % remaining + 1;
        chunks.push(&data[start..start + size]);
        start += size;
        seed = seed.rotate_left(7) ^ size;
    }
    chunks
}
