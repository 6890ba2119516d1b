//! Helpers for feeding the same document through different chunkings.

/// Split `payload` into approximately equal-sized chunks. Chunks may split
/// UTF-8 sequences, which the decoder must carry across.
///
/// # Panics
///
/// Panics if `parts` is zero.
#[must_use]
pub fn produce_chunks(payload: &[u8], parts: usize) -> Vec<&[u8]> {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts).max(1);
    payload.chunks(chunk_size).collect()
}

/// Split `payload` at the given offsets. Offsets are clamped to the payload
/// and taken in ascending order; duplicates produce no empty chunks.
#[must_use]
pub fn split_at_offsets<'a>(payload: &'a [u8], offsets: &[usize]) -> Vec<&'a [u8]> {
    let mut offsets: Vec<usize> = offsets.iter().map(|&o| o.min(payload.len())).collect();
    offsets.sort_unstable();
    let mut chunks = Vec::with_capacity(offsets.len() + 1);
    let mut start = 0;
    for end in offsets.into_iter().chain(core::iter::once(payload.len())) {
        if end > start {
            chunks.push(&payload[start..end]);
            start = end;
        }
    }
    chunks
}
