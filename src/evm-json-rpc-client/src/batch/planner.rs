use std::ops::Range;

/// A contiguous slice of the caller's request list, owned by one worker.
#[derive(Debug)]
pub struct Chunk<'a, T> {
    /// Position of the chunk in the caller's list.
    pub range: Range<usize>,
    pub elements: &'a mut [T],
}

/// Splits `len` elements into ascending, contiguous ranges of at most
/// `max_chunk_size` elements.
///
/// A `max_chunk_size` of 0 puts all elements into a single chunk.
pub fn plan_chunks(len: usize, max_chunk_size: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }

    let chunk_size = if max_chunk_size == 0 {
        len
    } else {
        max_chunk_size
    };

    (0..len)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(len))
        .collect()
}

/// Splits `elements` into disjoint mutable chunks following `plan`.
///
/// `plan` must be a contiguous partition of `0..elements.len()`, as returned
/// by [`plan_chunks`].
pub fn split_chunks<'a, T>(elements: &'a mut [T], plan: &[Range<usize>]) -> Vec<Chunk<'a, T>> {
    let mut chunks = Vec::with_capacity(plan.len());
    let mut rest = elements;

    for range in plan {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        rest = tail;
        chunks.push(Chunk {
            range: range.clone(),
            elements: head,
        });
    }

    debug_assert!(rest.is_empty(), "plan does not cover all elements");
    chunks
}
