//! Exclusive prefix sums and the scatter partitioning built on them.
//!
//! `scan[0] = 0` and `scan[i] = scan[i - 1] + input[i - 1]`; the grand total is
//! `scan[n - 1] + input[n - 1]`. The parallel scan is a three-phase blocked scan:
//! reduce each block, scan the block totals serially, then scan every block in
//! parallel from its offset. Integer addition makes the result independent of the
//! block size.

use rayon::prelude::*;

/// Elements per scan block.
pub const SCAN_BLOCK: usize = 1 << 14;

/// Parallel exclusive prefix sum of `input` into `output`. Returns the grand total.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn exclusive_scan(input: &[u32], output: &mut [u32]) -> u32 {
    assert_eq!(input.len(), output.len(), "scan input and output differ in length");

    let block_sums: Vec<u32> = input
        .par_chunks(SCAN_BLOCK)
        .map(|block| block.iter().sum())
        .collect();

    let mut block_offsets = vec![0; block_sums.len()];
    let total = exclusive_scan_serial(&block_sums, &mut block_offsets);

    output
        .par_chunks_mut(SCAN_BLOCK)
        .zip(input.par_chunks(SCAN_BLOCK))
        .zip(block_offsets.par_iter())
        .for_each(|((out, block), &offset)| {
            scan_block(block, out, offset);
        });

    total
}

/// Single-threaded reference scan with the same contract as [`exclusive_scan`].
pub fn exclusive_scan_serial(input: &[u32], output: &mut [u32]) -> u32 {
    assert_eq!(input.len(), output.len(), "scan input and output differ in length");
    scan_block(input, output, 0)
}

#[inline]
fn scan_block(input: &[u32], output: &mut [u32], offset: u32) -> u32 {
    let mut running = offset;
    for (out, &value) in output.iter_mut().zip(input) {
        *out = running;
        running += value;
    }
    running
}

/// Grand total read back from the last element of an input array and its scan.
pub fn scan_total(input: &[u32], scan: &[u32]) -> u32 {
    match (input.last(), scan.last()) {
        (Some(&last), Some(&last_scan)) => last + last_scan,
        _ => 0,
    }
}

/// Splits `buf` into the disjoint sub-slices `buf[bounds[i]..bounds[i + 1]]`.
///
/// Scatter stages use the scan of their source array as `bounds`: because the scan
/// never decreases, each work block's destinations form one contiguous range and
/// no two blocks can reach the same slot.
///
/// # Panics
/// Panics if `bounds` decreases or runs past the end of `buf`.
pub(crate) fn split_at_bounds<'a, T>(mut buf: &'a mut [T], bounds: &[usize]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(bounds.len().saturating_sub(1));
    let mut consumed = 0;
    for pair in bounds.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let (_, rest) = std::mem::take(&mut buf).split_at_mut(start - consumed);
        let (part, rest) = rest.split_at_mut(end - start);
        parts.push(part);
        buf = rest;
        consumed = end;
    }
    parts
}
