//! Byte-range planning for chunked transfers

use crate::error::{Error, Result};
use crate::types::ChunkSpec;

/// Partition a resource of `total_size` bytes into ranges of at most `chunk_size`
///
/// The returned chunks are contiguous, disjoint, and cover `[0, total_size)`
/// exactly. Only the last chunk may be shorter than `chunk_size`. A zero-sized
/// resource yields an empty plan; callers must use a whole-file transfer for it.
///
/// # Errors
///
/// Returns [`Error::Config`] when `chunk_size` is zero.
///
/// # Examples
///
/// ```
/// use file_dl::planner::plan;
///
/// let chunks = plan(10, 4).unwrap();
/// let ranges: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
/// assert_eq!(ranges, vec![(0, 3), (4, 7), (8, 9)]);
/// ```
pub fn plan(total_size: u64, chunk_size: u64) -> Result<Vec<ChunkSpec>> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size", "chunk_size must be greater than 0"));
    }
    if total_size == 0 {
        return Ok(Vec::new());
    }

    let count = total_size.div_ceil(chunk_size);
    let chunks = (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = start.saturating_add(chunk_size - 1).min(total_size - 1);
            ChunkSpec {
                index: i as usize,
                start,
                end,
                size: end - start + 1,
            }
        })
        .collect();

    Ok(chunks)
}
