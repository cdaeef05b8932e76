//! Separator indexes
//!
//! A separator index maps a query key to a segment of the sparse array.
//! It maintains one separator per segment: the segment's minimum key when
//! the segment is non-empty, [`i64::MIN`] as the lower sentinel otherwise.

mod blocked;
mod flat;

pub use blocked::BlockedIndex;
pub use flat::FlatIndex;

use crate::Result;

/// Maps query keys to segment identifiers.
///
/// With duplicate keys, the minimum of segment `i + 1` may equal the
/// maximum of segment `i`, so a single key can span a segment boundary.
/// [`SeparatorIndex::find_first`] is therefore resolved with strict `<`:
/// starting a forward scan one segment early costs a bounded probe,
/// starting it late would skip elements.
pub trait SeparatorIndex {
    /// Creates an index for `num_segments` segments, all separators at the
    /// lower sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if the separator storage cannot be allocated.
    fn with_segments(num_segments: usize) -> Result<Self>
    where
        Self: Sized;

    /// Segment where `key` would be placed: the largest `i` with
    /// `separator[i] <= key`.
    fn find(&self, key: i64) -> usize;

    /// First segment that may contain `key`: the largest `i` with
    /// `separator[i] < key`, clipped to 0; the last segment when every
    /// separator is below `key`.
    fn find_first(&self, key: i64) -> usize;

    /// Last segment that may contain `key`: the largest `i` with
    /// `separator[i] <= key`, clipped to 0.
    fn find_last(&self, key: i64) -> usize;

    /// Updates the separator of one segment.
    fn set_separator(&mut self, segment_id: usize, key: i64);

    /// Current separator of a segment.
    fn separator(&self, segment_id: usize) -> i64;

    /// Reinitializes the index for `num_segments` segments, resetting every
    /// separator to the lower sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if the new separator storage cannot be allocated;
    /// the previous state is kept intact in that case.
    fn rebuild(&mut self, num_segments: usize) -> Result<()>;
}

// NOTE: PERF: A hand-rolled binary search over the separators is
// measurably faster than `slice::partition_point` here, the same way it
// is for block index probes
pub(crate) fn partition_point<F>(separators: &[i64], pred: F) -> usize
where
    F: Fn(i64) -> bool,
{
    let mut left = 0;
    let mut right = separators.len();

    while left < right {
        let mid = (left + right) / 2;

        if pred(separators[mid]) {
            left = mid + 1;
        } else {
            right = mid;
        }
    }

    left
}
