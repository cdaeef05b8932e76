use super::{partition_point, SeparatorIndex};
use crate::Result;

/// Implicit comparison index: one sorted separator per segment, probed with
/// a plain binary search.
///
/// The simplest realization of the [`SeparatorIndex`] contract; the default
/// engine uses [`super::BlockedIndex`] instead.
pub struct FlatIndex {
    separators: Vec<i64>,
}

fn allocate_separators(num_segments: usize) -> Result<Vec<i64>> {
    let mut separators = Vec::new();
    separators.try_reserve_exact(num_segments)?;
    separators.resize(num_segments, i64::MIN);
    Ok(separators)
}

impl SeparatorIndex for FlatIndex {
    fn with_segments(num_segments: usize) -> Result<Self> {
        Ok(Self {
            separators: allocate_separators(num_segments)?,
        })
    }

    fn find(&self, key: i64) -> usize {
        partition_point(&self.separators, |s| s <= key).saturating_sub(1)
    }

    fn find_first(&self, key: i64) -> usize {
        partition_point(&self.separators, |s| s < key).saturating_sub(1)
    }

    fn find_last(&self, key: i64) -> usize {
        partition_point(&self.separators, |s| s <= key).saturating_sub(1)
    }

    fn set_separator(&mut self, segment_id: usize, key: i64) {
        self.separators[segment_id] = key;
    }

    fn separator(&self, segment_id: usize) -> i64 {
        self.separators[segment_id]
    }

    fn rebuild(&mut self, num_segments: usize) -> Result<()> {
        self.separators = allocate_separators(num_segments)?;
        Ok(())
    }
}
