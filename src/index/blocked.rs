use super::{partition_point, SeparatorIndex};
use crate::Result;

/// Separators per block: 8 keys fill one 64-byte cache line
const BLOCK_LEN: usize = 8;

/// B+-tree-like static index over the separators.
///
/// Separators are grouped into cache-line-sized blocks; a summary array
/// holds the first separator of every block. A probe binary-searches the
/// summary, then scans a single block, so it touches at most two cache
/// lines of index data. Separator updates stay O(1).
pub struct BlockedIndex {
    separators: Vec<i64>,
    block_heads: Vec<i64>,
}

fn allocate(num_segments: usize) -> Result<(Vec<i64>, Vec<i64>)> {
    let mut separators = Vec::new();
    separators.try_reserve_exact(num_segments)?;
    separators.resize(num_segments, i64::MIN);

    let num_blocks = num_segments.div_ceil(BLOCK_LEN);
    let mut block_heads = Vec::new();
    block_heads.try_reserve_exact(num_blocks)?;
    block_heads.resize(num_blocks, i64::MIN);

    Ok((separators, block_heads))
}

impl BlockedIndex {
    /// Number of separators matching `pred`, assuming `pred` is a prefix
    /// predicate over the sorted separator array.
    fn count_matching<F>(&self, pred: F) -> usize
    where
        F: Fn(i64) -> bool + Copy,
    {
        let block = partition_point(&self.block_heads, pred).saturating_sub(1);
        let start = block * BLOCK_LEN;
        let end = (start + BLOCK_LEN).min(self.separators.len());

        let in_block = self.separators[start..end]
            .iter()
            .take_while(|&&s| pred(s))
            .count();

        start + in_block
    }
}

impl SeparatorIndex for BlockedIndex {
    fn with_segments(num_segments: usize) -> Result<Self> {
        let (separators, block_heads) = allocate(num_segments)?;
        Ok(Self {
            separators,
            block_heads,
        })
    }

    fn find(&self, key: i64) -> usize {
        self.count_matching(|s| s <= key).saturating_sub(1)
    }

    fn find_first(&self, key: i64) -> usize {
        self.count_matching(|s| s < key).saturating_sub(1)
    }

    fn find_last(&self, key: i64) -> usize {
        self.count_matching(|s| s <= key).saturating_sub(1)
    }

    fn set_separator(&mut self, segment_id: usize, key: i64) {
        self.separators[segment_id] = key;

        if segment_id % BLOCK_LEN == 0 {
            self.block_heads[segment_id / BLOCK_LEN] = key;
        }
    }

    fn separator(&self, segment_id: usize) -> i64 {
        self.separators[segment_id]
    }

    fn rebuild(&mut self, num_segments: usize) -> Result<()> {
        let (separators, block_heads) = allocate(num_segments)?;
        self.separators = separators;
        self.block_heads = block_heads;
        Ok(())
    }
}
