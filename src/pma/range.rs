use crate::{index::SeparatorIndex, storage::SparseArray, Key, Pma, Value};

/// Aggregate over a key interval, as returned by [`Pma::sum`].
///
/// All fields are zero for an empty interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SumResult {
    /// Smallest qualifying key
    pub first_key: i64,

    /// Largest qualifying key
    pub last_key: i64,

    /// Number of qualifying elements
    pub count: u64,

    /// Sum of the qualifying keys (wrapping)
    pub sum_keys: i64,

    /// Sum of the qualifying values (wrapping)
    pub sum_values: i64,
}

/// Ordered iterator over the occupied slots of the sparse array.
///
/// Walks one contiguous (even, odd) pair run at a time: crossing an
/// even-to-odd segment boundary is free, crossing into the next pair
/// re-seeds the cursor. Borrows the array immutably; re-issue
/// [`Pma::range`] or [`Pma::iter`] to restart.
pub struct Iter<'a> {
    storage: &'a SparseArray,

    /// Next slot to yield
    offset: usize,

    /// End of the current run
    stop: usize,

    /// Upper fence over all runs (one past the last qualifying slot)
    index_max: usize,

    /// Segment that seeds the next run
    next_segment: usize,
}

impl<'a> Iter<'a> {
    pub(crate) fn exhausted(storage: &'a SparseArray) -> Self {
        Self {
            storage,
            offset: 0,
            stop: 0,
            index_max: 0,
            next_segment: 0,
        }
    }

    pub(crate) fn new(
        storage: &'a SparseArray,
        segment_start: usize,
        segment_end: usize,
        key_min: Key,
        key_max: Key,
    ) -> Self {
        debug_assert!(segment_start <= segment_end);

        if segment_end >= storage.num_segments {
            return Self::exhausted(storage);
        }

        let segment_capacity = storage.segment_capacity;
        let keys = &storage.keys;

        // probe forward for the first slot with key >= key_min
        let mut segment_id = segment_start;
        let mut offset = 0;
        let mut stop = 0;
        let mut found = false;

        while !found && segment_id < storage.num_segments {
            let run = storage.segment_range(segment_id);
            offset = run.start;
            stop = run.end;

            while offset < stop && keys[offset] < key_min {
                offset += 1;
            }

            found = offset < stop;
            if !found {
                segment_id += 1;
            }
        }

        let mut next_segment = segment_id + 1;

        // an even segment's run continues into its odd neighbour
        if found && segment_id % 2 == 0 && next_segment < storage.num_segments {
            stop = next_segment * segment_capacity + storage.segment_size(next_segment);
            next_segment += 1;
        }

        if !found || keys[offset] > key_max {
            return Self::exhausted(storage);
        }

        // probe backward from the last candidate segment for the last slot
        // with key <= key_max
        let mut back_segment = segment_end as isize;
        let mut back_offset: isize = -1;
        let mut back_found = false;

        while !back_found && back_segment >= segment_id as isize {
            let run = storage.segment_range(back_segment as usize);
            back_offset = run.end as isize - 1;

            while back_offset >= run.start as isize && keys[back_offset as usize] > key_max {
                back_offset -= 1;
            }

            back_found = back_offset >= run.start as isize;
            if !back_found {
                back_segment -= 1;
            }
        }

        if !back_found || (back_offset as usize) < offset {
            return Self::exhausted(storage);
        }

        let index_max = back_offset as usize + 1;

        Self {
            storage,
            offset,
            stop: stop.min(index_max),
            index_max,
            next_segment,
        }
    }

    /// Re-seeds `(offset, stop)` from the next pair run.
    fn next_sequence(&mut self) {
        let storage = self.storage;
        let segment_capacity = storage.segment_capacity;
        let segment_id = self.next_segment;

        if segment_id >= storage.num_segments {
            return;
        }

        if segment_id % 2 == 0 {
            self.offset =
                segment_id * segment_capacity + segment_capacity - storage.segment_size(segment_id);

            let odd = segment_id + 1;
            let mut stop = odd * segment_capacity;
            if odd < storage.num_segments {
                stop += storage.segment_size(odd);
            }
            self.stop = stop.min(self.index_max);

            self.next_segment += 2;
        } else {
            self.offset = segment_id * segment_capacity;
            self.stop = (self.offset + storage.segment_size(segment_id)).min(self.index_max);
            self.next_segment += 1;
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (Key, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.stop {
            return None;
        }

        let item = (
            self.storage.keys[self.offset],
            self.storage.values[self.offset],
        );

        self.offset += 1;
        if self.offset >= self.stop {
            self.next_sequence();
        }

        Some(item)
    }
}

/// Iterator over the keys of a [`Pma`], in non-decreasing order.
pub struct Keys<'a>(Iter<'a>);

impl Iterator for Keys<'_> {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(key, _)| key)
    }
}

/// Iterator over the values of a [`Pma`], in key order.
pub struct Values<'a>(Iter<'a>);

impl Iterator for Values<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(_, value)| value)
    }
}

impl<I: SeparatorIndex> Pma<I> {
    /// Iterates over all elements in non-decreasing key order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        if self.is_empty() {
            return Iter::exhausted(&self.storage);
        }

        Iter::new(
            &self.storage,
            0,
            self.storage.num_segments - 1,
            i64::MIN,
            i64::MAX,
        )
    }

    /// Iterates over all elements with `key_min <= key <= key_max`, in
    /// non-decreasing key order.
    ///
    /// A reversed interval (`key_min > key_max`) yields nothing.
    #[must_use]
    pub fn range(&self, key_min: Key, key_max: Key) -> Iter<'_> {
        if self.is_empty() || key_min > key_max {
            return Iter::exhausted(&self.storage);
        }

        let segment_start = self.index.find_first(key_min);
        let segment_end = self.index.find_last(key_max);
        debug_assert!(segment_start <= segment_end);

        Iter::new(&self.storage, segment_start, segment_end, key_min, key_max)
    }

    /// Iterates over all keys, in non-decreasing order.
    #[must_use]
    pub fn keys(&self) -> Keys<'_> {
        Keys(self.iter())
    }

    /// Iterates over all values, in key order.
    #[must_use]
    pub fn values(&self) -> Values<'_> {
        Values(self.iter())
    }

    /// Aggregates all elements with `key_min <= key <= key_max` in one
    /// forward sweep over the qualifying pair runs.
    ///
    /// Returns the zero tuple for an empty or reversed interval.
    #[must_use]
    pub fn sum(&self, key_min: Key, key_max: Key) -> SumResult {
        let mut iter = self.range(key_min, key_max);

        if iter.offset >= iter.stop {
            return SumResult::default();
        }

        let keys = &self.storage.keys;
        let values = &self.storage.values;

        let mut result = SumResult {
            first_key: keys[iter.offset],
            ..SumResult::default()
        };
        let mut last = iter.offset;

        while iter.offset < iter.stop {
            result.count += (iter.stop - iter.offset) as u64;

            while iter.offset < iter.stop {
                result.sum_keys = result.sum_keys.wrapping_add(keys[iter.offset]);
                result.sum_values = result.sum_values.wrapping_add(values[iter.offset]);
                last = iter.offset;
                iter.offset += 1;
            }

            iter.next_sequence();
        }

        result.last_key = keys[last];

        result
    }
}

#[cfg(test)]
mod tests {
    use crate::Pma;
    use test_log::test;

    #[test]
    fn iter_yields_sorted_keys() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;

        for key in [5, 3, 7, 1, 9, 4, 6, 2] {
            pma.insert(key, key * 10)?;
        }

        let keys: Vec<_> = pma.keys().collect();
        assert_eq!(vec![1, 2, 3, 4, 5, 6, 7, 9], keys);

        let values: Vec<_> = pma.values().collect();
        assert_eq!(vec![10, 20, 30, 40, 50, 60, 70, 90], values);

        Ok(())
    }

    #[test]
    fn iter_empty_array() -> crate::Result<()> {
        let pma = Pma::new(8)?;
        assert_eq!(0, pma.iter().count());
        assert_eq!(0, pma.range(0, 100).count());
        Ok(())
    }

    #[test]
    fn range_clips_both_ends() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;

        for key in 1..=100 {
            pma.insert(key, key)?;
        }

        let keys: Vec<_> = pma.range(25, 75).map(|(k, _)| k).collect();
        assert_eq!((25..=75).collect::<Vec<_>>(), keys);

        // bounds outside the stored key space
        assert_eq!(100, pma.range(i64::MIN, i64::MAX).count());
        assert_eq!(0, pma.range(101, 200).count());
        assert_eq!(0, pma.range(-50, 0).count());

        Ok(())
    }

    #[test]
    fn range_reversed_interval_is_empty() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;
        pma.insert(1, 1)?;

        assert_eq!(0, pma.range(5, 2).count());
        assert_eq!(crate::SumResult::default(), pma.sum(5, 2));

        Ok(())
    }

    #[test]
    fn range_single_key_returns_all_duplicates() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;

        for value in 0..5 {
            pma.insert(7, value)?;
        }
        pma.insert(6, 60)?;
        pma.insert(8, 80)?;

        let hits: Vec<_> = pma.range(7, 7).collect();
        assert_eq!(5, hits.len());
        assert!(hits.iter().all(|&(k, _)| k == 7));

        let mut values: Vec<_> = hits.into_iter().map(|(_, v)| v).collect();
        values.sort_unstable();
        assert_eq!(vec![0, 1, 2, 3, 4], values);

        Ok(())
    }

    #[test]
    fn sum_matches_scan() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;

        for key in [5, 3, 7, 1, 9, 4, 6, 2] {
            pma.insert(key, key * 10)?;
        }

        let result = pma.sum(2, 7);
        assert_eq!(6, result.count);
        assert_eq!(27, result.sum_keys);
        assert_eq!(270, result.sum_values);
        assert_eq!(2, result.first_key);
        assert_eq!(7, result.last_key);

        // the same subset the scan yields
        let scanned: i64 = pma.range(2, 7).map(|(k, _)| k).sum();
        assert_eq!(result.sum_keys, scanned);

        Ok(())
    }

    #[test]
    fn sum_empty_interval_is_zero() -> crate::Result<()> {
        let mut pma = Pma::new(8)?;
        pma.insert(10, 100)?;

        assert_eq!(crate::SumResult::default(), pma.sum(20, 30));

        Ok(())
    }
}
