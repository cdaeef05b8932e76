use crate::{
    index::SeparatorIndex,
    storage::SparseArray,
    Key, Pma, Result, Value,
};
use std::ops::Range;

/// A pending insertion carried into a rebalance: the element that
/// overflowed its segment and has not been placed yet.
#[derive(Clone, Copy)]
pub(crate) struct PendingInsert {
    pub key: Key,
    pub value: Value,
    pub segment_id: usize,
}

/// Merges a sorted run plus one new element into a fresh buffer.
fn splice_into_vec(
    out_keys: &mut Vec<i64>,
    out_values: &mut Vec<i64>,
    keys: &[i64],
    values: &[i64],
    key: Key,
    value: Value,
) {
    let position = keys.iter().position(|&k| k >= key).unwrap_or(keys.len());

    out_keys.extend_from_slice(&keys[..position]);
    out_keys.push(key);
    out_keys.extend_from_slice(&keys[position..]);

    out_values.extend_from_slice(&values[..position]);
    out_values.push(value);
    out_values.extend_from_slice(&values[position..]);
}

/// Moves the sorted run at `src` to `dst`, splicing one new element into
/// its sorted position. `dst` may overlap `src`.
fn splice_within(
    keys: &mut [i64],
    values: &mut [i64],
    src: Range<usize>,
    dst: usize,
    key: Key,
    value: Value,
) {
    let len = src.len();
    let position = keys[src.clone()]
        .iter()
        .position(|&k| k >= key)
        .unwrap_or(len);

    // the tail first: its destination never overlaps the unread head
    keys.copy_within((src.start + position)..src.end, dst + position + 1);
    keys.copy_within(src.start..(src.start + position), dst);
    keys[dst + position] = key;

    values.copy_within((src.start + position)..src.end, dst + position + 1);
    values.copy_within(src.start..(src.start + position), dst);
    values[dst + position] = value;
}

/// Returns the next non-empty input segment after `segment_id`, skipping at
/// most one empty segment, or an exhausted cursor.
fn advance_input(old: &SparseArray, mut segment_id: usize) -> (usize, Range<usize>) {
    segment_id += 1;

    if segment_id < old.num_segments {
        let run = old.segment_range(segment_id);
        if !run.is_empty() {
            return (segment_id, run);
        }

        // a deletion may leave a single empty segment behind, never two in a row
        segment_id += 1;
        if segment_id < old.num_segments {
            let run = old.segment_range(segment_id);
            debug_assert!(!run.is_empty(), "two consecutive empty segments");
            return (segment_id, run);
        }
    }

    (segment_id, old.capacity()..old.capacity())
}

impl<I: SeparatorIndex> Pma<I> {
    /// Rewrites the separators of the window from its current contents.
    ///
    /// A segment left empty by the even split inherits the separator of its
    /// nearest non-empty neighbour to the right (the first segment past the
    /// window when the whole tail is empty, the upper sentinel when nothing
    /// is stored to the right at all), so the separator array stays
    /// non-decreasing and no probe is ever routed into an empty segment.
    pub(crate) fn refresh_window_separators(&mut self, window_start: usize, window_length: usize) {
        let window_end = window_start + window_length;

        let mut carry = if window_end < self.storage.num_segments {
            self.index.separator(window_end)
        } else {
            i64::MAX
        };

        for segment_id in (window_start..window_end).rev() {
            if self.storage.segment_size(segment_id) > 0 {
                carry = self.storage.minimum(segment_id);
            }
            self.index.set_separator(segment_id, carry);
        }
    }

    pub(crate) fn rebalance_insert(
        &mut self,
        segment_id: usize,
        key: Key,
        value: Value,
    ) -> Result<()> {
        self.rebalance(
            segment_id,
            Some(PendingInsert {
                key,
                value,
                segment_id,
            }),
        )
    }

    pub(crate) fn rebalance_delete(&mut self, segment_id: usize) -> Result<()> {
        self.rebalance(segment_id, None)
    }

    /// Walks the calibrator tree outward from the offending segment and
    /// either spreads the smallest window whose density is back in bounds,
    /// or resizes the whole array if no window qualifies.
    fn rebalance(&mut self, segment_id: usize, pending: Option<PendingInsert>) -> Result<()> {
        let is_insert = pending.is_some();
        let segment_capacity = self.storage.segment_capacity;
        let tree_height = self.storage.height();

        // on the insert path the overflowing segment counts as capacity + 1
        let mut num_elements = if is_insert {
            segment_capacity + 1
        } else {
            self.storage.segment_size(segment_id)
        };

        let (mut rho, mut theta) = self.densities.get(1);
        let mut density = num_elements as f64 / segment_capacity as f64;
        let mut height = 1;
        let mut window_length = 1;
        let mut window_id = segment_id;
        let mut window_start = segment_id;

        if tree_height > 1 {
            // grow the window, extending the running element count with the
            // segments newly covered on either side
            let mut cursor_left = segment_id as isize - 1;
            let mut cursor_right = segment_id + 1;

            loop {
                height += 1;
                window_length *= 2;
                window_id /= 2;
                window_start = window_id * window_length;
                let window_end = window_start + window_length;

                let bounds = self.densities.get(height);
                rho = bounds.0;
                theta = bounds.1;

                while cursor_left >= window_start as isize {
                    num_elements += self.storage.segment_size(cursor_left as usize);
                    cursor_left -= 1;
                }
                while cursor_right < window_end {
                    num_elements += self.storage.segment_size(cursor_right);
                    cursor_right += 1;
                }

                density = num_elements as f64 / (window_length * segment_capacity) as f64;

                let violated = if is_insert {
                    density > theta
                } else {
                    density < rho
                };

                if !violated || height >= tree_height {
                    break;
                }
            }
        }

        if (is_insert && density <= theta) || (!is_insert && density >= rho) {
            log::trace!(
                "spreading {num_elements} elements over segments [{window_start}, {}) at height {height}",
                window_start + window_length,
            );
            self.spread(num_elements, window_start, window_length, pending)
        } else {
            self.resize(pending)
        }
    }

    /// Redistributes `cardinality` elements evenly over the window, in
    /// place, using O(segment capacity) auxiliary memory.
    ///
    /// The window's two rightmost (even, odd) pairs are parked in a side
    /// buffer; the remaining pairs are right-packed in place, which leaves
    /// enough slack for the left-to-right refill to never overtake its own
    /// reads. A pending insertion is spliced in during the gather pass.
    fn spread(
        &mut self,
        cardinality: usize,
        window_start: usize,
        window_length: usize,
        pending: Option<PendingInsert>,
    ) -> Result<()> {
        debug_assert_eq!(0, window_start % 2, "window must start at an even segment");
        debug_assert_eq!(0, window_length % 2, "window must span whole pairs");

        let segment_capacity = self.storage.segment_capacity;
        let num_pairs = window_length / 2;
        let window_end_slot = (window_start + window_length) * segment_capacity;

        let pending_pair =
            pending.map(|p| (p.segment_id - window_start) / 2);

        // the side buffer is acquired before anything is mutated, so an
        // allocation failure leaves the array untouched
        let aux_capacity = 4 * segment_capacity + 1;
        let mut aux_keys: Vec<i64> = Vec::new();
        aux_keys.try_reserve_exact(aux_capacity)?;
        let mut aux_values: Vec<i64> = Vec::new();
        aux_values.try_reserve_exact(aux_capacity)?;

        // 1a) park the rightmost pairs in the side buffer, in key order
        let aux_pairs_from = num_pairs.saturating_sub(2);
        for pair in aux_pairs_from..num_pairs {
            let run = self.storage.pair_range(window_start + pair * 2);

            if pending_pair == Some(pair) {
                let p = pending.expect("pending pair implies pending");
                splice_into_vec(
                    &mut aux_keys,
                    &mut aux_values,
                    &self.storage.keys[run.clone()],
                    &self.storage.values[run],
                    p.key,
                    p.value,
                );
            } else {
                aux_keys.extend_from_slice(&self.storage.keys[run.clone()]);
                aux_values.extend_from_slice(&self.storage.values[run]);
            }
        }

        // 1b) right-pack the remaining pairs inside the window
        let mut write_end = window_end_slot;
        for pair in (0..aux_pairs_from).rev() {
            let run = self.storage.pair_range(window_start + pair * 2);

            if pending_pair == Some(pair) {
                let p = pending.expect("pending pair implies pending");
                write_end -= run.len() + 1;
                splice_within(
                    &mut self.storage.keys,
                    &mut self.storage.values,
                    run,
                    write_end,
                    p.key,
                    p.value,
                );
            } else {
                write_end -= run.len();
                self.storage.keys.copy_within(run.clone(), write_end);
                self.storage.values.copy_within(run, write_end);
            }
        }
        let mut in_place = write_end..window_end_slot;

        debug_assert_eq!(cardinality, in_place.len() + aux_keys.len());

        // 2) target occupancy per segment
        let elements_per_segment = cardinality / window_length;
        let num_odd_segments = cardinality % window_length;
        for i in 0..window_length {
            self.storage.sizes[window_start + i] =
                (elements_per_segment + usize::from(i < num_odd_segments)) as u16;
        }

        // 3) refill the pairs left to right, draining the in-place chunk
        // first (the smaller keys), then the side buffer
        let mut aux_cursor = 0;
        for pair in 0..num_pairs {
            let even = window_start + pair * 2;
            let run = self.storage.pair_range(even);
            let mut out = run.start;

            while out < run.end {
                if in_place.is_empty() {
                    let n = (run.end - out).min(aux_keys.len() - aux_cursor);
                    debug_assert!(n > 0, "ran out of elements while refilling the window");
                    self.storage.keys[out..out + n]
                        .copy_from_slice(&aux_keys[aux_cursor..aux_cursor + n]);
                    self.storage.values[out..out + n]
                        .copy_from_slice(&aux_values[aux_cursor..aux_cursor + n]);
                    aux_cursor += n;
                    out += n;
                } else {
                    let n = (run.end - out).min(in_place.len());
                    self.storage
                        .keys
                        .copy_within(in_place.start..in_place.start + n, out);
                    self.storage
                        .values
                        .copy_within(in_place.start..in_place.start + n, out);
                    in_place.start += n;
                    out += n;
                }
            }
        }

        self.refresh_window_separators(window_start, window_length);

        if pending.is_some() {
            self.storage.cardinality += 1;
        }

        Ok(())
    }

    /// Rebuilds the whole array at doubled (insert) or halved (delete)
    /// capacity, streaming the old layout into the new one and interleaving
    /// a pending insertion at its sorted position.
    pub(crate) fn resize(&mut self, pending: Option<PendingInsert>) -> Result<()> {
        let is_insert = pending.is_some();
        let segment_capacity = self.storage.segment_capacity;

        let capacity = if is_insert {
            self.storage.capacity() * 2
        } else {
            self.storage.capacity() / 2
        };
        let num_segments = capacity / segment_capacity;

        log::debug!(
            "resizing sparse array: {} -> {capacity} slots ({num_segments} segments)",
            self.storage.capacity(),
        );

        // all allocations happen before any state is replaced
        let mut next = SparseArray::allocate(num_segments, segment_capacity)?;
        self.index.rebuild(num_segments)?;

        let elements_per_segment = self.storage.cardinality / num_segments;
        let num_odd_segments = self.storage.cardinality % num_segments;

        let mut pending = pending;

        {
            let old = &self.storage;

            let mut input_segment = 0;
            let mut input = old.segment_range(0);
            if input.is_empty() {
                debug_assert!(!is_insert, "no empty segments on the insert path");
                (input_segment, input) = advance_input(old, input_segment);
            }

            for j in 0..num_segments {
                let target = elements_per_segment + usize::from(j < num_odd_segments);
                next.sizes[j] = target as u16;

                let base = j * segment_capacity;
                let out_range = if j % 2 == 0 {
                    (base + segment_capacity - target)..(base + segment_capacity)
                } else {
                    base..(base + target)
                };

                let mut out = out_range.start;
                while out < out_range.end {
                    let n = (out_range.end - out).min(input.len());
                    next.keys[out..out + n].copy_from_slice(&old.keys[input.start..input.start + n]);
                    next.values[out..out + n]
                        .copy_from_slice(&old.values[input.start..input.start + n]);
                    out += n;
                    input.start += n;

                    if input.is_empty() {
                        (input_segment, input) = advance_input(old, input_segment);
                    }
                }

                // splice the pending element as soon as it sorts below the
                // last key written
                if let Some(p) = pending {
                    if out > out_range.start && p.key < next.keys[out - 1] {
                        next.insert_unsafe(j, p.key, p.value);
                        pending = None;
                    }
                }
            }
        }

        // a pending element larger than everything goes into the last segment
        if let Some(p) = pending {
            next.insert_unsafe(num_segments - 1, p.key, p.value);
        }

        next.cardinality = self.storage.cardinality + usize::from(is_insert);
        self.storage = next;
        self.densities.rebuild(self.storage.height());

        // separators come from the finished layout, never the input cursor
        self.refresh_window_separators(0, num_segments);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn splice_appends_when_largest() {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        splice_into_vec(&mut keys, &mut values, &[1, 2, 3], &[10, 20, 30], 9, 90);
        assert_eq!(vec![1, 2, 3, 9], keys);
        assert_eq!(vec![10, 20, 30, 90], values);
    }

    #[test]
    fn splice_before_equal_duplicates() {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        splice_into_vec(&mut keys, &mut values, &[1, 5, 5], &[10, 50, 51], 5, 52);
        assert_eq!(vec![1, 5, 5, 5], keys);
        assert_eq!(vec![10, 52, 50, 51], values);
    }

    #[test]
    fn splice_within_moves_right() {
        let mut keys = vec![1, 3, 5, 0, 0, 0, 0, 0];
        let mut values = vec![10, 30, 50, 0, 0, 0, 0, 0];

        splice_within(&mut keys, &mut values, 0..3, 4, 4, 40);

        assert_eq!([1, 3, 4, 5], keys[4..8]);
        assert_eq!([10, 30, 40, 50], values[4..8]);
    }

    #[test]
    fn splice_within_overlapping_regions() {
        let mut keys = vec![1, 2, 8, 9, 0, 0];
        let mut values = vec![1, 2, 8, 9, 0, 0];

        splice_within(&mut keys, &mut values, 0..4, 1, 5, 5);

        assert_eq!([1, 2, 5, 8, 9], keys[1..6]);
        assert_eq!([1, 2, 5, 8, 9], values[1..6]);
    }
}
