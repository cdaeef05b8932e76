use crate::{index::SeparatorIndex, storage::SparseArray, Key, Pma, Result, Value};

/// A maximal contiguous slice of the batch whose keys map to one segment,
/// possibly fused with neighbouring runs into a larger window.
#[derive(Clone, Copy, Debug)]
struct RunInfo {
    /// First batch index covered by this run
    run_start: usize,

    /// Number of batch elements covered
    run_length: usize,

    /// Batch elements plus the current contents of the covered segments
    cardinality: usize,

    /// First segment of the target window
    segment_start: usize,

    /// Number of segments in the target window
    segment_length: usize,

    /// Cleared when the run is fused into a neighbour
    valid: bool,
}

impl<I: SeparatorIndex> Pma<I> {
    /// Bulk-loads a batch of key-value pairs sorted by key (non-decreasing).
    ///
    /// Far cheaper than inserting one element at a time: contiguous
    /// subsequences of the batch are merged into their target windows in
    /// single streaming passes.
    ///
    /// # Errors
    ///
    /// Returns an error if a merge buffer or a grown sparse array cannot be
    /// allocated; the engine keeps its pre-call contents in that case.
    pub fn load(&mut self, batch: &[(Key, Value)]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        debug_assert!(
            batch.windows(2).all(|pair| pair[0].0 <= pair[1].0),
            "batch must be sorted by key",
        );

        log::debug!("bulk-loading {} elements", batch.len());

        if self.is_empty() {
            self.load_empty(batch)
        } else {
            let mut runs = self.generate_runs(batch);

            if self.fuse_runs(&mut runs) {
                // some window overflowed the whole array: merge everything
                // in one streaming rebuild
                self.load_resize(batch)
            } else {
                self.load_spread(batch, &runs)
            }
        }
    }

    /// Splits the batch into maximal runs of elements routed to the same
    /// segment.
    fn generate_runs(&self, batch: &[(Key, Value)]) -> Vec<RunInfo> {
        let mut runs = Vec::new();
        let mut i = 0;

        while i < batch.len() {
            let segment_id = self.index.find_first(batch[i].0);

            // everything below the next separator belongs here; an empty
            // next segment carries its right neighbour's minimum, so the
            // boundary is defined either way
            let upper = if segment_id + 1 < self.storage.num_segments {
                self.index.separator(segment_id + 1)
            } else {
                i64::MAX
            };

            let mut entry = RunInfo {
                run_start: i,
                run_length: 1,
                cardinality: 0,
                segment_start: segment_id,
                segment_length: 1,
                valid: true,
            };

            i += 1;
            while i < batch.len() && batch[i].0 <= upper {
                entry.run_length += 1;
                i += 1;
            }

            entry.cardinality = self.storage.segment_size(segment_id) + entry.run_length;
            runs.push(entry);
        }

        runs
    }

    /// Walks the calibrator tree for every run, fusing neighbouring runs
    /// whose windows meet. Returns `true` if some window would need the
    /// whole array above its root threshold, i.e. a full resize is due.
    #[allow(clippy::too_many_lines)]
    fn fuse_runs(&self, runs: &mut [RunInfo]) -> bool {
        let segment_capacity = self.storage.segment_capacity;
        let tree_height = self.storage.height();

        for i in 0..runs.len() {
            if !runs[i].valid {
                continue;
            }

            let segment_id = runs[i].segment_start;
            debug_assert_eq!(1, runs[i].segment_length, "run already fused");

            let mut num_elements = runs[i].cardinality;
            let mut theta = self.densities.upper_threshold_leaves();
            let mut density = num_elements as f64 / segment_capacity as f64;
            let mut height = 1;
            let mut window_length = 1;
            let mut window_id = segment_id;
            let mut window_start = segment_id;

            if tree_height > 1 && density > theta {
                let mut cursor_left = segment_id as isize - 1;
                let mut cursor_right = segment_id + 1;

                // nearest valid runs on either side, by their window edges
                let mut run_left = i as isize - 1;
                let mut edge_left: isize = -1;
                while run_left >= 0 && edge_left < 0 {
                    let other = runs[run_left as usize];
                    if other.valid {
                        edge_left = (other.segment_start + other.segment_length - 1) as isize;
                    } else {
                        run_left -= 1;
                    }
                }

                let mut run_right = i + 1;
                let mut edge_right: isize = -1;
                while run_right < runs.len() && edge_right < 0 {
                    let other = runs[run_right];
                    if other.valid {
                        edge_right = other.segment_start as isize;
                    } else {
                        run_right += 1;
                    }
                }

                loop {
                    height += 1;
                    window_length *= 2;
                    window_id /= 2;
                    window_start = window_id * window_length;
                    let window_end = window_start + window_length;

                    theta = self.densities.get(height).1;

                    while cursor_left >= window_start as isize {
                        if cursor_left == edge_left {
                            // the window reached a neighbouring run: absorb it
                            let other = runs[run_left as usize];
                            num_elements += other.cardinality;
                            runs[i].run_start = other.run_start;
                            runs[i].run_length += other.run_length;
                            runs[run_left as usize].valid = false;
                            cursor_left = other.segment_start as isize - 1;

                            run_left -= 1;
                            edge_left = -1;
                            while run_left >= 0 && edge_left < 0 {
                                let other = runs[run_left as usize];
                                if other.valid {
                                    edge_left =
                                        (other.segment_start + other.segment_length - 1) as isize;
                                } else {
                                    run_left -= 1;
                                }
                            }
                        } else {
                            num_elements += self.storage.segment_size(cursor_left as usize);
                            cursor_left -= 1;
                        }
                    }

                    while cursor_right < window_end {
                        if cursor_right as isize == edge_right {
                            let other = runs[run_right];
                            num_elements += other.cardinality;
                            runs[i].run_length += other.run_length;
                            runs[run_right].valid = false;
                            cursor_right = other.segment_start + other.segment_length;

                            run_right += 1;
                            edge_right = -1;
                            while run_right < runs.len() && edge_right < 0 {
                                let other = runs[run_right];
                                if other.valid {
                                    edge_right = other.segment_start as isize;
                                } else {
                                    run_right += 1;
                                }
                            }
                        } else {
                            num_elements += self.storage.segment_size(cursor_right);
                            cursor_right += 1;
                        }
                    }

                    density = num_elements as f64 / (window_length * segment_capacity) as f64;

                    if density <= theta || height >= tree_height {
                        break;
                    }
                }
            }

            runs[i].segment_start = window_start;
            runs[i].segment_length = window_length;
            runs[i].cardinality = num_elements;

            if window_length == self.storage.num_segments && density > theta {
                return true;
            }
        }

        false
    }

    /// Applies every surviving run to its window.
    fn load_spread(&mut self, batch: &[(Key, Value)], runs: &[RunInfo]) -> Result<()> {
        for entry in runs.iter().filter(|run| run.valid) {
            let run = &batch[entry.run_start..entry.run_start + entry.run_length];

            if entry.segment_length == 1 {
                if entry.run_length == 1 {
                    // the fused density fits one segment, so there is room
                    let (key, value) = run[0];
                    self.insert_common(entry.segment_start, key, value)?;
                } else {
                    self.load_merge_single(entry.segment_start, run, entry.cardinality)?;
                }
            } else {
                self.load_merge_multi(
                    entry.segment_start,
                    entry.segment_length,
                    run,
                    entry.cardinality,
                )?;
            }
        }

        Ok(())
    }

    /// Merges a run into a single segment that can hold the result.
    fn load_merge_single(
        &mut self,
        segment_id: usize,
        run: &[(Key, Value)],
        cardinality: usize,
    ) -> Result<()> {
        let segment_capacity = self.storage.segment_capacity;
        debug_assert!(cardinality <= segment_capacity);
        debug_assert_eq!(
            cardinality,
            self.storage.segment_size(segment_id) + run.len(),
        );

        // stash the current contents, then merge back in one pass
        let current = self.storage.segment_range(segment_id);
        let mut input_keys: Vec<i64> = Vec::new();
        input_keys.try_reserve_exact(current.len())?;
        input_keys.extend_from_slice(&self.storage.keys[current.clone()]);

        let mut input_values: Vec<i64> = Vec::new();
        input_values.try_reserve_exact(current.len())?;
        input_values.extend_from_slice(&self.storage.values[current]);

        let base = segment_id * segment_capacity;
        let out_range = if segment_id % 2 == 0 {
            (base + segment_capacity - cardinality)..(base + segment_capacity)
        } else {
            base..(base + cardinality)
        };

        let mut out = out_range.start;
        let mut a = 0;
        let mut b = 0;

        while a < input_keys.len() && b < run.len() {
            if run[b].0 < input_keys[a] {
                self.storage.keys[out] = run[b].0;
                self.storage.values[out] = run[b].1;
                b += 1;
            } else {
                self.storage.keys[out] = input_keys[a];
                self.storage.values[out] = input_values[a];
                a += 1;
            }
            out += 1;
        }
        while a < input_keys.len() {
            self.storage.keys[out] = input_keys[a];
            self.storage.values[out] = input_values[a];
            a += 1;
            out += 1;
        }
        while b < run.len() {
            self.storage.keys[out] = run[b].0;
            self.storage.values[out] = run[b].1;
            b += 1;
            out += 1;
        }
        debug_assert_eq!(out, out_range.end);

        self.index
            .set_separator(segment_id, self.storage.keys[out_range.start]);
        self.storage.sizes[segment_id] = cardinality as u16;
        self.storage.cardinality += run.len();

        Ok(())
    }

    /// Merges a run into a window of segments, redistributing the combined
    /// contents evenly. Same gather-compact-refill structure as a spread,
    /// with the batch as a third merge input.
    fn load_merge_multi(
        &mut self,
        window_start: usize,
        window_length: usize,
        run: &[(Key, Value)],
        cardinality: usize,
    ) -> Result<()> {
        debug_assert_eq!(0, window_start % 2, "window must start at an even segment");
        debug_assert_eq!(0, window_length % 2, "window must span whole pairs");

        let segment_capacity = self.storage.segment_capacity;
        let num_pairs = window_length / 2;
        let window_end_slot = (window_start + window_length) * segment_capacity;

        let elements_per_segment = cardinality / window_length;
        let num_odd_segments = cardinality % window_length;

        // enough parked elements that the refill can never overtake the
        // in-place chunk
        let aux_target = 2 * (segment_capacity + window_length / (elements_per_segment + 1));

        let mut aux_pairs_from = num_pairs;
        let mut aux_len = 0;
        while aux_pairs_from > 0 && aux_len < aux_target {
            aux_pairs_from -= 1;
            aux_len += self
                .storage
                .pair_range(window_start + aux_pairs_from * 2)
                .len();
        }

        let mut aux_keys: Vec<i64> = Vec::new();
        aux_keys.try_reserve_exact(aux_len)?;
        let mut aux_values: Vec<i64> = Vec::new();
        aux_values.try_reserve_exact(aux_len)?;

        // 1a) park the rightmost pairs, in key order
        for pair in aux_pairs_from..num_pairs {
            let source = self.storage.pair_range(window_start + pair * 2);
            aux_keys.extend_from_slice(&self.storage.keys[source.clone()]);
            aux_values.extend_from_slice(&self.storage.values[source]);
        }

        // 1b) right-pack the remaining pairs inside the window
        let mut write_end = window_end_slot;
        for pair in (0..aux_pairs_from).rev() {
            let source = self.storage.pair_range(window_start + pair * 2);
            write_end -= source.len();
            self.storage.keys.copy_within(source.clone(), write_end);
            self.storage.values.copy_within(source, write_end);
        }
        let mut in_place = write_end..window_end_slot;

        debug_assert_eq!(
            cardinality,
            in_place.len() + aux_keys.len() + run.len(),
        );

        // 2) target occupancy per segment
        for i in 0..window_length {
            self.storage.sizes[window_start + i] =
                (elements_per_segment + usize::from(i < num_odd_segments)) as u16;
        }

        // 3) three-way merge: in-place chunk, side buffer, batch
        let mut aux_cursor = 0;
        let mut b = 0;

        for pair in 0..num_pairs {
            let even = window_start + pair * 2;
            let out_range = self.storage.pair_range(even);
            let mut out = out_range.start;

            // merge while both the array and the batch have elements left
            while out < out_range.end && b < run.len() {
                let array_key = if in_place.is_empty() {
                    if aux_cursor < aux_keys.len() {
                        Some(aux_keys[aux_cursor])
                    } else {
                        None
                    }
                } else {
                    Some(self.storage.keys[in_place.start])
                };

                let Some(array_key) = array_key else { break };

                if array_key <= run[b].0 {
                    if in_place.is_empty() {
                        self.storage.keys[out] = aux_keys[aux_cursor];
                        self.storage.values[out] = aux_values[aux_cursor];
                        aux_cursor += 1;
                    } else {
                        self.storage.keys[out] = self.storage.keys[in_place.start];
                        self.storage.values[out] = self.storage.values[in_place.start];
                        in_place.start += 1;
                    }
                } else {
                    self.storage.keys[out] = run[b].0;
                    self.storage.values[out] = run[b].1;
                    b += 1;
                }
                out += 1;
            }

            // drain the array chunks
            while out < out_range.end && !in_place.is_empty() {
                let n = (out_range.end - out).min(in_place.len());
                self.storage
                    .keys
                    .copy_within(in_place.start..in_place.start + n, out);
                self.storage
                    .values
                    .copy_within(in_place.start..in_place.start + n, out);
                in_place.start += n;
                out += n;
            }
            if out < out_range.end && aux_cursor < aux_keys.len() {
                let n = (out_range.end - out).min(aux_keys.len() - aux_cursor);
                self.storage.keys[out..out + n]
                    .copy_from_slice(&aux_keys[aux_cursor..aux_cursor + n]);
                self.storage.values[out..out + n]
                    .copy_from_slice(&aux_values[aux_cursor..aux_cursor + n]);
                aux_cursor += n;
                out += n;
            }

            // drain the batch
            while out < out_range.end && b < run.len() {
                self.storage.keys[out] = run[b].0;
                self.storage.values[out] = run[b].1;
                b += 1;
                out += 1;
            }
            debug_assert_eq!(out, out_range.end);
        }

        self.refresh_window_separators(window_start, window_length);

        self.storage.cardinality += run.len();

        Ok(())
    }

    /// Rebuilds the whole array at the capacity needed for the combined
    /// contents, merging the old layout with the entire batch in one
    /// streaming pass.
    fn load_resize(&mut self, batch: &[(Key, Value)]) -> Result<()> {
        let segment_capacity = self.storage.segment_capacity;

        let target_density = self.densities.upper_threshold_root();
        let cardinality = self.storage.cardinality + batch.len();
        let capacity = ((cardinality as f64 / target_density).ceil() as usize).next_power_of_two();
        let num_segments = capacity / segment_capacity;
        debug_assert!(num_segments >= 2);

        log::debug!(
            "bulk load resizes sparse array: {} -> {capacity} slots ({num_segments} segments)",
            self.storage.capacity(),
        );

        let mut next = SparseArray::allocate(num_segments, segment_capacity)?;
        self.index.rebuild(num_segments)?;

        let elements_per_segment = cardinality / num_segments;
        let num_odd_segments = cardinality % num_segments;

        {
            let old = &self.storage;

            let mut input_pair = 0;
            let mut input = old.pair_range(0);
            let mut b = 0;

            for j in (0..num_segments).step_by(2) {
                next.sizes[j] = (elements_per_segment + usize::from(j < num_odd_segments)) as u16;
                next.sizes[j + 1] =
                    (elements_per_segment + usize::from(j + 1 < num_odd_segments)) as u16;

                let out_start =
                    (j + 1) * segment_capacity - usize::from(next.sizes[j]);
                let out_end =
                    out_start + usize::from(next.sizes[j]) + usize::from(next.sizes[j + 1]);
                let mut out = out_start;

                while out < out_end {
                    let take_old = if input.is_empty() {
                        debug_assert!(b < batch.len(), "ran out of elements while rebuilding");
                        false
                    } else if b < batch.len() {
                        old.keys[input.start] < batch[b].0
                    } else {
                        true
                    };

                    if take_old {
                        next.keys[out] = old.keys[input.start];
                        next.values[out] = old.values[input.start];
                        input.start += 1;

                        if input.is_empty() {
                            input_pair += 2;
                            if input_pair < old.num_segments {
                                input = old.pair_range(input_pair);
                            }
                        }
                    } else {
                        next.keys[out] = batch[b].0;
                        next.values[out] = batch[b].1;
                        b += 1;
                    }
                    out += 1;
                }
            }
        }

        next.cardinality = cardinality;
        self.storage = next;
        self.densities.rebuild(self.storage.height());
        self.refresh_window_separators(0, num_segments);

        Ok(())
    }

    /// Bulk load into an empty engine.
    fn load_empty(&mut self, batch: &[(Key, Value)]) -> Result<()> {
        let segment_capacity = self.storage.segment_capacity;
        let fits_one_segment = segment_capacity as f64 * self.densities.upper_threshold_leaves()
            >= batch.len() as f64;

        if fits_one_segment {
            self.load_empty_single(batch);
            Ok(())
        } else {
            self.load_empty_multi(batch)
        }
    }

    /// Fast path: the whole batch fits into segment 0.
    fn load_empty_single(&mut self, batch: &[(Key, Value)]) {
        debug_assert!(self.is_empty());
        debug_assert_eq!(1, self.storage.num_segments);

        let out_start = self.storage.segment_capacity - batch.len();

        for (i, &(key, value)) in batch.iter().enumerate() {
            self.storage.keys[out_start + i] = key;
            self.storage.values[out_start + i] = value;
        }

        self.index.set_separator(0, batch[0].0);
        self.storage.sizes[0] = batch.len() as u16;
        self.storage.cardinality = batch.len();
    }

    /// Sizes a fresh array for the batch and streams it in.
    ///
    /// Filling up to the leaf threshold would force a resize on the very
    /// next insertion into a full segment, so the target density is the
    /// midpoint between the root and leaf upper thresholds.
    fn load_empty_multi(&mut self, batch: &[(Key, Value)]) -> Result<()> {
        debug_assert!(self.is_empty());

        let segment_capacity = self.storage.segment_capacity;

        let target_density =
            (self.densities.upper_threshold_root() + self.densities.upper_threshold_leaves()) / 2.0;
        let capacity = ((batch.len() as f64 / target_density).ceil() as usize).next_power_of_two();
        let num_segments = capacity / segment_capacity;
        debug_assert!(num_segments >= 2);

        let mut next = SparseArray::allocate(num_segments, segment_capacity)?;
        self.index.rebuild(num_segments)?;

        let elements_per_segment = batch.len() / num_segments;
        let num_odd_segments = batch.len() % num_segments;

        for i in 0..num_segments {
            next.sizes[i] = (elements_per_segment + usize::from(i < num_odd_segments)) as u16;
        }

        let mut cursor = 0;
        for j in (0..num_segments).step_by(2) {
            let out_start = (j + 1) * segment_capacity - usize::from(next.sizes[j]);
            let out_end = out_start + usize::from(next.sizes[j]) + usize::from(next.sizes[j + 1]);

            for out in out_start..out_end {
                next.keys[out] = batch[cursor].0;
                next.values[out] = batch[cursor].1;
                cursor += 1;
            }
        }
        debug_assert_eq!(cursor, batch.len());

        next.cardinality = batch.len();
        self.storage = next;
        self.densities.rebuild(self.storage.height());
        self.refresh_window_separators(0, num_segments);

        Ok(())
    }
}
