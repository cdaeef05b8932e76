mod load;
mod range;
mod rebalance;

pub use range::{Iter, Keys, SumResult, Values};

use crate::{
    config::Config,
    density::CachedDensityBounds,
    index::{BlockedIndex, SeparatorIndex},
    storage::{SparseArray, MAX_SEGMENT_CAPACITY, MIN_SEGMENT_CAPACITY},
    Error, Key, Result, Value,
};

/// A packed memory array: an in-memory ordered map from 64-bit signed keys
/// to 64-bit signed values.
///
/// Logically consecutive keys are kept *physically* consecutive in a sparse
/// array, so range scans are one sequential memory sweep while point
/// operations stay O(log n) amortized.
///
/// The array is divided into fixed-capacity segments. A small separator
/// index (one key per segment) routes point operations; a calibrator tree
/// of per-height density bounds decides, whenever a segment over- or
/// underflows, between redistributing a window of segments in place
/// (*spread*) and rebuilding the whole array at doubled or halved capacity
/// (*resize*).
///
/// Duplicate keys are allowed, but one duplicate is indistinguishable from
/// another: [`Pma::remove`] deletes an arbitrary matching element.
pub struct Pma<I: SeparatorIndex = BlockedIndex> {
    pub(crate) storage: SparseArray,
    pub(crate) index: I,
    pub(crate) densities: CachedDensityBounds,
}

impl Pma<BlockedIndex> {
    /// Creates an empty engine with the given segment capacity and default
    /// density bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment capacity is not a power of two in
    /// `8..=32768`, or if the initial workspace cannot be allocated.
    pub fn new(segment_capacity: usize) -> Result<Self> {
        Config::new(segment_capacity).build()
    }
}

impl<I: SeparatorIndex> Pma<I> {
    pub(crate) fn with_config(config: &Config) -> Result<Self> {
        let segment_capacity = config.segment_capacity;

        if !segment_capacity.is_power_of_two()
            || !(MIN_SEGMENT_CAPACITY..=MAX_SEGMENT_CAPACITY).contains(&segment_capacity)
        {
            return Err(Error::InvalidSegmentCapacity(segment_capacity));
        }

        Ok(Self {
            storage: SparseArray::allocate(1, segment_capacity)?,
            index: I::with_segments(1)?,
            densities: CachedDensityBounds::new(config.density_bounds),
        })
    }

    /// Number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.cardinality
    }

    /// Returns `true` if the array contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.cardinality == 0
    }

    /// Inserts a key-value pair.
    ///
    /// Duplicate keys are allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if a rebalance buffer or a grown sparse array cannot
    /// be allocated; the engine is left unchanged in that case.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<()> {
        if self.is_empty() {
            self.insert_empty(key, value);
            Ok(())
        } else {
            let segment_id = self.locate(key);
            self.insert_common(segment_id, key, value)
        }
    }

    /// Segment holding the candidates for `key`.
    ///
    /// Empty segments carry their right neighbour's separator, so the index
    /// can route a key at the upper sentinel into an empty tail segment;
    /// step left to the nearest segment that actually holds elements.
    fn locate(&self, key: Key) -> usize {
        let mut segment_id = self.index.find(key);

        while segment_id > 0 && self.storage.segment_size(segment_id) == 0 {
            segment_id -= 1;
        }

        segment_id
    }

    /// First insertion into an empty array: segment 0, tail slot.
    fn insert_empty(&mut self, key: Key, value: Value) {
        debug_assert!(self.is_empty());

        self.index.set_separator(0, key);

        let position = self.storage.segment_capacity - 1;
        self.storage.keys[position] = key;
        self.storage.values[position] = value;
        self.storage.sizes[0] = 1;
        self.storage.cardinality = 1;
    }

    pub(crate) fn insert_common(&mut self, segment_id: usize, key: Key, value: Value) -> Result<()> {
        debug_assert!(!self.is_empty(), "use insert_empty instead");
        debug_assert!(segment_id < self.storage.num_segments);

        if self.storage.segment_size(segment_id) == self.storage.segment_capacity {
            self.rebalance_insert(segment_id, key, value)
        } else {
            if self.storage.insert_unsafe(segment_id, key, value) {
                self.index.set_separator(segment_id, key);
            }
            Ok(())
        }
    }

    /// Removes one element matching `key` and returns its value.
    ///
    /// With duplicate keys, an arbitrary matching element is removed.
    /// Returns `Ok(None)` if the key is absent; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a rebalance triggered by the removal cannot
    /// allocate; the engine is left unchanged in that case.
    pub fn remove(&mut self, key: Key) -> Result<Option<Value>> {
        if self.is_empty() {
            return Ok(None);
        }

        let segment_id = self.locate(key);

        let Some((value, min_changed)) = self.storage.remove_key(segment_id, key) else {
            return Ok(None);
        };

        if min_changed {
            if self.storage.cardinality == 0 {
                // the global minimum is gone, reset the lower sentinel
                self.index.set_separator(0, i64::MIN);
            } else if self.storage.segment_size(segment_id) > 0 {
                self.index
                    .set_separator(segment_id, self.storage.minimum(segment_id));
            } else if segment_id % 2 == 0 && self.storage.segment_size(segment_id + 1) > 0 {
                // the segment emptied out; the nearest minimum to its right
                // is the head of the odd neighbour
                self.index
                    .set_separator(segment_id, self.storage.minimum(segment_id + 1));
            }
        }

        // a lone segment is allowed to drain to zero
        if self.storage.num_segments > 1 {
            let (rho_leaf, _) = self.densities.get(1);
            let minimum_size =
                (((rho_leaf * self.storage.segment_capacity as f64).ceil()) as usize).max(1);

            if self.storage.segment_size(segment_id) < minimum_size {
                self.rebalance_delete(segment_id)?;
            }
        }

        Ok(Some(value))
    }

    /// Returns the value stored for `key`, or `None` if the key is absent.
    ///
    /// With duplicate keys, any matching value may be returned.
    #[must_use]
    pub fn find(&self, key: Key) -> Option<Value> {
        if self.is_empty() {
            return None;
        }

        let segment_id = self.locate(key);
        let run = self.storage.segment_range(segment_id);

        self.storage.keys[run.clone()]
            .iter()
            .position(|&k| k == key)
            .map(|offset| self.storage.values[run.start + offset])
    }

    /// Returns `true` if the array contains the key.
    #[must_use]
    pub fn contains_key(&self, key: Key) -> bool {
        self.find(key).is_some()
    }

    /// Returns the smallest key and its value.
    #[must_use]
    pub fn first_key_value(&self) -> Option<(Key, Value)> {
        (0..self.storage.num_segments)
            .find(|&segment_id| self.storage.segment_size(segment_id) > 0)
            .map(|segment_id| {
                let run = self.storage.segment_range(segment_id);
                (self.storage.keys[run.start], self.storage.values[run.start])
            })
    }

    /// Returns the largest key and its value.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(Key, Value)> {
        (0..self.storage.num_segments)
            .rev()
            .find(|&segment_id| self.storage.segment_size(segment_id) > 0)
            .map(|segment_id| {
                let run = self.storage.segment_range(segment_id);
                (
                    self.storage.keys[run.end - 1],
                    self.storage.values[run.end - 1],
                )
            })
    }

    #[doc(hidden)]
    #[must_use]
    pub fn segment_capacity(&self) -> usize {
        self.storage.segment_capacity
    }

    #[doc(hidden)]
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.storage.num_segments
    }

    #[doc(hidden)]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    #[doc(hidden)]
    #[must_use]
    pub fn height(&self) -> usize {
        self.storage.height()
    }

    #[doc(hidden)]
    #[must_use]
    pub fn segment_size(&self, segment_id: usize) -> usize {
        self.storage.segment_size(segment_id)
    }

    /// Asserts the structural invariants of the array; panics on violation.
    #[doc(hidden)]
    pub fn check_integrity(&self) {
        let storage = &self.storage;

        assert!(storage.num_segments.is_power_of_two());
        assert!(storage.capacity().is_power_of_two());
        assert_eq!(
            storage.height(),
            1 + storage.num_segments.trailing_zeros() as usize,
        );
        assert_eq!(storage.height(), self.densities.tree_height());

        let mut total = 0;
        let mut previous = i64::MIN;

        for segment_id in 0..storage.num_segments {
            let size = storage.segment_size(segment_id);
            assert!(size <= storage.segment_capacity, "segment overflow");
            total += size;

            for slot in storage.segment_range(segment_id) {
                assert!(
                    storage.keys[slot] >= previous,
                    "key order violated at slot {slot}",
                );
                previous = storage.keys[slot];
            }

            if size > 0 {
                assert_eq!(
                    self.index.separator(segment_id),
                    storage.minimum(segment_id),
                    "separator of segment {segment_id} out of sync",
                );
            }
        }

        assert_eq!(total, storage.cardinality, "cardinality out of sync");

        // the separator array must stay non-decreasing; empty segments
        // inherit a separator no smaller than their left neighbour's and no
        // larger than their right neighbour's, so binary probes stay sound
        for segment_id in 1..storage.num_segments {
            assert!(
                self.index.separator(segment_id - 1) <= self.index.separator(segment_id),
                "separator order violated at segment {segment_id}",
            );
        }
    }
}
