use crate::{Error, Result};

/// Density thresholds of the calibrator tree
///
/// The calibrator tree is a virtual binary tree over the segments of the
/// sparse array. Every node at height `h` (1 = a single segment,
/// `H` = the whole array) constrains the density of its window to
/// `[rho(h), theta(h)]`, where both bounds interpolate linearly between the
/// leaf values (`rho_leaf`, `theta_leaf`) and the root values
/// (`rho_root`, `theta_root`).
///
/// The bounds need to satisfy
/// `0 <= rho_leaf < rho_root < theta_root < theta_leaf <= 1`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DensityBounds {
    rho_leaf: f64,
    rho_root: f64,
    theta_root: f64,
    theta_leaf: f64,
}

impl Default for DensityBounds {
    fn default() -> Self {
        Self {
            rho_leaf: 0.08,
            rho_root: 0.3,
            theta_root: 0.75,
            theta_leaf: 1.0,
        }
    }
}

impl DensityBounds {
    /// Creates validated density bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDensityBounds`] if the ordering
    /// `0 <= rho_leaf < rho_root < theta_root < theta_leaf <= 1` is violated.
    pub fn new(rho_leaf: f64, rho_root: f64, theta_root: f64, theta_leaf: f64) -> Result<Self> {
        let bounds = Self {
            rho_leaf,
            rho_root,
            theta_root,
            theta_leaf,
        };

        if !(0.0 <= rho_leaf
            && rho_leaf < rho_root
            && rho_root < theta_root
            && theta_root < theta_leaf
            && theta_leaf <= 1.0)
        {
            return Err(Error::InvalidDensityBounds(bounds));
        }

        Ok(bounds)
    }

    /// Lower density threshold for a single segment.
    #[must_use]
    pub fn rho_leaf(&self) -> f64 {
        self.rho_leaf
    }

    /// Lower density threshold for the whole array.
    #[must_use]
    pub fn rho_root(&self) -> f64 {
        self.rho_root
    }

    /// Upper density threshold for the whole array.
    #[must_use]
    pub fn theta_root(&self) -> f64 {
        self.theta_root
    }

    /// Upper density threshold for a single segment.
    #[must_use]
    pub fn theta_leaf(&self) -> f64 {
        self.theta_leaf
    }

    /// Returns `(rho, theta)` for a node at `node_height` in a calibrator
    /// tree of `tree_height`.
    pub(crate) fn thresholds(&self, tree_height: usize, node_height: usize) -> (f64, f64) {
        debug_assert!(
            (1..=tree_height).contains(&node_height),
            "node height out of range",
        );

        // A tree of height 1 has no levels to interpolate between
        if tree_height == 1 {
            return (self.rho_leaf, self.theta_leaf);
        }

        let scale = (tree_height - node_height) as f64 / (tree_height - 1) as f64;

        let rho = self.rho_root - (self.rho_root - self.rho_leaf) * scale;
        let theta = self.theta_root + (self.theta_leaf - self.theta_root) * scale;

        (rho, theta)
    }
}

/// Caches the per-height thresholds of the current calibrator tree.
///
/// Rebuilt whenever the tree height changes (i.e. on resize).
pub(crate) struct CachedDensityBounds {
    bounds: DensityBounds,
    cache: Vec<(f64, f64)>,
}

impl CachedDensityBounds {
    pub(crate) fn new(bounds: DensityBounds) -> Self {
        let mut cached = Self {
            bounds,
            cache: Vec::new(),
        };
        cached.rebuild(1);
        cached
    }

    pub(crate) fn rebuild(&mut self, tree_height: usize) {
        let bounds = self.bounds;
        self.cache.clear();
        self.cache
            .extend((1..=tree_height).map(|h| bounds.thresholds(tree_height, h)));
    }

    /// Cached `(rho, theta)` of a node at the given height.
    pub(crate) fn get(&self, node_height: usize) -> (f64, f64) {
        self.cache[node_height - 1]
    }

    pub(crate) fn tree_height(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn upper_threshold_root(&self) -> f64 {
        self.bounds.theta_root()
    }

    pub(crate) fn upper_threshold_leaves(&self) -> f64 {
        self.bounds.theta_leaf()
    }
}
