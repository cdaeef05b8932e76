use crate::{density::DensityBounds, index::SeparatorIndex, Pma, Result};

/// Engine configuration builder
///
/// # Example usage
///
/// ```
/// use pma::{Config, DensityBounds};
///
/// let pma = Config::new(64)
///     .density_bounds(DensityBounds::new(0.1, 0.35, 0.7, 0.95)?)
///     .build()?;
///
/// assert!(pma.is_empty());
/// # Ok::<(), pma::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of slots per segment
    pub(crate) segment_capacity: usize,

    /// Density thresholds of the calibrator tree
    pub(crate) density_bounds: DensityBounds,
}

impl Config {
    /// Creates a new configuration with the given segment capacity.
    ///
    /// The segment capacity needs to be a power of two in `8..=32768`;
    /// it is validated when the engine is built.
    #[must_use]
    pub fn new(segment_capacity: usize) -> Self {
        Self {
            segment_capacity,
            density_bounds: DensityBounds::default(),
        }
    }

    /// Sets the density thresholds of the calibrator tree.
    ///
    /// Default: `(0.08, 0.3, 0.75, 1.0)`.
    #[must_use]
    pub fn density_bounds(mut self, bounds: DensityBounds) -> Self {
        self.density_bounds = bounds;
        self
    }

    /// Builds an engine with the default (blocked) separator index.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment capacity is invalid or the initial
    /// workspace cannot be allocated.
    pub fn build(&self) -> Result<Pma> {
        Pma::with_config(self)
    }

    /// Builds an engine with an explicitly chosen separator index.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment capacity is invalid or the initial
    /// workspace cannot be allocated.
    pub fn build_with_index<I: SeparatorIndex>(&self) -> Result<Pma<I>> {
        Pma::with_config(self)
    }
}
