use crate::density::DensityBounds;
use std::collections::TryReserveError;

/// Represents errors that can occur in the packed memory array
#[derive(Debug)]
pub enum Error {
    /// Memory for the sparse array or an auxiliary buffer could not be reserved
    AllocationFailed(TryReserveError),

    /// Invalid segment capacity
    ///
    /// The segment capacity needs to be a power of two in `8..=32768`.
    InvalidSegmentCapacity(usize),

    /// Density bounds do not satisfy `0 <= rho_leaf < rho_root < theta_root < theta_leaf <= 1`
    InvalidDensityBounds(DensityBounds),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PmaError: {self:?}")
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(value: TryReserveError) -> Self {
        Self::AllocationFailed(value)
    }
}

/// Packed memory array result
pub type Result<T> = std::result::Result<T, Error>;
