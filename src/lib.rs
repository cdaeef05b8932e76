//! A cache-friendly packed memory array (PMA) for ordered 64-bit keys and
//! values.
//!
//! ##### About
//!
//! This crate exports a [`Pma`] that keeps logically consecutive keys
//! *physically* consecutive in a sparse array. Elements live in
//! fixed-capacity segments; every segment keeps some slack, so point
//! inserts and deletes are O(log n) amortized, while range scans and
//! aggregations are a single sequential sweep over memory.
//!
//! When a segment over- or underflows, a *calibrator tree* of per-height
//! density bounds decides how far the disturbance has to be smoothed out:
//! the smallest enclosing window whose density is back within bounds is
//! evenly redistributed in place (*spread*); if no window qualifies, the
//! whole array is rebuilt at doubled or halved capacity (*resize*). A small
//! separator index (one key per segment) routes point operations to their
//! segment.
//!
//! Keys and values are `i64`. Duplicate keys are allowed, but duplicates
//! are indistinguishable from one another on removal.
//!
//! # Example usage
//!
//! ```
//! use pma::Pma;
//!
//! let mut pma = Pma::new(64)?;
//!
//! pma.insert(5, 50)?;
//! pma.insert(3, 30)?;
//! pma.insert(7, 70)?;
//!
//! assert_eq!(Some(30), pma.find(3));
//! assert_eq!(3, pma.len());
//!
//! // Bulk loads are much faster than repeated inserts
//! pma.load(&[(10, 100), (11, 110), (12, 120)])?;
//!
//! // Range scans walk the sparse array sequentially
//! let keys: Vec<_> = pma.range(5, 11).map(|(k, _)| k).collect();
//! assert_eq!(vec![5, 7, 10, 11], keys);
//!
//! // Aggregate a key interval in one sweep
//! let agg = pma.sum(3, 7);
//! assert_eq!(3, agg.count);
//! assert_eq!(15, agg.sum_keys);
//! #
//! # Ok::<(), pma::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]

mod config;
mod density;
mod error;
pub mod index;
mod pma;
mod storage;

pub use config::Config;
pub use density::DensityBounds;
pub use error::{Error, Result};
pub use pma::{Iter, Keys, Pma, SumResult, Values};

/// Key type of the packed memory array
pub type Key = i64;

/// Value type of the packed memory array
pub type Value = i64;
