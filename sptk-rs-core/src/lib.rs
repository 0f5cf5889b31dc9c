//! Numeric primitives shared by `sptk-rs`.
//!
//! The [`num_rs`] module mirrors the handful of numpy routines the analysis
//! kernels are built from: a planned one-sided real FFT and linear
//! convolution, both over [`ndarray`] views.

#![warn(missing_docs)]

mod error;
pub mod num_rs;

pub use error::{Error, Result};
