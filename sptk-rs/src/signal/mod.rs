//! Spectral and phase analysis of rational systems `H(z) = B(z) / A(z)`.
//!
//! Coefficients are laid out as `(..., K)`: the trailing axis holds the taps in
//! ascending delay order and the leading axes are batch axes, broadcast between
//! numerator and denominator with numpy rules. Every analysis is evaluated on
//! the `fft_length / 2 + 1` non-negative bins of an `fft_length`-point DFT.

use num_traits::{Float, FloatConst, NumAssign};
use rustfft::FftNum;

mod batch;
mod grpdelay;
mod norm0;
mod phase;
mod polynomial;
mod response;
mod spectrum;
pub mod traits;

pub use grpdelay::*;
pub use norm0::*;
pub use phase::*;
pub use polynomial::{Coefficients, Polynomial, RationalSystem};
pub use response::*;
pub use spectrum::*;
pub use traits::*;

/// Element types accepted by the analysis kernels (`f32`, `f64`).
pub trait AnalysisFloat: Float + FloatConst + FftNum + NumAssign {}

impl<T> AnalysisFloat for T where T: Float + FloatConst + FftNum + NumAssign {}

/// Literal conversion; `f32` and `f64` represent every constant used here.
pub(crate) fn cast<F: Float>(x: f64) -> F {
    F::from(x).unwrap_or_else(F::nan)
}
