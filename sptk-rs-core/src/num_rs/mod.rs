//! numpy-style routines over [`ndarray`] views.

mod convolve;
mod fft;

pub use convolve::*;
pub use fft::*;
