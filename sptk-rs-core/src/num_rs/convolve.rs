use crate::{Error, Result};
use ndarray::{Array1, ArrayView1};
use ndarray_conv::{ConvExt, ConvMode, PaddingMode};

/// Convolution mode determines behavior near edges and output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolveMode {
    /// Full convolution, output size is `a.len() + v.len() - 1`.
    Full,
    /// Valid convolution, output size is `max(a.len(), v.len()) - min(a.len(), v.len()) + 1`.
    Valid,
    /// Same convolution, output size is `max(a.len(), v.len())`.
    Same,
}

impl From<ConvolveMode> for ConvMode<1> {
    fn from(mode: ConvolveMode) -> Self {
        match mode {
            ConvolveMode::Full => ConvMode::Full,
            ConvolveMode::Valid => ConvMode::Valid,
            ConvolveMode::Same => ConvMode::Same,
        }
    }
}

/// Discrete linear convolution of two one-dimensional sequences, following
/// `numpy.convolve`.
///
/// Convolution is commutative, so the shorter sequence is always used as the
/// kernel. When both sequences represent polynomials in `z^-1` with ascending
/// delay, [`ConvolveMode::Full`] yields the taps of their product.
///
/// # Errors
/// [`Error::InvalidArg`] if either sequence is empty, [`Error::Conv`] if the
/// backend rejects the inputs.
///
/// # Examples
/// Multiplying `(1 + 0.5 z^-1)` by `(1 - z^-1)`:
/// ```
/// use ndarray::array;
/// use sptk_rs_core::num_rs::{convolve, ConvolveMode};
///
/// let b = array![1., 0.5];
/// let a = array![1., -1.];
/// let c = convolve(b.view(), a.view(), ConvolveMode::Full).unwrap();
/// assert_eq!(c, array![1., -0.5, -0.5]);
/// ```
pub fn convolve<T>(a: ArrayView1<T>, v: ArrayView1<T>, mode: ConvolveMode) -> Result<Array1<T>>
where
    T: num_traits::NumAssign + Copy,
{
    if a.is_empty() || v.is_empty() {
        return Err(Error::InvalidArg {
            arg: if a.is_empty() { "a" } else { "v" }.into(),
            reason: "cannot convolve an empty sequence".into(),
        });
    }
    let (signal, kernel) = if v.len() > a.len() {
        (v.view(), a.view())
    } else {
        (a.view(), v.view())
    };
    // The backend correlates, so flip the kernel to convolve.
    let flipped: Array1<T> = kernel.iter().rev().copied().collect();
    signal
        .conv(&flipped, mode.into(), PaddingMode::Zeros)
        .map_err(|e| Error::Conv {
            reason: e.to_string(),
        })
}
