use crate::{Error, Result};
use core::fmt;
use ndarray::{Array1, ArrayView1, ArrayViewMut1};
use num_traits::Float;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftNum, FftPlanner};
use std::sync::Arc;

/// Planned forward DFT of real input, keeping the one-sided half.
///
/// Equivalent to `numpy.fft.rfft(x, n=fft_length)`: the input is zero padded
/// to `fft_length` and bins `0..=fft_length / 2` are returned. The plan is
/// immutable and can be shared between threads.
#[derive(Clone)]
pub struct RfftPlan<T> {
    fft_length: usize,
    fft: Arc<dyn Fft<T>>,
}

impl<T> fmt::Debug for RfftPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfftPlan")
            .field("fft_length", &self.fft_length)
            .finish_non_exhaustive()
    }
}

impl<T> RfftPlan<T>
where
    T: FftNum + Float,
{
    /// Plan a transform of `fft_length` points.
    pub fn new(fft_length: usize) -> Result<Self> {
        if fft_length == 0 {
            return Err(Error::InvalidArg {
                arg: "fft_length".into(),
                reason: "transform length must be positive".into(),
            });
        }
        let mut planner = FftPlanner::<T>::new();
        Ok(Self {
            fft_length,
            fft: planner.plan_fft_forward(fft_length),
        })
    }

    /// Transform length `L`.
    pub fn fft_length(&self) -> usize {
        self.fft_length
    }

    /// Number of one-sided bins, `L / 2 + 1`.
    pub fn num_bins(&self) -> usize {
        self.fft_length / 2 + 1
    }

    /// Transform `x` into a caller-provided buffer of [`Self::num_bins`] bins.
    pub fn process_into(&self, x: ArrayView1<T>, mut out: ArrayViewMut1<Complex<T>>) -> Result<()> {
        if x.len() > self.fft_length {
            return Err(Error::InvalidArg {
                arg: "x".into(),
                reason: format!(
                    "{} samples do not fit a {}-point transform",
                    x.len(),
                    self.fft_length
                ),
            });
        }
        if out.len() != self.num_bins() {
            return Err(Error::InvalidArg {
                arg: "out".into(),
                reason: format!("expected {} bins, got {}", self.num_bins(), out.len()),
            });
        }

        let mut buf = vec![Complex::new(T::zero(), T::zero()); self.fft_length];
        for (dst, &src) in buf.iter_mut().zip(x.iter()) {
            *dst = Complex::new(src, T::zero());
        }
        self.fft.process(&mut buf);
        for (dst, src) in out.iter_mut().zip(buf.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    /// Transform `x` and allocate the one-sided spectrum.
    pub fn process(&self, x: ArrayView1<T>) -> Result<Array1<Complex<T>>> {
        let mut out = Array1::from_elem(self.num_bins(), Complex::new(T::zero(), T::zero()));
        self.process_into(x, out.view_mut())?;
        Ok(out)
    }
}

/// One-shot `numpy.fft.rfft`. `n` defaults to `x.len()`.
///
/// ```
/// use ndarray::array;
/// use sptk_rs_core::num_rs::rfft;
///
/// let spec = rfft(array![1.0_f64, 0.5].view(), Some(8)).unwrap();
/// assert_eq!(spec.len(), 5);
/// assert!((spec[0].re - 1.5).abs() < 1e-12);
/// assert!((spec[4].re - 0.5).abs() < 1e-12);
/// ```
pub fn rfft<T>(x: ArrayView1<T>, n: Option<usize>) -> Result<Array1<Complex<T>>>
where
    T: FftNum + Float,
{
    RfftPlan::new(n.unwrap_or(x.len()))?.process(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn direct_dft(x: &[f64], n: usize, k: usize) -> Complex<f64> {
        x.iter()
            .enumerate()
            .map(|(i, &v)| {
                let w = -2.0 * core::f64::consts::PI * (i * k) as f64 / n as f64;
                Complex::from_polar(v, w)
            })
            .sum()
    }

    #[test]
    fn matches_direct_dft_on_non_negative_bins() {
        let x = [0.3, -1.2, 0.8, 2.0, -0.1];
        let plan = RfftPlan::<f64>::new(16).unwrap();
        let spec = plan.process(ArrayView1::from(&x[..])).unwrap();
        assert_eq!(spec.len(), 9);
        for (k, bin) in spec.iter().enumerate() {
            let expected = direct_dft(&x, 16, k);
            assert_abs_diff_eq!(bin.re, expected.re, epsilon = 1e-12);
            assert_abs_diff_eq!(bin.im, expected.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn odd_length_has_no_nyquist_bin() {
        let plan = RfftPlan::<f32>::new(7).unwrap();
        assert_eq!(plan.num_bins(), 4);
        let spec = plan.process(array![1.0f32].view()).unwrap();
        assert!(spec.iter().all(|c| (c.re - 1.0).abs() < 1e-6 && c.im.abs() < 1e-6));
    }

    #[test]
    fn rejects_zero_length_and_oversized_input() {
        assert!(RfftPlan::<f64>::new(0).is_err());

        let plan = RfftPlan::<f64>::new(2).unwrap();
        let err = plan.process(array![1., 2., 3.].view()).unwrap_err();
        assert!(matches!(err, Error::InvalidArg { ref arg, .. } if arg == "x"));
    }

    #[test]
    fn process_into_checks_bin_count() {
        let plan = RfftPlan::<f64>::new(8).unwrap();
        let mut out = Array1::from_elem(4, Complex::new(0.0, 0.0));
        let err = plan
            .process_into(array![1.].view(), out.view_mut())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArg { ref arg, .. } if arg == "out"));
    }

    #[test]
    fn plan_is_reusable() {
        let plan = RfftPlan::<f64>::new(4).unwrap();
        let first = plan.process(array![1., 1.].view()).unwrap();
        let second = plan.process(array![1., 1.].view()).unwrap();
        assert_eq!(first, second);
        assert_abs_diff_eq!(first[2].re, 0.0, epsilon = 1e-12);
    }
}
