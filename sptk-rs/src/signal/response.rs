//! Complex frequency response of `B / A` on the one-sided DFT grid.

use super::batch::{self, LaneKernel};
use super::polynomial::{Coefficients, Polynomial, RationalSystem};
use super::traits::FrequencyResponseNd;
use super::AnalysisFloat;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use ndarray::{ArrayD, ArrayView1, ArrayViewMut1, ArrayViewMutD};
use rustfft::num_complex::Complex;
use sptk_rs_core::num_rs::RfftPlan;

pub(crate) const DEFAULT_FFT_LENGTH: usize = 512;

/// Plan the `fft_length`-point transform shared by every analysis kernel.
pub(crate) fn plan_fft<F: AnalysisFloat>(fft_length: usize) -> Result<RfftPlan<F>, ConfigError> {
    if fft_length < 2 {
        return Err(ConfigError::InvalidArgument {
            arg: "fft_length",
            reason: "fft_length must be >= 2",
        });
    }
    RfftPlan::new(fft_length).map_err(|_| ConfigError::InvalidArgument {
        arg: "fft_length",
        reason: "transform could not be planned",
    })
}

pub(crate) fn core_error(err: sptk_rs_core::Error) -> ExecInvariantViolation {
    tracing::debug!(%err, "transform rejected lane");
    ExecInvariantViolation::InvalidState {
        reason: "transform rejected lane taps",
    }
}

/// `out[k] = X[k]`, or one for `Identity`.
pub(crate) fn transform_lane<F: AnalysisFloat>(
    plan: &RfftPlan<F>,
    taps: &Polynomial<ArrayView1<F>>,
    mut out: ArrayViewMut1<Complex<F>>,
) -> Result<(), ExecInvariantViolation> {
    match taps {
        Polynomial::Identity => {
            out.fill(Complex::new(F::one(), F::zero()));
            Ok(())
        }
        Polynomial::Explicit(taps) => plan.process_into(taps.view(), out).map_err(core_error),
    }
}

/// `out[k] = |X[k]|^2`, or one for `Identity`.
pub(crate) fn power_lane<F: AnalysisFloat>(
    plan: &RfftPlan<F>,
    taps: &Polynomial<ArrayView1<F>>,
    mut out: ArrayViewMut1<F>,
) -> Result<(), ExecInvariantViolation> {
    match taps {
        Polynomial::Identity => out.fill(F::one()),
        Polynomial::Explicit(taps) => {
            let spec = plan.process(taps.view()).map_err(core_error)?;
            out.zip_mut_with(&spec, |p, x| *p = x.norm_sqr());
        }
    }
    Ok(())
}

/// `out[k] = B[k] / A[k]` with literal complex division.
pub(crate) fn response_lane<F: AnalysisFloat>(
    plan: &RfftPlan<F>,
    b: &Polynomial<ArrayView1<F>>,
    a: &Polynomial<ArrayView1<F>>,
    mut out: ArrayViewMut1<Complex<F>>,
) -> Result<(), ExecInvariantViolation> {
    transform_lane(plan, b, out.view_mut())?;
    if let Polynomial::Explicit(a) = a {
        let denom = plan.process(a.view()).map_err(core_error)?;
        out.zip_mut_with(&denom, |h, d| *h = *h / *d);
    }
    Ok(())
}

/// Constructor config for [`FrequencyResponseKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrequencyResponseConfig {
    /// DFT length `L`, at least 2.
    pub fft_length: usize,
}

impl Default for FrequencyResponseConfig {
    fn default() -> Self {
        Self {
            fft_length: DEFAULT_FFT_LENGTH,
        }
    }
}

/// Trait-first frequency response kernel.
#[derive(Debug, Clone)]
pub struct FrequencyResponseKernel<F> {
    plan: RfftPlan<F>,
}

impl<F: AnalysisFloat> FrequencyResponseKernel<F> {
    /// Configured transform length.
    pub fn fft_length(&self) -> usize {
        self.plan.fft_length()
    }
}

impl<F: AnalysisFloat> KernelLifecycle for FrequencyResponseKernel<F> {
    type Config = FrequencyResponseConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let plan = plan_fft(config.fft_length)?;
        tracing::debug!(fft_length = config.fft_length, "frequency response kernel");
        Ok(Self { plan })
    }
}

impl<F: AnalysisFloat> LaneKernel<F> for FrequencyResponseKernel<F> {
    type Output = Complex<F>;

    fn fill_value(&self) -> Complex<F> {
        Complex::new(F::zero(), F::zero())
    }

    fn num_bins(&self) -> usize {
        self.plan.num_bins()
    }

    fn check(&self, system: &RationalSystem<'_, F>) -> Result<(), ConfigError> {
        system.check_fft_length(self.plan.fft_length())
    }

    fn run_lane(
        &self,
        b: Polynomial<ArrayView1<F>>,
        a: Polynomial<ArrayView1<F>>,
        out: ArrayViewMut1<Complex<F>>,
    ) -> Result<(), ExecInvariantViolation> {
        response_lane(&self.plan, &b, &a, out)
    }
}

impl<F: AnalysisFloat> FrequencyResponseNd<F> for FrequencyResponseKernel<F> {
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<Complex<F>>, ExecInvariantViolation> {
        batch::run_alloc(self, b, a)
    }

    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, Complex<F>>,
    ) -> Result<(), ExecInvariantViolation> {
        batch::run_into(self, b, a, out)
    }

    fn run_1d_into<B, A, O>(
        &self,
        b: Polynomial<&B>,
        a: Polynomial<&A>,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        B: Read1D<F> + ?Sized,
        A: Read1D<F> + ?Sized,
        O: Write1D<Complex<F>> + ?Sized,
    {
        batch::run_1d_into(self, b, a, out)
    }
}

/// Complex frequency response `H[..., k] = B(k) / A(k)`, `k = 0..=L/2`.
///
/// `None` stands for the polynomial `[1]`; at least one side must be given.
///
/// ```
/// use ndarray::{array, Array1};
/// use sptk_rs::signal::frequency_response;
///
/// let b = array![1.0, 0.5];
/// let h = frequency_response(&b, None::<&Array1<f64>>, 8).unwrap();
/// assert_eq!(h.shape(), &[5]);
/// assert!((h[0].re - 1.5).abs() < 1e-12);
/// assert!((h[4].re - 0.5).abs() < 1e-12);
/// ```
pub fn frequency_response<'a, F, B, A>(
    b: B,
    a: A,
    fft_length: usize,
) -> Result<ArrayD<Complex<F>>, ExecInvariantViolation>
where
    F: AnalysisFloat,
    B: Into<Coefficients<'a, F>>,
    A: Into<Coefficients<'a, F>>,
{
    FrequencyResponseKernel::try_new(FrequencyResponseConfig { fft_length })?
        .run_alloc(b.into(), a.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2, IxDyn};

    fn direct_response(b: &[f64], a: &[f64], n: usize, k: usize) -> Complex<f64> {
        let eval = |taps: &[f64]| {
            taps.iter()
                .enumerate()
                .map(|(i, &c)| {
                    let w = -2.0 * core::f64::consts::PI * (i * k) as f64 / n as f64;
                    Complex::from_polar(c, w)
                })
                .sum::<Complex<f64>>()
        };
        eval(b) / eval(a)
    }

    #[test]
    fn one_sided_bins_match_direct_evaluation() {
        let b = array![0.3, -0.2, 0.7];
        let a = array![1.0, -0.6, 0.25];
        let h = frequency_response(&b, &a, 16).unwrap();
        assert_eq!(h.shape(), &[9]);
        for k in 0..9 {
            let want = direct_response(b.as_slice().unwrap(), a.as_slice().unwrap(), 16, k);
            assert_abs_diff_eq!(h[k].re, want.re, epsilon = 1e-12);
            assert_abs_diff_eq!(h[k].im, want.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn denominator_only_is_reciprocal() {
        let a = array![2.0, 1.0];
        let none: Option<&Array1<f64>> = None;
        let h = frequency_response(none, Some(&a), 4).unwrap();
        assert_abs_diff_eq!(h[0].re, 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h[2].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(h[1].norm(), 1.0 / 5.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn zero_denominator_propagates_non_finite_values() {
        let b = array![1.0f64];
        let a = array![1.0f64, 1.0];
        let h = frequency_response(&b, &a, 2).unwrap();
        assert!(!h[1].re.is_finite() || !h[1].im.is_finite());
    }

    #[test]
    fn kernel_rejects_short_transforms() {
        assert_eq!(
            FrequencyResponseKernel::<f64>::try_new(FrequencyResponseConfig { fft_length: 1 })
                .unwrap_err(),
            ConfigError::InvalidArgument {
                arg: "fft_length",
                reason: "fft_length must be >= 2",
            }
        );

        let b = Array1::<f64>::ones(9);
        let err = frequency_response(&b, None::<&Array1<f64>>, 8).unwrap_err();
        assert_eq!(
            err,
            ExecInvariantViolation::from(ConfigError::InsufficientLength {
                arg: "b",
                required: 9,
                got: 8,
            })
        );
    }

    #[test]
    fn batched_entrypoints_agree() {
        let kernel =
            FrequencyResponseKernel::<f64>::try_new(FrequencyResponseConfig { fft_length: 8 })
                .unwrap();
        let b = Array2::from_shape_vec((3, 2), vec![1.0, 0.5, 1.0, -0.5, 0.2, 0.0]).unwrap();
        let a = array![1.0, -0.3];

        let alloc = kernel.run_alloc((&b).into(), (&a).into()).unwrap();
        assert_eq!(alloc.shape(), &[3, 5]);

        let mut into = ArrayD::from_elem(IxDyn(&[3, 5]), Complex::new(0.0, 0.0));
        kernel
            .run_into((&b).into(), (&a).into(), into.view_mut())
            .unwrap();
        assert_eq!(alloc, into);

        let mut lane = vec![Complex::new(0.0, 0.0); 5];
        kernel
            .run_1d_into(
                Polynomial::Explicit(&[1.0, -0.5][..]),
                Polynomial::Explicit(&a),
                &mut lane,
            )
            .unwrap();
        for k in 0..5 {
            assert_abs_diff_eq!(lane[k].re, alloc[[1, k]].re, epsilon = 1e-12);
            assert_abs_diff_eq!(lane[k].im, alloc[[1, k]].im, epsilon = 1e-12);
        }
    }
}
