//! Phase response in units of `pi`, optionally unwrapped along frequency.

use super::batch::{self, LaneKernel};
use super::polynomial::{Coefficients, Polynomial, RationalSystem};
use super::response::{plan_fft, response_lane, DEFAULT_FFT_LENGTH};
use super::traits::PhaseNd;
use super::AnalysisFloat;
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use ndarray::{
    Array1, ArrayBase, ArrayD, ArrayView1, ArrayViewMut1, ArrayViewMutD, Axis, DataMut, Dimension,
};
use num_traits::Float;
use rustfft::num_complex::Complex;
use sptk_rs_core::num_rs::RfftPlan;

/// Unwrap one lane in place, in the manner of `numpy.unwrap(x, period=period)`.
fn unwrap_lane<F: Float>(mut lane: ArrayViewMut1<F>, period: F) {
    let half = period / (F::one() + F::one());
    let mut correction = F::zero();
    let mut iter = lane.iter_mut();
    let Some(first) = iter.next() else {
        return;
    };
    let mut prev = *first;
    for x in iter {
        let d = *x - prev;
        prev = *x;
        let shifted = d + half;
        let mut d_mod = shifted - period * (shifted / period).floor() - half;
        if d_mod == -half && d > F::zero() {
            d_mod = half;
        }
        if d.abs() >= half {
            correction = correction + (d_mod - d);
        }
        *x = *x + correction;
    }
}

/// Unwrap `phase` along its last axis so adjacent samples differ by at most
/// `period / 2`.
///
/// Jumps of at least half a period are replaced by their complement; other
/// samples only receive the accumulated correction. The first sample of every
/// lane is left unchanged. Use `period = 2` for phases in units of `pi` and
/// `period = 2 pi` for radians.
///
/// ```
/// use ndarray::array;
/// use sptk_rs::signal::unwrap_phase;
///
/// let mut x = array![0.0_f64, 0.9, -0.9, -0.5];
/// unwrap_phase(&mut x, 2.0).unwrap();
/// assert!((x[2] - 1.1).abs() < 1e-12);
/// assert!((x[3] - 1.5).abs() < 1e-12);
/// ```
pub fn unwrap_phase<F, S, D>(phase: &mut ArrayBase<S, D>, period: F) -> Result<(), ConfigError>
where
    F: Float,
    S: DataMut<Elem = F>,
    D: Dimension,
{
    if !period.is_finite() || period <= F::zero() {
        return Err(ConfigError::InvalidArgument {
            arg: "period",
            reason: "period must be finite and > 0",
        });
    }
    if phase.ndim() == 0 {
        return Ok(());
    }
    let axis = Axis(phase.ndim() - 1);
    for lane in phase.lanes_mut(axis) {
        unwrap_lane(lane, period);
    }
    Ok(())
}

/// Constructor config for [`PhaseKernel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PhaseConfig {
    /// DFT length `L`, at least 2.
    pub fft_length: usize,
    /// Unwrap along the frequency axis.
    pub unwrap: bool,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            fft_length: DEFAULT_FFT_LENGTH,
            unwrap: false,
        }
    }
}

/// Trait-first phase kernel.
#[derive(Debug, Clone)]
pub struct PhaseKernel<F> {
    plan: RfftPlan<F>,
    unwrap: bool,
}

impl<F: AnalysisFloat> KernelLifecycle for PhaseKernel<F> {
    type Config = PhaseConfig;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let plan = plan_fft(config.fft_length)?;
        tracing::debug!(
            fft_length = config.fft_length,
            unwrap = config.unwrap,
            "phase kernel"
        );
        Ok(Self {
            plan,
            unwrap: config.unwrap,
        })
    }
}

impl<F: AnalysisFloat> LaneKernel<F> for PhaseKernel<F> {
    type Output = F;

    fn fill_value(&self) -> F {
        F::zero()
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
        mut out: ArrayViewMut1<F>,
    ) -> Result<(), ExecInvariantViolation> {
        let mut h = Array1::from_elem(self.plan.num_bins(), Complex::new(F::zero(), F::zero()));
        response_lane(&self.plan, &b, &a, h.view_mut())?;
        out.zip_mut_with(&h, |theta, h| {
            // atan2 yields -pi for a negative zero imaginary part
            let t = h.im.atan2(h.re) / F::PI();
            *theta = if t == -F::one() { F::one() } else { t };
        });
        if self.unwrap {
            unwrap_lane(out, F::one() + F::one());
        }
        Ok(())
    }
}

impl<F: AnalysisFloat> PhaseNd<F> for PhaseKernel<F> {
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<F>, ExecInvariantViolation> {
        batch::run_alloc(self, b, a)
    }

    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, F>,
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
        O: Write1D<F> + ?Sized,
    {
        batch::run_1d_into(self, b, a, out)
    }
}

/// Phase of `B / A` in units of `pi`, in `(-1, 1]` unless `unwrap` is set.
pub fn phase<'a, F, B, A>(
    b: B,
    a: A,
    fft_length: usize,
    unwrap: bool,
) -> Result<ArrayD<F>, ExecInvariantViolation>
where
    F: AnalysisFloat,
    B: Into<Coefficients<'a, F>>,
    A: Into<Coefficients<'a, F>>,
{
    PhaseKernel::try_new(PhaseConfig { fft_length, unwrap })?.run_alloc(b.into(), a.into())
}
