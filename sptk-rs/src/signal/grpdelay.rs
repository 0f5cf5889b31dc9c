//! Group delay and modified group delay of rational systems.
//!
//! Numerator and denominator are merged into one polynomial `c` so that no
//! phase unwrapping is needed. With `N + 1` denominator taps, `c = b * rev(a)`
//! and the reversal adds a linear phase of `N` samples, removed at the end:
//!
//! ```text
//! tau[k] = Re(C'[k] conj(C[k])) / max(|C[k]|^(2 gamma), eps) - M
//! C = DFT(c[n]), C' = DFT(n c[n]), M = N if a is given else 0
//! ```
//!
//! followed by `sign(tau) |tau|^alpha` when `alpha != 1`.

use super::batch::{self, LaneKernel};
use super::polynomial::{Coefficients, Polynomial, RationalSystem};
use super::response::{core_error, plan_fft, DEFAULT_FFT_LENGTH};
use super::traits::GroupDelayNd;
use super::{cast, AnalysisFloat};
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewMut1, ArrayViewMutD, Zip};
use num_traits::Float;
use sptk_rs_core::num_rs::{convolve, ConvolveMode, RfftPlan};

/// Constructor config for [`GroupDelayKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(default, bound(deserialize = "F: serde::Deserialize<'de> + Float"))
)]
pub struct GroupDelayConfig<F> {
    /// DFT length `L`; must hold the merged polynomial.
    pub fft_length: usize,
    /// Exponent applied to the delay magnitude, `> 0`.
    pub alpha: F,
    /// Exponent applied to the power in the denominator, `> 0`.
    pub gamma: F,
    /// Lower bound of the denominator power, `> 0`.
    pub eps: F,
}

impl<F: Float> Default for GroupDelayConfig<F> {
    fn default() -> Self {
        Self {
            fft_length: DEFAULT_FFT_LENGTH,
            alpha: F::one(),
            gamma: F::one(),
            eps: F::min_positive_value(),
        }
    }
}

/// Trait-first group delay kernel.
#[derive(Debug, Clone)]
pub struct GroupDelayKernel<F> {
    plan: RfftPlan<F>,
    alpha: F,
    gamma: F,
    eps: F,
}

impl<F: AnalysisFloat> GroupDelayKernel<F> {
    /// Configured transform length.
    pub fn fft_length(&self) -> usize {
        self.plan.fft_length()
    }

    fn merge(
        &self,
        b: Polynomial<ArrayView1<F>>,
        a: Polynomial<ArrayView1<F>>,
    ) -> Result<(Array1<F>, F), ExecInvariantViolation> {
        match (b, a) {
            (Polynomial::Explicit(b), Polynomial::Identity) => Ok((b.to_owned(), F::zero())),
            (b, Polynomial::Explicit(a)) => {
                let order = cast::<F>((a.len() - 1) as f64);
                let reversed: Array1<F> = a.iter().rev().copied().collect();
                let merged = match b {
                    Polynomial::Identity => reversed,
                    Polynomial::Explicit(b) => {
                        convolve(b, reversed.view(), ConvolveMode::Full).map_err(core_error)?
                    }
                };
                Ok((merged, order))
            }
            (Polynomial::Identity, Polynomial::Identity) => {
                Err(ExecInvariantViolation::InvalidState {
                    reason: "lane has neither numerator nor denominator",
                })
            }
        }
    }
}

impl<F: AnalysisFloat> KernelLifecycle for GroupDelayKernel<F> {
    type Config = GroupDelayConfig<F>;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let plan = plan_fft(config.fft_length)?;
        let positive = |x: F| x.is_finite() && x > F::zero();
        if !positive(config.alpha) {
            return Err(ConfigError::InvalidArgument {
                arg: "alpha",
                reason: "alpha must be finite and > 0",
            });
        }
        if !positive(config.gamma) {
            return Err(ConfigError::InvalidArgument {
                arg: "gamma",
                reason: "gamma must be finite and > 0",
            });
        }
        if !positive(config.eps) {
            return Err(ConfigError::InvalidArgument {
                arg: "eps",
                reason: "eps must be finite and > 0",
            });
        }
        tracing::debug!(
            fft_length = config.fft_length,
            alpha = ?config.alpha,
            gamma = ?config.gamma,
            "group delay kernel"
        );
        Ok(Self {
            plan,
            alpha: config.alpha,
            gamma: config.gamma,
            eps: config.eps,
        })
    }
}

impl<F: AnalysisFloat> LaneKernel<F> for GroupDelayKernel<F> {
    type Output = F;

    fn fill_value(&self) -> F {
        F::zero()
    }

    fn num_bins(&self) -> usize {
        self.plan.num_bins()
    }

    fn check(&self, system: &RationalSystem<'_, F>) -> Result<(), ConfigError> {
        system.check_fft_length(self.plan.fft_length())?;
        let merged = system.numerator_taps() + system.denominator_taps() - 1;
        if merged > self.plan.fft_length() {
            return Err(ConfigError::InsufficientLength {
                arg: "b, a",
                required: merged,
                got: self.plan.fft_length(),
            });
        }
        Ok(())
    }

    fn run_lane(
        &self,
        b: Polynomial<ArrayView1<F>>,
        a: Polynomial<ArrayView1<F>>,
        mut out: ArrayViewMut1<F>,
    ) -> Result<(), ExecInvariantViolation> {
        let (c, order) = self.merge(b, a)?;
        let weighted: Array1<F> = c
            .iter()
            .enumerate()
            .map(|(n, &x)| cast::<F>(n as f64) * x)
            .collect();
        let spec = self.plan.process(c.view()).map_err(core_error)?;
        let dspec = self.plan.process(weighted.view()).map_err(core_error)?;

        let (gamma, eps) = (self.gamma, self.eps);
        Zip::from(&mut out)
            .and(&spec)
            .and(&dspec)
            .for_each(|tau, c, dc| {
                let power = c.norm_sqr();
                let power = if gamma == F::one() {
                    power
                } else {
                    power.powf(gamma)
                };
                *tau = (dc.re * c.re + dc.im * c.im) / power.max(eps) - order;
            });

        if self.alpha != F::one() {
            let alpha = self.alpha;
            out.mapv_inplace(|tau| tau.signum() * tau.abs().powf(alpha));
        }
        Ok(())
    }
}

impl<F: AnalysisFloat> GroupDelayNd<F> for GroupDelayKernel<F> {
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

/// Group delay of `B / A` in samples (`alpha = gamma = 1`), or the modified
/// group delay otherwise. The power guard defaults to `F::min_positive_value()`.
///
/// ```
/// use ndarray::{array, Array1};
/// use sptk_rs::signal::group_delay;
///
/// let delay = array![0.0, 0.0, 1.0];
/// let tau = group_delay(&delay, None::<&Array1<f64>>, 8, 1.0, 1.0).unwrap();
/// assert!(tau.iter().all(|&t| (t - 2.0).abs() < 1e-12));
/// ```
pub fn group_delay<'a, F, B, A>(
    b: B,
    a: A,
    fft_length: usize,
    alpha: F,
    gamma: F,
) -> Result<ArrayD<F>, ExecInvariantViolation>
where
    F: AnalysisFloat,
    B: Into<Coefficients<'a, F>>,
    A: Into<Coefficients<'a, F>>,
{
    GroupDelayKernel::try_new(GroupDelayConfig {
        fft_length,
        alpha,
        gamma,
        ..Default::default()
    })?
    .run_alloc(b.into(), a.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::phase;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Axis, IxDyn};

    const NO_POLY: Option<&Array1<f64>> = None;

    #[test]
    fn first_order_fir_closed_form() {
        let b = array![1.0, 0.5];
        let tau = group_delay(&b, NO_POLY, 8, 1.0, 1.0).unwrap();
        assert_eq!(tau.shape(), &[5]);
        for (k, &t) in tau.iter().enumerate() {
            let w = core::f64::consts::PI * k as f64 / 4.0;
            let want = (0.5 * w.cos() + 0.25) / (1.25 + w.cos());
            assert_abs_diff_eq!(t, want, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(tau[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(tau[4], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pure_delay_and_tuning_exponents() {
        let delay = array![0.0, 0.0, 1.0];
        let tau = group_delay(&delay, NO_POLY, 16, 0.5, 1.0).unwrap();
        assert!(tau.iter().all(|&t| (t - 2.0f64.sqrt()).abs() < 1e-12));

        let scaled = array![0.0, 0.0, 2.0];
        let tau = group_delay(&scaled, NO_POLY, 16, 1.0, 0.5).unwrap();
        assert!(tau.iter().all(|&t| (t - 4.0).abs() < 1e-12));
    }

    #[test]
    fn denominator_delay_is_subtracted() {
        let a = array![1.0, -0.9];
        let tau = group_delay(NO_POLY, &a, 8, 1.0, 1.0).unwrap();
        assert_abs_diff_eq!(tau[0], 9.0, epsilon = 1e-9);
        assert_abs_diff_eq!(tau[4], -0.9 / 1.9, epsilon = 1e-12);

        let b = array![0.4, -0.3, 0.2, 0.1];
        let both = group_delay(&b, &a, 32, 1.0, 1.0).unwrap();
        let zeros = group_delay(&b, NO_POLY, 32, 1.0, 1.0).unwrap();
        let poles = group_delay(NO_POLY, &a, 32, 1.0, 1.0).unwrap();
        assert_abs_diff_eq!(both[0], 10.0, epsilon = 1e-9);
        for ((&h, &z), &p) in both.iter().zip(zeros.iter()).zip(poles.iter()) {
            assert_abs_diff_eq!(h, z + p, epsilon = 1e-9);
        }
    }

    #[test]
    fn matches_negative_phase_derivative() {
        let fft_length = 512;
        let b = array![1.0, 0.3];
        let a = array![1.0, -0.5];
        let tau = group_delay(&b, &a, fft_length, 1.0, 1.0).unwrap();
        let theta = phase(&b, &a, fft_length, true).unwrap();
        let dw = core::f64::consts::TAU / fft_length as f64;
        for k in 1..fft_length / 2 {
            let slope = (theta[k + 1] - theta[k - 1]) * core::f64::consts::PI / (2.0 * dw);
            assert_abs_diff_eq!(tau[k], -slope, epsilon = 1e-2);
        }
    }

    #[test]
    fn zero_power_bins_stay_finite() {
        let b = array![1.0, 1.0];
        let tau = group_delay(&b, NO_POLY, 2, 1.0, 1.0).unwrap();
        assert!(tau.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn merged_polynomial_must_fit_the_transform() {
        let b = Array1::<f64>::ones(5);
        let a = Array1::<f64>::ones(4);
        assert!(group_delay(&b, &a, 8, 1.0, 1.0).is_ok());
        let err = group_delay(&b, &a, 7, 1.0, 1.0).unwrap_err();
        assert_eq!(
            err,
            ExecInvariantViolation::from(ConfigError::InsufficientLength {
                arg: "b, a",
                required: 8,
                got: 7,
            })
        );
    }

    #[test]
    fn kernel_rejects_invalid_tuning() {
        for (cfg, arg) in [
            (
                GroupDelayConfig::<f64> {
                    alpha: 0.0,
                    ..Default::default()
                },
                "alpha",
            ),
            (
                GroupDelayConfig {
                    gamma: f64::INFINITY,
                    ..Default::default()
                },
                "gamma",
            ),
            (
                GroupDelayConfig {
                    eps: 0.0,
                    ..Default::default()
                },
                "eps",
            ),
        ] {
            match GroupDelayKernel::try_new(cfg) {
                Err(ConfigError::InvalidArgument { arg: got, .. }) => assert_eq!(got, arg),
                other => panic!("expected {arg} rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn batched_lanes_match_single_lane_calls() {
        let kernel = GroupDelayKernel::<f64>::try_new(GroupDelayConfig {
            fft_length: 16,
            alpha: 0.4,
            gamma: 0.9,
            ..Default::default()
        })
        .unwrap();
        let b = Array2::from_shape_vec((2, 3), vec![0.5, -1.2, 0.3, 1.1, 0.2, -0.7]).unwrap();
        let a = Array2::from_shape_vec((2, 2), vec![1.0, 0.3, 1.0, -0.6]).unwrap();

        let mut out = ArrayD::zeros(IxDyn(&[2, 9]));
        kernel
            .run_into((&b).into(), (&a).into(), out.view_mut())
            .unwrap();
        for (row, expected) in out.axis_iter(Axis(0)).enumerate() {
            let mut lane = vec![0.0; 9];
            kernel
                .run_1d_into(
                    Polynomial::Explicit(&b.row(row)),
                    Polynomial::Explicit(&a.row(row)),
                    &mut lane,
                )
                .unwrap();
            for (x, y) in lane.iter().zip(expected.iter()) {
                assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
            }
        }
    }
}
