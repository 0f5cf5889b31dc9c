//! Power and amplitude spectra of rational systems.

use super::batch::{self, LaneKernel};
use super::polynomial::{Coefficients, Polynomial, RationalSystem};
use super::response::{plan_fft, power_lane, DEFAULT_FFT_LENGTH};
use super::traits::SpectrumNd;
use super::{cast, AnalysisFloat};
use crate::kernel::{ConfigError, ExecInvariantViolation, KernelLifecycle, Read1D, Write1D};
use core::fmt;
use core::str::FromStr;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewMut1, ArrayViewMutD};
use num_traits::Float;
use sptk_rs_core::num_rs::RfftPlan;

/// Unit of the values written by [`spectrum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SpectrumFormat {
    /// `10 log10 P`.
    Db,
    /// `ln sqrt(P)`.
    LogMagnitude,
    /// `sqrt(P)`.
    Magnitude,
    /// `P`.
    #[default]
    Power,
}

impl SpectrumFormat {
    /// Canonical name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            SpectrumFormat::Db => "db",
            SpectrumFormat::LogMagnitude => "log-magnitude",
            SpectrumFormat::Magnitude => "magnitude",
            SpectrumFormat::Power => "power",
        }
    }

    /// Convert a power value into this unit.
    pub fn convert<F: Float>(self, power: F) -> F {
        match self {
            SpectrumFormat::Db => cast::<F>(10.0) * power.log10(),
            SpectrumFormat::LogMagnitude => cast::<F>(0.5) * power.ln(),
            SpectrumFormat::Magnitude => power.sqrt(),
            SpectrumFormat::Power => power,
        }
    }
}

const UNKNOWN_FORMAT: ConfigError = ConfigError::InvalidArgument {
    arg: "out_format",
    reason: "expected one of db, log-magnitude, magnitude, power (codes 0-3)",
};

impl FromStr for SpectrumFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "db" => Ok(SpectrumFormat::Db),
            "log-magnitude" => Ok(SpectrumFormat::LogMagnitude),
            "magnitude" => Ok(SpectrumFormat::Magnitude),
            "power" => Ok(SpectrumFormat::Power),
            _ => Err(UNKNOWN_FORMAT),
        }
    }
}

/// SPTK output format codes.
impl TryFrom<u8> for SpectrumFormat {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SpectrumFormat::Db),
            1 => Ok(SpectrumFormat::LogMagnitude),
            2 => Ok(SpectrumFormat::Magnitude),
            3 => Ok(SpectrumFormat::Power),
            _ => Err(UNKNOWN_FORMAT),
        }
    }
}

impl fmt::Display for SpectrumFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constructor config for [`SpectrumKernel`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(default, bound(deserialize = "F: serde::Deserialize<'de> + Float"))
)]
pub struct SpectrumConfig<F> {
    /// DFT length `L`, at least 2.
    pub fft_length: usize,
    /// Added to the power before flooring, `>= 0`.
    pub eps: F,
    /// Floor in dB relative to the per-lane maximum, `< 0`.
    pub relative_floor: Option<F>,
    /// Output unit.
    pub out_format: SpectrumFormat,
}

impl<F: Float> Default for SpectrumConfig<F> {
    fn default() -> Self {
        Self {
            fft_length: DEFAULT_FFT_LENGTH,
            eps: F::zero(),
            relative_floor: None,
            out_format: SpectrumFormat::Power,
        }
    }
}

/// Trait-first spectrum kernel.
#[derive(Debug, Clone)]
pub struct SpectrumKernel<F> {
    plan: RfftPlan<F>,
    eps: F,
    floor_ratio: Option<F>,
    out_format: SpectrumFormat,
}

impl<F: AnalysisFloat> SpectrumKernel<F> {
    /// Configured transform length.
    pub fn fft_length(&self) -> usize {
        self.plan.fft_length()
    }

    /// Configured output unit.
    pub fn out_format(&self) -> SpectrumFormat {
        self.out_format
    }
}

impl<F: AnalysisFloat> KernelLifecycle for SpectrumKernel<F> {
    type Config = SpectrumConfig<F>;

    fn try_new(config: Self::Config) -> Result<Self, ConfigError> {
        let plan = plan_fft(config.fft_length)?;
        if !config.eps.is_finite() || config.eps < F::zero() {
            return Err(ConfigError::InvalidArgument {
                arg: "eps",
                reason: "eps must be finite and >= 0",
            });
        }
        let floor_ratio = match config.relative_floor {
            Some(r) if !r.is_finite() || r >= F::zero() => {
                return Err(ConfigError::InvalidArgument {
                    arg: "relative_floor",
                    reason: "relative_floor must be finite and < 0 dB",
                });
            }
            Some(r) => Some(cast::<F>(10.0).powf(r / cast(10.0))),
            None => None,
        };
        tracing::debug!(
            fft_length = config.fft_length,
            out_format = %config.out_format,
            floored = floor_ratio.is_some(),
            "spectrum kernel"
        );
        Ok(Self {
            plan,
            eps: config.eps,
            floor_ratio,
            out_format: config.out_format,
        })
    }
}

impl<F: AnalysisFloat> LaneKernel<F> for SpectrumKernel<F> {
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
        power_lane(&self.plan, &b, out.view_mut())?;
        if !a.is_identity() {
            let mut denom = Array1::zeros(self.plan.num_bins());
            power_lane(&self.plan, &a, denom.view_mut())?;
            out.zip_mut_with(&denom, |p, &d| *p = *p / d);
        }
        let eps = self.eps;
        out.mapv_inplace(|p| p + eps);

        if let Some(ratio) = self.floor_ratio {
            let floor = out.fold(F::neg_infinity(), |m, &p| m.max(p)) * ratio;
            out.mapv_inplace(|p| p.max(floor));
        }
        let format = self.out_format;
        out.mapv_inplace(|p| format.convert(p));
        Ok(())
    }
}

impl<F: AnalysisFloat> SpectrumNd<F> for SpectrumKernel<F> {
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

/// Spectrum `|B(k)|^2 / |A(k)|^2 + eps` on `k = 0..=L/2`.
///
/// With `relative_floor = Some(r)` every bin is raised to at least `r` dB below
/// the lane maximum before conversion to `out_format`.
///
/// ```
/// use ndarray::{array, Array1};
/// use sptk_rs::signal::{spectrum, SpectrumFormat};
///
/// let b = array![1.0, 0.5];
/// let p = spectrum(&b, None::<&Array1<f64>>, 8, 0.0, None, SpectrumFormat::Power).unwrap();
/// assert!((p[0] - 2.25).abs() < 1e-12);
/// assert!((p[4] - 0.25).abs() < 1e-12);
/// ```
pub fn spectrum<'a, F, B, A>(
    b: B,
    a: A,
    fft_length: usize,
    eps: F,
    relative_floor: Option<F>,
    out_format: SpectrumFormat,
) -> Result<ArrayD<F>, ExecInvariantViolation>
where
    F: AnalysisFloat,
    B: Into<Coefficients<'a, F>>,
    A: Into<Coefficients<'a, F>>,
{
    SpectrumKernel::try_new(SpectrumConfig {
        fft_length,
        eps,
        relative_floor,
        out_format,
    })?
    .run_alloc(b.into(), a.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2, Axis, IxDyn};

    const NO_POLY: Option<&Array1<f64>> = None;

    #[test]
    fn first_order_fir_fixture() {
        let b = array![1.0, 0.5];
        let p = spectrum(&b, NO_POLY, 8, 0.0, None, SpectrumFormat::Power).unwrap();
        assert_eq!(p.shape(), &[5]);
        assert_abs_diff_eq!(p[0], 2.25, epsilon = 1e-12);
        assert_abs_diff_eq!(p[2], 1.25, epsilon = 1e-12);
        assert_abs_diff_eq!(p[4], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn unit_system_has_flat_unit_power() {
        let one = array![1.0];
        let p = spectrum(&one, NO_POLY, 16, 0.0, None, SpectrumFormat::Power).unwrap();
        assert!(p.iter().all(|&v| (v - 1.0).abs() < 1e-15));
        let p = spectrum(NO_POLY, &one, 16, 0.0, None, SpectrumFormat::Db).unwrap();
        assert!(p.iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn formats_agree_on_the_same_power() {
        let b = array![1.0, 0.5];
        let at_dc = |format| spectrum(&b, NO_POLY, 8, 0.0, None, format).unwrap()[0];
        assert_abs_diff_eq!(
            at_dc(SpectrumFormat::Db),
            10.0 * 2.25f64.log10(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            at_dc(SpectrumFormat::LogMagnitude),
            1.5f64.ln(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(at_dc(SpectrumFormat::Magnitude), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn all_pole_spectrum_divides_power() {
        let a = array![1.0, -0.9];
        let p = spectrum(NO_POLY, &a, 8, 0.0, None, SpectrumFormat::Power).unwrap();
        assert_abs_diff_eq!(p[0], 1.0 / 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(p[4], 1.0 / 3.61, epsilon = 1e-12);

        let b = array![1.0, 0.5];
        let h = spectrum(&b, &a, 8, 0.0, None, SpectrumFormat::Power).unwrap();
        assert_abs_diff_eq!(h[4], 0.25 / 3.61, epsilon = 1e-12);
    }

    #[test]
    fn eps_is_added_to_the_power() {
        let b = array![1.0, -1.0];
        let p = spectrum(&b, NO_POLY, 8, 1e-3, None, SpectrumFormat::Power).unwrap();
        assert_abs_diff_eq!(p[0], 1e-3, epsilon = 1e-15);
        assert_abs_diff_eq!(p[4], 4.0 + 1e-3, epsilon = 1e-12);
    }

    #[test]
    fn relative_floor_limits_dynamic_range_per_lane() {
        let b = array![[1.0, -0.999], [0.5, 0.0]];
        let p = spectrum(&b, NO_POLY, 64, 0.0, Some(-20.0), SpectrumFormat::Db).unwrap();
        for lane in p.lanes(Axis(1)) {
            let max = lane.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            let min = lane.fold(f64::INFINITY, |m, &v| m.min(v));
            assert!(min >= max - 20.0 - 1e-9);
        }
        assert_abs_diff_eq!(p[[0, 0]], 10.0 * (1.999f64 * 1.999 * 0.01).log10(), epsilon = 1e-9);

        let power = spectrum(&b, NO_POLY, 64, 0.0, Some(-20.0), SpectrumFormat::Power).unwrap();
        let max = power.index_axis(Axis(0), 0).fold(0.0f64, |m, &v| m.max(v));
        assert_abs_diff_eq!(power[[0, 0]], max * 0.01, epsilon = 1e-12);
    }

    #[test]
    fn kernel_rejects_invalid_tuning() {
        let cfg = SpectrumConfig::<f64> {
            eps: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            SpectrumKernel::try_new(cfg),
            Err(ConfigError::InvalidArgument { arg: "eps", .. })
        ));
        for floor in [0.0, 3.0, f64::NAN] {
            let cfg = SpectrumConfig::<f64> {
                relative_floor: Some(floor),
                ..Default::default()
            };
            assert!(matches!(
                SpectrumKernel::try_new(cfg),
                Err(ConfigError::InvalidArgument {
                    arg: "relative_floor",
                    ..
                })
            ));
        }
    }

    #[test]
    fn format_names_and_codes() {
        for (code, name) in ["db", "log-magnitude", "magnitude", "power"].iter().enumerate() {
            let by_name: SpectrumFormat = name.parse().unwrap();
            let by_code = SpectrumFormat::try_from(code as u8).unwrap();
            assert_eq!(by_name, by_code);
            assert_eq!(by_name.to_string(), *name);
        }
        assert_eq!("dB".parse::<SpectrumFormat>(), Err(UNKNOWN_FORMAT));
        assert_eq!(SpectrumFormat::try_from(4u8), Err(UNKNOWN_FORMAT));
        assert_eq!(SpectrumFormat::default(), SpectrumFormat::Power);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: SpectrumConfig<f64> =
            serde_json::from_str(r#"{"fft_length": 256, "out_format": "log-magnitude"}"#)
                .unwrap();
        assert_eq!(cfg.fft_length, 256);
        assert_eq!(cfg.out_format, SpectrumFormat::LogMagnitude);
        assert_eq!(cfg.relative_floor, None);
    }

    #[test]
    fn single_precision_run_into() {
        let kernel = SpectrumKernel::<f32>::try_new(SpectrumConfig {
            fft_length: 8,
            out_format: SpectrumFormat::Magnitude,
            ..Default::default()
        })
        .unwrap();
        let b = Array2::from_shape_vec((2, 2), vec![1.0f32, 0.5, 2.0, 0.0]).unwrap();
        let mut out = ArrayD::<f32>::zeros(IxDyn(&[2, 5]));
        kernel
            .run_into((&b).into(), Polynomial::Identity, out.view_mut())
            .unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 1.5, epsilon = 1e-6);
        assert!(out.index_axis(Axis(0), 1).iter().all(|&v| (v - 2.0).abs() < 1e-6));

        let mut lane = [0.0f32; 5];
        kernel
            .run_1d_into(
                Polynomial::Explicit(&[1.0f32, 0.5]),
                Polynomial::<&[f32]>::Identity,
                &mut lane,
            )
            .unwrap();
        assert_abs_diff_eq!(lane[4], 0.5, epsilon = 1e-6);
    }
}
