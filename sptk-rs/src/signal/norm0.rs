//! Conversion between all-pole and all-zero filter coefficients.

use crate::kernel::{ConfigError, ExecInvariantViolation};
use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension};
use num_traits::Float;

/// Map `[K, a1, ..., aM]` to `[1/K, a1/K, ..., aM/K]` along the last axis.
///
/// The filter `K / A(z)` with `A(z) = 1 + a1 z^-1 + ...` becomes the FIR taps
/// of `A(z) / K`, and applying the map twice restores the input. A zero gain
/// yields infinite or NaN taps.
///
/// ```
/// use ndarray::array;
/// use sptk_rs::signal::all_pole_to_all_zero;
///
/// let b = all_pole_to_all_zero(&array![4.0, 3.0, 2.0, 1.0]).unwrap();
/// assert_eq!(b.as_slice().unwrap(), &[0.25, 0.75, 0.5, 0.25]);
/// ```
pub fn all_pole_to_all_zero<F, S, D>(
    a: &ArrayBase<S, D>,
) -> Result<ArrayD<F>, ExecInvariantViolation>
where
    F: Float,
    S: Data<Elem = F>,
    D: Dimension,
{
    if a.ndim() == 0 || a.len_of(Axis(a.ndim() - 1)) == 0 {
        return Err(ConfigError::EmptyInput { arg: "a" }.into());
    }
    let mut out = a.as_standard_layout().into_owned().into_dyn();
    let axis = Axis(out.ndim() - 1);
    for mut lane in out.lanes_mut(axis) {
        let inv = lane[0].recip();
        lane[0] = inv;
        lane.iter_mut().skip(1).for_each(|x| *x = *x * inv);
    }
    Ok(out)
}
