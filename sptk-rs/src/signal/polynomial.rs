//! Numerator/denominator model of a rational system `H(z) = B(z) / A(z)`.

use crate::kernel::{ConfigError, ExecInvariantViolation, Read1D};
use itertools::{EitherOrBoth, Itertools};
use ndarray::{ArrayBase, ArrayView1, ArrayViewD, Data, Dimension};

/// One side of a rational system.
///
/// Taps are ordered by ascending delay along the trailing axis, so
/// `Explicit([1, a1, a2])` is `1 + a1 z^-1 + a2 z^-2`.
#[derive(Debug, Clone, PartialEq)]
pub enum Polynomial<C> {
    /// The constant polynomial `[1]`.
    Identity,
    /// Explicit taps.
    Explicit(C),
}

/// Batched coefficients of shape `(..., K)`.
pub type Coefficients<'a, F> = Polynomial<ArrayViewD<'a, F>>;

impl<C> Polynomial<C> {
    /// True for [`Polynomial::Identity`].
    pub fn is_identity(&self) -> bool {
        matches!(self, Polynomial::Identity)
    }

    /// Borrow the explicit taps, if any.
    pub fn as_ref(&self) -> Polynomial<&C> {
        match self {
            Polynomial::Identity => Polynomial::Identity,
            Polynomial::Explicit(c) => Polynomial::Explicit(c),
        }
    }

    /// Transform the explicit taps, keeping `Identity` as is.
    pub fn map<U, G>(self, f: G) -> Polynomial<U>
    where
        G: FnOnce(C) -> U,
    {
        match self {
            Polynomial::Identity => Polynomial::Identity,
            Polynomial::Explicit(c) => Polynomial::Explicit(f(c)),
        }
    }
}

impl<'a, F, S, D> From<&'a ArrayBase<S, D>> for Coefficients<'a, F>
where
    S: Data<Elem = F>,
    D: Dimension,
{
    fn from(taps: &'a ArrayBase<S, D>) -> Self {
        Polynomial::Explicit(taps.view().into_dyn())
    }
}

impl<'a, F, S, D> From<Option<&'a ArrayBase<S, D>>> for Coefficients<'a, F>
where
    S: Data<Elem = F>,
    D: Dimension,
{
    fn from(taps: Option<&'a ArrayBase<S, D>>) -> Self {
        match taps {
            Some(taps) => taps.into(),
            None => Polynomial::Identity,
        }
    }
}

impl<'a, F> Polynomial<ArrayView1<'a, F>> {
    /// Number of taps; `Identity` has one.
    pub fn taps(&self) -> usize {
        match self {
            Polynomial::Identity => 1,
            Polynomial::Explicit(c) => c.len(),
        }
    }
}

impl<F> Coefficients<'_, F> {
    /// View the taps for the lifetime of `&self`.
    pub(crate) fn reborrow(&self) -> Coefficients<'_, F> {
        self.as_ref().map(|c| c.view())
    }
}

/// Bind a single lane from any [`Read1D`] input.
pub(crate) fn lane_coefficients<'a, F, I>(taps: Polynomial<&'a I>) -> Coefficients<'a, F>
where
    I: Read1D<F> + ?Sized,
{
    taps.map(|t| t.read_view().into_dyn())
}

/// Validated pair of numerator and denominator coefficients.
#[derive(Debug, Clone)]
pub struct RationalSystem<'a, F> {
    numerator: Coefficients<'a, F>,
    denominator: Coefficients<'a, F>,
    batch_shape: Vec<usize>,
}

impl<'a, F> RationalSystem<'a, F> {
    /// Pair `b` and `a`.
    ///
    /// Fails if both sides are `Identity`, if an explicit side has no taps, or
    /// if the batch prefixes of `b` and `a` do not broadcast.
    pub fn try_new(
        numerator: Coefficients<'a, F>,
        denominator: Coefficients<'a, F>,
    ) -> Result<Self, ExecInvariantViolation> {
        if numerator.is_identity() && denominator.is_identity() {
            return Err(ConfigError::MissingPolynomial.into());
        }
        check_taps(&numerator, "b")?;
        check_taps(&denominator, "a")?;
        let batch_shape = broadcast_shapes(batch_prefix(&numerator), batch_prefix(&denominator))
            .ok_or(ExecInvariantViolation::ShapeMismatch {
                arg: "a",
                reason: "batch axes of b and a cannot be broadcast together",
            })?;
        Ok(Self {
            numerator,
            denominator,
            batch_shape,
        })
    }

    /// Numerator `b`.
    pub fn numerator(&self) -> &Coefficients<'a, F> {
        &self.numerator
    }

    /// Denominator `a`.
    pub fn denominator(&self) -> &Coefficients<'a, F> {
        &self.denominator
    }

    /// Broadcast batch shape shared by both sides.
    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// Number of numerator taps, `Identity` counting as one.
    pub fn numerator_taps(&self) -> usize {
        taps_of(&self.numerator)
    }

    /// Number of denominator taps, `Identity` counting as one.
    pub fn denominator_taps(&self) -> usize {
        taps_of(&self.denominator)
    }

    /// Ensure both sides fit an `fft_length`-point transform.
    pub fn check_fft_length(&self, fft_length: usize) -> Result<(), ConfigError> {
        for (arg, taps) in [
            ("b", self.numerator_taps()),
            ("a", self.denominator_taps()),
        ] {
            if taps > fft_length {
                return Err(ConfigError::InsufficientLength {
                    arg,
                    required: taps,
                    got: fft_length,
                });
            }
        }
        Ok(())
    }
}

fn taps_of<F>(p: &Coefficients<'_, F>) -> usize {
    match p {
        Polynomial::Identity => 1,
        Polynomial::Explicit(c) => c.shape().last().copied().unwrap_or(0),
    }
}

fn check_taps<F>(p: &Coefficients<'_, F>, arg: &'static str) -> Result<(), ConfigError> {
    match p {
        Polynomial::Explicit(c) if c.ndim() == 0 || c.shape()[c.ndim() - 1] == 0 => {
            Err(ConfigError::EmptyInput { arg })
        }
        _ => Ok(()),
    }
}

fn batch_prefix<'s, F>(p: &'s Coefficients<'_, F>) -> &'s [usize] {
    match p {
        Polynomial::Identity => &[],
        Polynomial::Explicit(c) => &c.shape()[..c.ndim() - 1],
    }
}

/// numpy broadcasting of two shapes, aligned on the trailing axis.
pub(crate) fn broadcast_shapes(x: &[usize], y: &[usize]) -> Option<Vec<usize>> {
    let mut shape = x
        .iter()
        .rev()
        .zip_longest(y.iter().rev())
        .map(|dims| match dims {
            EitherOrBoth::Both(&p, &q) if p == q => Some(p),
            EitherOrBoth::Both(&1, &q) => Some(q),
            EitherOrBoth::Both(&p, &1) => Some(p),
            EitherOrBoth::Both(..) => None,
            EitherOrBoth::Left(&p) | EitherOrBoth::Right(&p) => Some(p),
        })
        .collect::<Option<Vec<_>>>()?;
    shape.reverse();
    Some(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2, Array3};

    #[test]
    fn broadcast_follows_numpy_rules() {
        assert_eq!(broadcast_shapes(&[], &[]), Some(vec![]));
        assert_eq!(broadcast_shapes(&[4, 3], &[]), Some(vec![4, 3]));
        assert_eq!(broadcast_shapes(&[4, 1], &[3]), Some(vec![4, 3]));
        assert_eq!(broadcast_shapes(&[1], &[2, 5]), Some(vec![2, 5]));
        assert_eq!(broadcast_shapes(&[0], &[1]), Some(vec![0]));
        assert_eq!(broadcast_shapes(&[2], &[3]), None);
    }

    #[test]
    fn identity_contributes_no_batch_axes() {
        let b = Array3::<f64>::zeros((2, 3, 4));
        let system = RationalSystem::try_new((&b).into(), Polynomial::Identity).unwrap();
        assert_eq!(system.batch_shape(), &[2, 3]);
        assert_eq!(system.numerator_taps(), 4);
        assert_eq!(system.denominator_taps(), 1);
    }

    #[test]
    fn batched_sides_broadcast() {
        let b = Array2::<f64>::ones((5, 2));
        let a = Array3::<f64>::ones((3, 1, 7));
        let system = RationalSystem::try_new((&b).into(), (&a).into()).unwrap();
        assert_eq!(system.batch_shape(), &[3, 5]);
    }

    #[test]
    fn rejects_missing_empty_and_mismatched_inputs() {
        let err = RationalSystem::<f64>::try_new(Polynomial::Identity, Polynomial::Identity)
            .unwrap_err();
        assert_eq!(
            err,
            ExecInvariantViolation::from(ConfigError::MissingPolynomial)
        );

        let empty = Array2::<f64>::zeros((2, 0));
        let err = RationalSystem::try_new(Polynomial::Identity, (&empty).into()).unwrap_err();
        assert_eq!(
            err,
            ExecInvariantViolation::from(ConfigError::EmptyInput { arg: "a" })
        );

        let b = Array2::<f64>::ones((2, 3));
        let a = Array2::<f64>::ones((4, 3));
        let err = RationalSystem::try_new((&b).into(), (&a).into()).unwrap_err();
        assert!(matches!(
            err,
            ExecInvariantViolation::ShapeMismatch { arg: "a", .. }
        ));
    }

    #[test]
    fn fft_length_must_hold_every_side() {
        let b = array![1.0, 0.5, 0.25];
        let a = array![1.0, -0.9];
        let system = RationalSystem::try_new((&b).into(), (&a).into()).unwrap();
        assert!(system.check_fft_length(3).is_ok());
        assert_eq!(
            system.check_fft_length(2),
            Err(ConfigError::InsufficientLength {
                arg: "b",
                required: 3,
                got: 2,
            })
        );
    }

    #[test]
    fn optional_arrays_convert_to_tagged_variant() {
        let b = array![1.0f32, 2.0];
        let none: Option<&ndarray::Array1<f32>> = None;
        assert!(Coefficients::from(none).is_identity());
        let explicit = Coefficients::from(Some(&b));
        assert!(matches!(explicit, Polynomial::Explicit(ref v) if v.shape() == [2]));
    }

    #[test]
    fn lane_binding_reads_slices() {
        let taps = [1.0f64, -0.5];
        let lane = lane_coefficients(Polynomial::Explicit(&taps[..]));
        assert!(matches!(lane, Polynomial::Explicit(ref v) if v.len() == 2));
        let view = array![1.0, 2.0, 3.0];
        assert_eq!(Polynomial::Explicit(view.view()).taps(), 3);
        assert_eq!(Polynomial::<ArrayView1<f64>>::Identity.taps(), 1);
    }
}
