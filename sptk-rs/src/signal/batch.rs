//! Lane-wise execution over the broadcast batch axes of a rational system.

use super::polynomial::{lane_coefficients, Coefficients, Polynomial, RationalSystem};
use crate::kernel::{ConfigError, ExecInvariantViolation, Read1D, Write1D};
use ndarray::{ArrayD, ArrayView1, ArrayViewMut1, ArrayViewMutD, Axis, IxDyn};

/// Per-lane body of an analysis kernel.
///
/// The batched, caller-buffer and single-lane entrypoints of every kernel are
/// derived from these four items.
pub(crate) trait LaneKernel<F>: Sync {
    type Output: Clone + Send;

    /// Value used to allocate outputs before the lanes overwrite them.
    fn fill_value(&self) -> Self::Output;

    /// Trailing output length.
    fn num_bins(&self) -> usize;

    /// Reject systems that do not fit the configured transform.
    fn check(&self, system: &RationalSystem<'_, F>) -> Result<(), ConfigError>;

    fn run_lane(
        &self,
        b: Polynomial<ArrayView1<F>>,
        a: Polynomial<ArrayView1<F>>,
        out: ArrayViewMut1<Self::Output>,
    ) -> Result<(), ExecInvariantViolation>;
}

pub(crate) fn run_alloc<F, K>(
    kernel: &K,
    b: Coefficients<'_, F>,
    a: Coefficients<'_, F>,
) -> Result<ArrayD<K::Output>, ExecInvariantViolation>
where
    F: Sync,
    K: LaneKernel<F>,
{
    let system = RationalSystem::try_new(b.reborrow(), a.reborrow())?;
    kernel.check(&system)?;
    map_lanes(&system, kernel.num_bins(), kernel.fill_value(), |b, a, out| {
        kernel.run_lane(b, a, out)
    })
}

pub(crate) fn run_into<F, K>(
    kernel: &K,
    b: Coefficients<'_, F>,
    a: Coefficients<'_, F>,
    out: ArrayViewMutD<'_, K::Output>,
) -> Result<(), ExecInvariantViolation>
where
    F: Sync,
    K: LaneKernel<F>,
{
    let system = RationalSystem::try_new(b.reborrow(), a.reborrow())?;
    kernel.check(&system)?;
    if out.shape() != output_shape(system.batch_shape(), kernel.num_bins()).as_slice() {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg: "out",
            reason: "output shape must be the broadcast batch shape plus fft_length / 2 + 1 bins",
        });
    }
    fill_lanes(&system, out, |b, a, out| kernel.run_lane(b, a, out))
}

pub(crate) fn run_1d_into<F, K, B, A, O>(
    kernel: &K,
    b: Polynomial<&B>,
    a: Polynomial<&A>,
    out: &mut O,
) -> Result<(), ExecInvariantViolation>
where
    F: Sync,
    K: LaneKernel<F>,
    B: Read1D<F> + ?Sized,
    A: Read1D<F> + ?Sized,
    O: Write1D<K::Output> + ?Sized,
{
    let system = RationalSystem::try_new(lane_coefficients(b), lane_coefficients(a))?;
    kernel.check(&system)?;
    let out = out.write_view_mut();
    if out.len() != kernel.num_bins() {
        return Err(ExecInvariantViolation::LengthMismatch {
            arg: "out",
            expected: kernel.num_bins(),
            got: out.len(),
        });
    }
    fill_lanes(&system, out.into_dyn(), |b, a, out| kernel.run_lane(b, a, out))
}

/// Shape of an analysis output: `batch + [bins]`.
pub(crate) fn output_shape(batch: &[usize], bins: usize) -> Vec<usize> {
    let mut shape = Vec::with_capacity(batch.len() + 1);
    shape.extend_from_slice(batch);
    shape.push(bins);
    shape
}

/// Allocate `batch + [bins]` and fill it lane by lane.
pub(crate) fn map_lanes<F, T, G>(
    system: &RationalSystem<'_, F>,
    bins: usize,
    fill: T,
    lane_fn: G,
) -> Result<ArrayD<T>, ExecInvariantViolation>
where
    F: Sync,
    T: Clone + Send,
    G: Fn(
            Polynomial<ArrayView1<F>>,
            Polynomial<ArrayView1<F>>,
            ArrayViewMut1<T>,
        ) -> Result<(), ExecInvariantViolation>
        + Sync
        + Send,
{
    let shape = output_shape(system.batch_shape(), bins);
    let mut out = ArrayD::from_elem(IxDyn(&shape), fill);
    fill_lanes(system, out.view_mut(), lane_fn)?;
    Ok(out)
}

/// Fill a caller-provided `batch + [bins]` view lane by lane.
pub(crate) fn fill_lanes<F, T, G>(
    system: &RationalSystem<'_, F>,
    mut out: ArrayViewMutD<T>,
    lane_fn: G,
) -> Result<(), ExecInvariantViolation>
where
    F: Sync,
    T: Send,
    G: Fn(
            Polynomial<ArrayView1<F>>,
            Polynomial<ArrayView1<F>>,
            ArrayViewMut1<T>,
        ) -> Result<(), ExecInvariantViolation>
        + Sync
        + Send,
{
    let batch = system.batch_shape();
    if out.ndim() != batch.len() + 1 || &out.shape()[..batch.len()] != batch {
        return Err(ExecInvariantViolation::ShapeMismatch {
            arg: "out",
            reason: "output batch axes do not match the broadcast batch of b and a",
        });
    }
    let num_lanes = batch.iter().product::<usize>();
    let axis = Axis(batch.len());
    tracing::trace!(?batch, num_lanes, bins = out.len_of(axis), "running lanes");

    let numer = broadcast(system.numerator(), batch, "b")?;
    let denom = broadcast(system.denominator(), batch, "a")?;
    let jobs = out
        .lanes_mut(axis)
        .into_iter()
        .zip(lanes(&numer, axis, num_lanes))
        .zip(lanes(&denom, axis, num_lanes));

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        jobs.collect::<Vec<_>>()
            .into_par_iter()
            .try_for_each(|((out, b), a)| lane_fn(b, a, out))
    }
    #[cfg(not(feature = "rayon"))]
    {
        jobs.into_iter()
            .try_for_each(|((out, b), a)| lane_fn(b, a, out))
    }
}

fn broadcast<'s, F>(
    p: &'s Coefficients<'_, F>,
    batch: &[usize],
    arg: &'static str,
) -> Result<Coefficients<'s, F>, ExecInvariantViolation> {
    match p {
        Polynomial::Identity => Ok(Polynomial::Identity),
        Polynomial::Explicit(taps) => {
            let shape = output_shape(batch, taps.shape()[taps.ndim() - 1]);
            taps.broadcast(IxDyn(&shape))
                .map(Polynomial::Explicit)
                .ok_or(ExecInvariantViolation::ShapeMismatch {
                    arg,
                    reason: "coefficients cannot be broadcast to the batch shape",
                })
        }
    }
}

fn lanes<'s, F>(
    p: &'s Coefficients<'_, F>,
    axis: Axis,
    num_lanes: usize,
) -> Vec<Polynomial<ArrayView1<'s, F>>> {
    match p {
        Polynomial::Identity => (0..num_lanes).map(|_| Polynomial::Identity).collect(),
        Polynomial::Explicit(taps) => taps.lanes(axis).into_iter().map(Polynomial::Explicit).collect(),
    }
}
