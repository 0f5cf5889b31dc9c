//! Trait interfaces for the analysis capabilities.
//!
//! Every kernel offers three entrypoints: a batched allocating call, a batched
//! call into a caller-provided view of shape `batch + [fft_length / 2 + 1]`,
//! and a single-lane call through the [`Read1D`]/[`Write1D`] adapters.

use super::polynomial::{Coefficients, Polynomial};
use crate::kernel::{ExecInvariantViolation, Read1D, Write1D};
use ndarray::{ArrayD, ArrayViewMutD};
use rustfft::num_complex::Complex;

/// Complex frequency response capability.
pub trait FrequencyResponseNd<F> {
    /// Evaluate `B / A` on the one-sided grid and allocate the output.
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<Complex<F>>, ExecInvariantViolation>;

    /// Evaluate `B / A` into a caller-provided output view.
    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, Complex<F>>,
    ) -> Result<(), ExecInvariantViolation>;

    /// Evaluate a single coefficient set.
    fn run_1d_into<B, A, O>(
        &self,
        b: Polynomial<&B>,
        a: Polynomial<&A>,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        B: Read1D<F> + ?Sized,
        A: Read1D<F> + ?Sized,
        O: Write1D<Complex<F>> + ?Sized;
}

/// Power/amplitude spectrum capability.
pub trait SpectrumNd<F> {
    /// Compute the spectrum and allocate the output.
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<F>, ExecInvariantViolation>;

    /// Compute the spectrum into a caller-provided output view.
    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, F>,
    ) -> Result<(), ExecInvariantViolation>;

    /// Compute the spectrum of a single coefficient set.
    fn run_1d_into<B, A, O>(
        &self,
        b: Polynomial<&B>,
        a: Polynomial<&A>,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        B: Read1D<F> + ?Sized,
        A: Read1D<F> + ?Sized,
        O: Write1D<F> + ?Sized;
}

/// Phase response capability.
pub trait PhaseNd<F> {
    /// Compute the phase in units of `pi` and allocate the output.
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<F>, ExecInvariantViolation>;

    /// Compute the phase into a caller-provided output view.
    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, F>,
    ) -> Result<(), ExecInvariantViolation>;

    /// Compute the phase of a single coefficient set.
    fn run_1d_into<B, A, O>(
        &self,
        b: Polynomial<&B>,
        a: Polynomial<&A>,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        B: Read1D<F> + ?Sized,
        A: Read1D<F> + ?Sized,
        O: Write1D<F> + ?Sized;
}

/// Group delay capability.
pub trait GroupDelayNd<F> {
    /// Compute the group delay in samples and allocate the output.
    fn run_alloc(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
    ) -> Result<ArrayD<F>, ExecInvariantViolation>;

    /// Compute the group delay into a caller-provided output view.
    fn run_into(
        &self,
        b: Coefficients<'_, F>,
        a: Coefficients<'_, F>,
        out: ArrayViewMutD<'_, F>,
    ) -> Result<(), ExecInvariantViolation>;

    /// Compute the group delay of a single coefficient set.
    fn run_1d_into<B, A, O>(
        &self,
        b: Polynomial<&B>,
        a: Polynomial<&A>,
        out: &mut O,
    ) -> Result<(), ExecInvariantViolation>
    where
        B: Read1D<F> + ?Sized,
        A: Read1D<F> + ?Sized,
        O: Write1D<F> + ?Sized;
}
