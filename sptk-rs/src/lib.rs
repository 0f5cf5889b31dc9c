//! Spectrum, phase and group delay analysis of rational systems
//! `H(z) = B(z) / A(z)`, as used in speech processing toolkits.
//!
//! Each analysis exists as a free function and as a kernel built once from a
//! validated config through [`kernel::KernelLifecycle`]:
//!
//! ```
//! use ndarray::array;
//! use sptk_rs::kernel::KernelLifecycle;
//! use sptk_rs::signal::{SpectrumConfig, SpectrumFormat, SpectrumKernel, SpectrumNd};
//!
//! let kernel = SpectrumKernel::<f64>::try_new(SpectrumConfig {
//!     fft_length: 8,
//!     out_format: SpectrumFormat::Db,
//!     ..Default::default()
//! })
//! .unwrap();
//! let b = array![[1.0, 0.5], [1.0, -0.5]];
//! let db = kernel.run_alloc((&b).into(), None::<&ndarray::Array1<f64>>.into()).unwrap();
//! assert_eq!(db.shape(), &[2, 5]);
//! ```
#![warn(missing_docs)]

pub mod kernel;
pub mod signal;

pub use rustfft::num_complex;
