//! Shared kernel substrate.
//!
//! Constructor validation, error types and the 1D adapters used by the
//! single-lane entrypoints of the analysis kernels.

mod errors;
mod io;
mod lifecycle;

pub use errors::*;
pub use io::*;
pub use lifecycle::*;
