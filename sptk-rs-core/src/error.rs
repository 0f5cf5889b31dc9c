use core::fmt;

/// Errors raised by the numeric primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument passed to a primitive was invalid.
    InvalidArg {
        /// The invalid argument.
        arg: String,
        /// Explaining why the argument is invalid.
        reason: String,
    },
    /// The convolution backend rejected its inputs.
    Conv {
        /// Backend error message.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArg { arg, reason } => write!(f, "Invalid argument `{arg}`: {reason}"),
            Error::Conv { reason } => write!(f, "Convolution failed: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for the numeric primitives.
pub type Result<T> = core::result::Result<T, Error>;
