use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Structural parameters (transform length, tuning constants, output format)
/// are checked once here; the resulting kernel can then be applied to any
/// number of coefficient arrays.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}
