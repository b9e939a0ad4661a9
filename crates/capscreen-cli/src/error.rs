use thiserror::Error;

use capscreen_core::ConfigError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Batch(#[from] capscreen_core::BatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("strict mode failed: {failure_count} symbol(s) could not be evaluated")]
    StrictModeViolation { failure_count: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("failed to format report timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Batch(_) => 2,
            Self::Config(ConfigError::Read { .. }) => 10,
            Self::Config(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) | Self::Timestamp(_) => 4,
        }
    }
}
