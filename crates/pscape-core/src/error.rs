use crate::id::{AnimalId, HerdId, HerdsmanId, HouseholdId};

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by population bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The animal handle has no slot in the arena.
    #[error("animal not found: {0}")]
    AnimalNotFound(AnimalId),

    /// The herd handle has no slot in the arena.
    #[error("herd not found: {0}")]
    HerdNotFound(HerdId),

    /// The herdsman handle has no slot in the arena.
    #[error("herdsman not found: {0}")]
    HerdsmanNotFound(HerdsmanId),

    /// The household handle has no slot in the arena.
    #[error("household not found: {0}")]
    HouseholdNotFound(HouseholdId),
}

/// Errors that can occur when loading or validating run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the parameter file from disk.
    #[error("failed to read parameter file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse parameter YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid parameter {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending parameter.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl ConfigError {
    /// A [`ConfigError::Invalid`] for `field`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
