use thiserror::Error;

/// Errors surfaced by the configuration loader and the stress harness.
///
/// The singleton holders themselves are generic over the caller's error type
/// (see [`crate::singleton::LazySlot::get_or_try_init`]) and never produce
/// this enum.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error(
        "{variant} singleton broke its guarantee: {constructions} constructions, {identities} distinct instances observed"
    )]
    InvariantViolated {
        variant: String,
        constructions: usize,
        identities: usize,
    },

    #[error("a {variant} stress worker panicked")]
    WorkerPanicked { variant: String },
}

impl PatternError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatternError>;
