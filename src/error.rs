use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("invalid tracker configuration: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("failed to parse tracker configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("unknown tracker type `{0}`")]
    UnknownTracker(String),
    #[error("malformed detection: {0}")]
    InvalidDetection(String),
}

impl TrackerError {
    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
