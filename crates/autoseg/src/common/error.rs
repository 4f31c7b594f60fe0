use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutosegError {
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Quota error: {0}")]
    QuotaError(String),
    #[error("Submission error: {0}")]
    SubmissionError(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailableError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<toml::de::Error> for AutosegError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}

pub fn validation_error<T>(message: impl Into<String>) -> crate::Result<T> {
    Err(AutosegError::ValidationError(message.into()))
}

pub fn configuration_error<T>(message: impl Into<String>) -> crate::Result<T> {
    Err(AutosegError::ConfigurationError(message.into()))
}
