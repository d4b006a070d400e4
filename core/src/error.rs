use thiserror::Error;

#[derive(Debug, Error)]
pub enum RttyError {
    #[error("No text to transmit")]
    EmptyInput,

    #[error("Character '{0}' is not supported")]
    UnsupportedCharacter(char),

    #[error("Audio output unavailable: {0}")]
    DeviceAcquisitionFailure(String),

    #[error("File write failed: {0}")]
    PersistenceFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<std::io::Error> for RttyError {
    fn from(err: std::io::Error) -> Self {
        RttyError::PersistenceFailure(err.to_string())
    }
}

impl From<hound::Error> for RttyError {
    fn from(err: hound::Error) -> Self {
        RttyError::PersistenceFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RttyError>;
