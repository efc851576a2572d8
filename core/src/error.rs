use thiserror::Error;

#[derive(Debug, Error)]
pub enum SstvError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Could not find VIS header")]
    NoVisFound,

    #[error("Could not find sync pulse. Make sure this is a valid SSTV transmission.")]
    NoSyncFound,

    #[error("Audio ended before the full frame was decoded")]
    TimingOverflow,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, SstvError>;
