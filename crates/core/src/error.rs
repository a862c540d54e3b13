/// Result alias that carries the custom [`FilletError`] type.
pub type Result<T> = std::result::Result<T, FilletError>;

/// Common error type for the core crate.
///
/// Only loading and generation paths can fail. Judgment itself is total and
/// never produces one of these.
#[derive(Debug, thiserror::Error)]
pub enum FilletError {
    /// Free-form failure surfaced to the user as-is.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Beatmap, input script or config file was not valid JSON for its schema.
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    /// A beatmap parsed but one of its notes breaks the data model.
    #[error("invalid beatmap note #{index}: {reason}")]
    InvalidBeatmap { index: usize, reason: String },
    /// Caller supplied arguments the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// WAV decoding failure.
    #[error("audio decode failed: {0}")]
    Audio(#[from] hound::Error),
    /// FFT planning or processing failure.
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl FilletError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_note(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidBeatmap {
            index,
            reason: reason.into(),
        }
    }
}

impl From<&str> for FilletError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for FilletError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
