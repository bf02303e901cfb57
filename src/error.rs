// Error types for the soundboard crate
use thiserror::Error;

/// Main error type for soundboard operations
#[derive(Error, Debug)]
pub enum Error {
    /// Output device could not be found or opened
    #[error("Audio device error: {0}")]
    Device(String),

    /// File missing, corrupt, or codec unsupported
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Output stream could not be built or started
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Settings could not be loaded or saved
    #[error("Settings error: {0}")]
    Settings(String),

    /// Sound catalogue errors
    #[error("Catalogue error: {0}")]
    Catalogue(String),

    /// Hotkey could not be parsed
    #[error("Invalid hotkey: {0}")]
    Hotkey(String),

    /// Microphone mute could not be applied
    #[error("Microphone error: {0}")]
    Microphone(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type using the soundboard Error
pub type Result<T> = std::result::Result<T, Error>;
