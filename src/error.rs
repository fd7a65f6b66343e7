//! Error Types

use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("No WAV files found at: {}", path.display())]
    NoInput { path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG error: {0}")]
    Png(#[from] png::EncodingError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PrepError {
    pub fn audio<S: Into<String>>(msg: S) -> Self { Self::Audio { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn processing<S: Into<String>>(msg: S) -> Self { Self::Processing { message: msg.into() } }
    pub fn output<S: Into<String>>(msg: S) -> Self { Self::Output { message: msg.into() } }
    pub fn no_input<P: Into<std::path::PathBuf>>(path: P) -> Self { Self::NoInput { path: path.into() } }
}

pub type Result<T> = std::result::Result<T, PrepError>;
