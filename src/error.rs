//! Error types for the frame pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrismaError {
    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Tracker unavailable: {0}")]
    TrackerUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ort::Error> for PrismaError {
    fn from(err: ort::Error) -> Self {
        PrismaError::Model(err.to_string())
    }
}

impl From<base64::DecodeError> for PrismaError {
    fn from(err: base64::DecodeError) -> Self {
        PrismaError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PrismaError>;
