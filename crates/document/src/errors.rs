//! Document rendering error types

use gutachten_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Content encoding failed: {0}")]
    Encode(String),

    #[error("PDF serialization failed: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for RenderError {
    fn from(e: lopdf::Error) -> Self {
        RenderError::Serialize(e.to_string())
    }
}

impl From<RenderError> for AppError {
    fn from(e: RenderError) -> Self {
        AppError::Render {
            message: e.to_string(),
        }
    }
}

/// Reasons a signature image could not be used
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Not a base64 data URI")]
    NotBase64,

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unreadable image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image has no pixels")]
    Empty,
}
