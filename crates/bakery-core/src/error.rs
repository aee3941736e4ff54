use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid image name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Docker context not found: {path}: {reason}")]
    MissingContext { path: PathBuf, reason: String },

    #[error("There is no base image specified in {0} (expected a '# BASE <image>' line)")]
    MissingBaseAnnotation(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
