//! Chef ツール関連のエラー型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChefError {
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Resolver config not found: {0}")]
    ConfigNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChefError>;
