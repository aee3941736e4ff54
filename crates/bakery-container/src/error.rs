use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Could not connect to the Docker API: {0}\n\nHint:\n  • Make sure the Docker daemon is running\n  • Check that `docker ps` works from this shell"
    )]
    DockerConnectionFailed(String),

    #[error("Image '{image}' not found")]
    ImageNotFound { image: String },

    #[error("Image '{image}' is in use: {message}")]
    ImageInUse { image: String, message: String },

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Failed to pull '{image}': {message}")]
    PullFailed { image: String, message: String },

    #[error("Docker API error: {0}")]
    DockerApiError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// `image` の操作中に起きた bollard のエラーを分類する
    pub fn from_bollard(image: &str, err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => ContainerError::ImageNotFound {
                image: image.to_string(),
            },
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => ContainerError::ImageInUse {
                image: image.to_string(),
                message: message.clone(),
            },
            _ => ContainerError::from(err),
        }
    }

    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ContainerError::DockerConnectionFailed(_))
    }
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => ContainerError::ImageNotFound {
                image: message.clone(),
            },
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => ContainerError::ImageInUse {
                image: String::new(),
                message: message.clone(),
            },
            _ => {
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                {
                    ContainerError::DockerConnectionFailed(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: "conflict: unable to delete 3f1a (cannot be forced)".to_string(),
        }
    }

    #[test]
    fn test_classifies_not_found() {
        let err = ContainerError::from_bollard("docker/demo", server_error(404));
        assert!(matches!(err, ContainerError::ImageNotFound { image } if image == "docker/demo"));
    }

    #[test]
    fn test_classifies_in_use() {
        let err = ContainerError::from_bollard("3f1a", server_error(409));
        assert!(matches!(err, ContainerError::ImageInUse { .. }));
        assert!(!err.is_connection_failure());
    }

    #[test]
    fn test_other_server_errors_are_api_errors() {
        let err = ContainerError::from_bollard("3f1a", server_error(500));
        assert!(matches!(err, ContainerError::DockerApiError(_)));
    }
}
