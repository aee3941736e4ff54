//! Chef Server のオブジェクトを削除する knife CLI のラッパー

use crate::command::run_command;
use crate::error::{ChefError, Result};
use crate::identity::{DeleteStatus, RemoteIdentityStore};
use async_trait::async_trait;
use std::path::PathBuf;

/// `knife node delete` / `knife client delete` を非対話で実行
pub struct Knife {
    program: String,
    config: Option<PathBuf>,
}

impl Default for Knife {
    fn default() -> Self {
        Self::new()
    }
}

impl Knife {
    pub fn new() -> Self {
        Self {
            program: "knife".to_string(),
            config: None,
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            config: None,
        }
    }

    /// すべての knife 呼び出しに `--config <path>` を渡す
    pub fn with_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.config = Some(config.into());
        self
    }

    async fn delete(&self, kind: &str, name: &str) -> Result<DeleteStatus> {
        let config = self.config.as_ref().map(|p| p.to_string_lossy().to_string());
        let mut args = vec![kind, "delete", name, "--yes"];
        if let Some(config) = &config {
            args.push("--config");
            args.push(config.as_str());
        }

        match run_command(&self.program, &args, None).await {
            Ok(_) => Ok(DeleteStatus::Deleted),
            Err(ChefError::CommandFailed { stderr, .. }) if is_not_found(&stderr) => {
                Ok(DeleteStatus::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RemoteIdentityStore for Knife {
    async fn delete_node(&self, name: &str) -> Result<DeleteStatus> {
        self.delete("node", name).await
    }

    async fn delete_client(&self, name: &str) -> Result<DeleteStatus> {
        self.delete("client", name).await
    }
}

/// 存在しないオブジェクトは HTTP 404 として報告される
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("404") || lower.contains("not found")
}
