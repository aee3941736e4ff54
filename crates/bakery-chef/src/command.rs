//! berks と knife で共通のサブプロセス実行

use crate::error::{ChefError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// `cwd` で `program args...` を実行し、出力を返す
///
/// 終了コードが0以外なら stderr 付きの [`ChefError::CommandFailed`]、
/// 実行ファイルがなければ [`ChefError::ToolNotFound`]
pub async fn run_command(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!("Running: {} {}", program, args.join(" "));

    let output = cmd.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ChefError::ToolNotFound(program.to_string())
        } else {
            ChefError::Io(e)
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    for line in stdout.lines() {
        tracing::debug!(target: "bakery::chef", "{}", line);
    }

    if !output.status.success() {
        return Err(ChefError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            status: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
