//! Berkshelf CLI のラッパー

use crate::command::run_command;
use crate::error::{ChefError, Result};
use crate::resolver::DependencyResolver;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// docker context ディレクトリで `berks` をサブプロセスとして実行
pub struct Berks {
    program: String,
}

impl Default for Berks {
    fn default() -> Self {
        Self::new()
    }
}

impl Berks {
    pub fn new() -> Self {
        Self {
            program: "berks".to_string(),
        }
    }

    /// 指定した `berks` 実行ファイルを使う
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, workdir: &Path, args: &[&str]) -> Result<()> {
        run_command(&self.program, args, Some(workdir)).await?;
        Ok(())
    }
}

#[async_trait]
impl DependencyResolver for Berks {
    async fn available(&self) -> bool {
        match run_command(&self.program, &["-v"], None).await {
            Ok(output) => looks_like_version(output.stdout.trim()),
            Err(e) => {
                tracing::debug!("berks is not usable: {}", e);
                false
            }
        }
    }

    async fn install(&self, workdir: &Path) -> Result<()> {
        tracing::info!("Installing cookbooks with Berkshelf");
        self.run(workdir, &["install"]).await
    }

    async fn vendor(&self, workdir: &Path, target: &Path, force: bool) -> Result<()> {
        tracing::info!("Vendoring cookbooks into {}", target.display());
        let target = target.to_string_lossy();
        let mut args = vec!["vendor", target.as_ref()];
        if force {
            args.push("--delete");
        }
        self.run(workdir, &args).await
    }

    async fn upload(&self, workdir: &Path, force: bool, config: Option<&Path>) -> Result<()> {
        let config_arg = match config {
            Some(path) => Some(format!("--config={}", absolute_config(path)?.display())),
            None => None,
        };

        tracing::info!("Uploading cookbooks to the Chef Server");
        let mut args = vec!["upload"];
        if force {
            args.push("--force");
        }
        if let Some(arg) = &config_arg {
            args.push(arg.as_str());
        }
        self.run(workdir, &args).await
    }
}

fn absolute_config(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(ChefError::ConfigNotFound(path.display().to_string()));
    }
    Ok(std::fs::canonicalize(path)?)
}

/// `berks -v` は `3.1.5` のようなバージョンだけを出力する
fn looks_like_version(output: &str) -> bool {
    output.split_whitespace().any(|word| {
        let parts: Vec<&str> = word.split('.').collect();
        parts.len() >= 3
            && parts[..3]
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::{TempDir, tempdir};

    /// 引数と作業ディレクトリを記録する代役の `berks`
    fn fake_berks(dir: &TempDir, version: &str) -> (Berks, PathBuf) {
        let log = dir.path().join("berks.log");
        let script = dir.path().join("berks");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\nif [ \"$1\" = \"-v\" ]; then echo '{}'; exit 0; fi\necho \"$(pwd -P) $*\" >> '{}'\n",
                version,
                log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        (Berks::with_program(script.to_string_lossy()), log)
    }

    fn logged(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn test_looks_like_version() {
        assert!(looks_like_version("3.1.5"));
        assert!(looks_like_version("Berkshelf 7.0.10"));
        assert!(!looks_like_version("command not found"));
        assert!(!looks_like_version("3.1"));
    }

    #[tokio::test]
    async fn test_available() {
        let dir = tempdir().unwrap();
        let (berks, _) = fake_berks(&dir, "3.1.5");
        assert!(berks.available().await);

        let other = tempdir().unwrap();
        let (broken, _) = fake_berks(&other, "oops");
        assert!(!broken.available().await);

        assert!(!Berks::with_program("bakery-no-such-berks").available().await);
    }

    #[tokio::test]
    async fn test_vendor_runs_in_workdir() {
        let dir = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        let (berks, log) = fake_berks(&dir, "3.1.5");

        berks.install(workdir.path()).await.unwrap();
        berks
            .vendor(workdir.path(), &workdir.path().join("chef/cookbooks"), false)
            .await
            .unwrap();

        let lines = logged(&log);
        assert_eq!(lines.len(), 2);
        let cwd = fs::canonicalize(workdir.path()).unwrap();
        assert!(lines[0].starts_with(&cwd.display().to_string()));
        assert!(lines[0].ends_with(" install"));
        assert!(lines[1].contains(" vendor "));
        assert!(lines[1].ends_with("chef/cookbooks"));
    }

    #[tokio::test]
    async fn test_upload_flags() {
        let dir = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        let (berks, log) = fake_berks(&dir, "3.1.5");
        let config = workdir.path().join("berks.json");
        fs::write(&config, "{}").unwrap();

        berks.upload(workdir.path(), true, Some(&config)).await.unwrap();

        let lines = logged(&log);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" upload --force --config="));
        assert!(lines[0].ends_with("berks.json"));
    }

    #[tokio::test]
    async fn test_upload_missing_config() {
        let dir = tempdir().unwrap();
        let workdir = tempdir().unwrap();
        let (berks, log) = fake_berks(&dir, "3.1.5");

        let result = berks
            .upload(workdir.path(), false, Some(&workdir.path().join("missing.json")))
            .await;
        assert!(matches!(result, Err(ChefError::ConfigNotFound(_))));
        assert!(logged(&log).is_empty());
    }
}
