//! ディスク上の docker context
//!
//! context は Dockerfile と chef-repo を含むディレクトリ:
//!
//! ```text
//! <root>/<sanitized name>/
//!   Dockerfile
//!   Berksfile
//!   chef/{zero.rb | client.rb, .node_name, secure/, cookbooks/}
//! ```

use crate::error::{CoreError, Result};
use crate::image::{self, ImageReference};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const DOCKERFILE: &str = "Dockerfile";
pub const BERKSFILE: &str = "Berksfile";
pub const CHEF_REPO_DIR: &str = "chef";
pub const LOCAL_MODE_MARKER: &str = "zero.rb";
pub const SERVER_MODE_MARKER: &str = "client.rb";
pub const NODE_NAME_FILE: &str = ".node_name";
pub const SECURE_DIR: &str = "secure";
pub const COOKBOOKS_DIR: &str = "cookbooks";

/// init 時に選んだベースイメージを記録するコメント
pub const BASE_MARKER: &str = "# BASE ";

/// イメージ内での chef-client の実行方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChefMode {
    /// vendor した cookbook に対して chef-client -z
    Local,
    /// Chef Server に node と client を登録して chef-client
    Server,
}

impl fmt::Display for ChefMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChefMode::Local => f.write_str("local-mode"),
            ChefMode::Server => f.write_str("server-mode"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    name: String,
    image: ImageReference,
    path: PathBuf,
}

impl BuildContext {
    /// `raw_name` を検証し、`root` 配下のディレクトリを求める
    ///
    /// ディレクトリはまだ存在しなくてよい
    pub fn for_name(raw_name: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let image = ImageReference::from_context_name(raw_name)?;
        let root = root.into();
        let path = root.join(image::sanitize(raw_name));

        Ok(Self {
            name: raw_name.to_string(),
            image,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// この context が生成するイメージ（タグは `latest`）
    pub fn image(&self) -> &ImageReference {
        &self.image
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dockerfile_path(&self) -> PathBuf {
        self.path.join(DOCKERFILE)
    }

    pub fn berksfile_path(&self) -> PathBuf {
        self.path.join(BERKSFILE)
    }

    pub fn chef_repo(&self) -> PathBuf {
        self.path.join(CHEF_REPO_DIR)
    }

    pub fn secure_dir(&self) -> PathBuf {
        self.chef_repo().join(SECURE_DIR)
    }

    pub fn cookbooks_dir(&self) -> PathBuf {
        self.chef_repo().join(COOKBOOKS_DIR)
    }

    pub fn node_name_path(&self) -> PathBuf {
        self.chef_repo().join(NODE_NAME_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn has_dependency_manifest(&self) -> bool {
        self.berksfile_path().is_file()
    }

    /// ディレクトリと Dockerfile があることを確認
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.exists() {
            return Err(CoreError::MissingContext {
                path: self.path.clone(),
                reason: "directory does not exist".to_string(),
            });
        }
        if !self.dockerfile_path().is_file() {
            return Err(CoreError::MissingContext {
                path: self.path.clone(),
                reason: format!("no {} in context", DOCKERFILE),
            });
        }
        Ok(())
    }

    /// chef-repo のマーカーファイルから local / server mode を判定
    ///
    /// `chef/zero.rb` と `chef/client.rb` のどちらか一方だけが必要
    pub fn detect_mode(&self) -> Result<ChefMode> {
        let chef_repo = self.chef_repo();
        let local = chef_repo.join(LOCAL_MODE_MARKER).is_file();
        let server = chef_repo.join(SERVER_MODE_MARKER).is_file();

        match (local, server) {
            (true, false) => Ok(ChefMode::Local),
            (false, true) => Ok(ChefMode::Server),
            (true, true) => Err(CoreError::MissingContext {
                path: self.path.clone(),
                reason: format!(
                    "both {} and {} exist in {}; cannot tell local-mode from server-mode",
                    LOCAL_MODE_MARKER,
                    SERVER_MODE_MARKER,
                    chef_repo.display()
                ),
            }),
            (false, false) => Err(CoreError::MissingContext {
                path: self.path.clone(),
                reason: format!(
                    "neither {} nor {} found in {}",
                    LOCAL_MODE_MARKER,
                    SERVER_MODE_MARKER,
                    chef_repo.display()
                ),
            }),
        }
    }

    /// Dockerfile の `# BASE <image>` 行に記録されたベースイメージ
    ///
    /// 複数ある場合は最後の行が優先
    pub fn base_image(&self) -> Result<ImageReference> {
        let dockerfile = self.dockerfile_path();
        let file = File::open(&dockerfile).map_err(|e| CoreError::MissingContext {
            path: self.path.clone(),
            reason: format!("cannot read {}: {}", dockerfile.display(), e),
        })?;

        let mut found = None;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if let Some(reference) = parse_base_marker(&line) {
                found = Some(reference.to_string());
            }
        }

        match found {
            Some(reference) => {
                tracing::debug!("Found base image marker in {}: {}", dockerfile.display(), reference);
                ImageReference::parse(&reference)
            }
            None => Err(CoreError::MissingBaseAnnotation(dockerfile)),
        }
    }

    /// context の初期化時に記録された node 名（あれば）
    pub fn node_name(&self) -> Result<Option<String>> {
        let path = self.node_name_path();
        if !path.is_file() {
            return Ok(None);
        }

        let name = std::fs::read_to_string(&path)?.trim().to_string();
        if name.is_empty() {
            Ok(None)
        } else {
            Ok(Some(name))
        }
    }
}

fn parse_base_marker(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(BASE_MARKER)
        .and_then(|rest| rest.split_whitespace().next())
}
