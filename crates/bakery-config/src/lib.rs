pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "BAKERY_CONFIG_PATH";
pub const DEFAULT_DOCKERFILES_PATH: &str = "./dockerfiles";

const CANDIDATES: [&str; 2] = [".bakery.yml", "bakery.yml"];

/// bakery の設定（ファイル内の項目はすべて省略可）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// docker context を置くディレクトリ
    pub dockerfiles_path: PathBuf,
    /// Dockerfile に `# BASE` 行がない場合の rebase 用ベースイメージ
    pub default_base_image: Option<String>,
    /// `berks upload` に渡す Berkshelf の設定
    pub berks_config: Option<PathBuf>,
    /// ビルド後に node と client を削除する knife の設定
    pub knife_config: Option<PathBuf>,
    pub run_berks: bool,
    /// server mode のビルドで登録された node と client を削除する
    pub cleanup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dockerfiles_path: PathBuf::from(DEFAULT_DOCKERFILES_PATH),
            default_base_image: None,
            berks_config: None,
            knife_config: None,
            run_berks: true,
            cleanup: true,
        }
    }
}

impl Settings {
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(path, &content)
    }
}

/// 設定ファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 `BAKERY_CONFIG_PATH` (直接パス指定)
/// 2. カレントディレクトリ: `.bakery.yml`, `bakery.yml`
/// 3. `<config dir>/bakery/config.yml` (グローバル設定)
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points to {}, which does not exist",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("bakery").join("config.yml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// 設定を読み込む（設定ファイルがなければデフォルト値）
pub fn load() -> Result<Settings> {
    match find_settings_file()? {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Settings::from_file(&path)
        }
        None => Ok(Settings::default()),
    }
}
