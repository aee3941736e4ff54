//! コンテナエンジンの抽象

use crate::error::Result;
use async_trait::async_trait;
use bakery_core::ImageReference;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// イメージオブジェクトがない履歴レイヤーに対してエンジンが返すID
pub const MISSING_LAYER_ID: &str = "<missing>";

/// エンジンが返すイメージID (例: `sha256:3f1a...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `docker images` と同じ12桁表記
    pub fn short(&self) -> &str {
        let hex = self.0.strip_prefix("sha256:").unwrap_or(&self.0);
        &hex[..hex.len().min(12)]
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub id: ImageId,
}

/// イメージのレイヤー履歴の1エントリ（新しい順）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: ImageId,
    pub tags: Vec<String>,
}

impl HistoryEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ImageId::new(id),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn is_missing(&self) -> bool {
        self.id.as_str() == MISSING_LAYER_ID
    }
}

/// パイプラインがコンテナエンジンに求める操作
///
/// どの呼び出しもエンジンの処理完了まで待つ
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// `image` を pull し、解決後のIDを返す
    async fn pull(&self, image: &ImageReference) -> Result<ImageId>;

    /// `path` の context ディレクトリをビルドし、仮の名前 `reference` を付けて
    /// ビルドしたイメージのIDを返す
    ///
    /// `exclude` はエンジンに送ってはならないパス（`path` からの相対パス）
    async fn build_from_directory(
        &self,
        path: &Path,
        reference: &ImageReference,
        exclude: &[PathBuf],
    ) -> Result<ImageId>;

    async fn tag(&self, image: &ImageId, repository: &str, tag: &str) -> Result<()>;

    /// 名前またはIDでイメージを取得
    async fn get(&self, reference: &str) -> Result<ImageHandle>;

    async fn remove(&self, image: &ImageId) -> Result<()>;

    /// `image` のレイヤー履歴（イメージ自身から始まる）
    async fn history(&self, image: &ImageId) -> Result<Vec<HistoryEntry>>;
}
