//! パイプライン成功時の結果

use crate::error::Warning;
use crate::options::RebaseStrategy;
use bakery_container::ImageId;
use bakery_core::{ChefMode, ImageReference};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// `chef/cookbooks` に vendor した (local mode)
    Vendored,
    /// Chef Server にアップロードした (server mode)
    Uploaded,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStatus {
    Deleted,
    NotFound,
    Failed,
    Skipped,
}

/// ビルド中に登録された node と client の削除結果
#[derive(Debug, Clone, Serialize)]
pub struct RemoteCleanup {
    pub identity: Option<String>,
    pub node: CleanupStatus,
    pub client: CleanupStatus,
}

impl RemoteCleanup {
    pub fn skipped() -> Self {
        Self {
            identity: None,
            node: CleanupStatus::Skipped,
            client: CleanupStatus::Skipped,
        }
    }

    pub fn attempted(&self) -> bool {
        self.identity.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub context: String,
    pub mode: ChefMode,
    pub resolution: ResolutionStatus,
    pub secure_staged: bool,
    pub image_id: ImageId,
    /// イメージに付けた参照 (`repo:tag`)
    pub tags: Vec<String>,
    pub cleanup: RemoteCleanup,
    pub warnings: Vec<Warning>,
}

/// ベースイメージの取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseSource {
    /// Dockerfile の `# BASE` 行
    Recorded,
    /// 設定ファイル
    Configured,
    /// 組み込みのデフォルト
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebaseOutcome {
    pub target: ImageReference,
    pub declared_base: ImageReference,
    pub base_source: BaseSource,
    pub old_base_id: Option<ImageId>,
    pub new_base_id: ImageId,
    pub strategy: RebaseStrategy,
    pub deleted_layers: Vec<ImageId>,
    pub skipped_layers: Vec<ImageId>,
    pub warnings: Vec<Warning>,
}
