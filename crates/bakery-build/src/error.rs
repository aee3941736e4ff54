use bakery_chef::ChefError;
use bakery_container::ContainerError;
use bakery_core::CoreError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// build / rebase パイプラインのステップ（実行順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Validate,
    ResolveDependencies,
    StageSecure,
    BuildImage,
    ApplyTags,
    UnstageSecure,
    CleanupRemoteIdentity,
    DetermineDeclaredBase,
    PullFreshBase,
    ReconcileLayers,
    RetagAsTarget,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validate => "validate",
            Phase::ResolveDependencies => "resolve dependencies",
            Phase::StageSecure => "stage secure credentials",
            Phase::BuildImage => "build image",
            Phase::ApplyTags => "apply tags",
            Phase::UnstageSecure => "restore secure directory",
            Phase::CleanupRemoteIdentity => "clean up Chef Server identity",
            Phase::DetermineDeclaredBase => "determine base image",
            Phase::PullFreshBase => "pull base image",
            Phase::ReconcileLayers => "delete orphaned layers",
            Phase::RetagAsTarget => "retag base image",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum BakeError {
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Docker context {path}: {reason}")]
    MissingContext { path: PathBuf, reason: String },

    #[error("There is no base image specified in {0}")]
    MissingBaseAnnotation(PathBuf),

    #[error("Invalid secure directory {path}: {reason}")]
    InvalidSecureDirectory { path: PathBuf, reason: String },

    #[error("A cookbooks directory already exists: {0}")]
    CookbooksDirectoryExists(PathBuf),

    #[error("Dependency resolution failed: {0}")]
    DependencyResolutionFailed(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Failed to tag {image} as {target}: {message}")]
    TagFailed {
        image: String,
        target: String,
        message: String,
    },

    #[error("Failed to restore {path}: {message}")]
    RestoreFailed { path: PathBuf, message: String },

    #[error("Failed to delete layer {id}: {message}")]
    LayerDeleteFailed { id: String, message: String },

    #[error("Failed to delete {kind} '{name}': {message}")]
    RemoteCleanupFailed {
        kind: String,
        name: String,
        message: String,
    },

    #[error("Docker engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to pull {image}: {message}")]
    PullFailed { image: String, message: String },

    #[error("Base image {base} ({base_id}) is not part of the history of {image}")]
    BaseNotInHistory {
        image: String,
        base: String,
        base_id: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for BakeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidName { name, reason } => BakeError::InvalidName { name, reason },
            CoreError::MissingContext { path, reason } => BakeError::MissingContext { path, reason },
            CoreError::MissingBaseAnnotation(path) => BakeError::MissingBaseAnnotation(path),
            CoreError::Io(e) => BakeError::Io(e),
        }
    }
}

impl BakeError {
    /// エンジンのエラーを変換する。接続失敗は操作自体の失敗と区別する
    pub fn from_engine(err: ContainerError, otherwise: impl FnOnce(String) -> BakeError) -> Self {
        if err.is_connection_failure() {
            BakeError::EngineUnavailable(err.to_string())
        } else {
            otherwise(err.to_string())
        }
    }

    pub fn from_resolver(err: ChefError) -> Self {
        BakeError::DependencyResolutionFailed(err.to_string())
    }

    /// 実行を止めるエラーなら true（レイヤー削除と Chef Server の後始末は警告扱い）
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            BakeError::LayerDeleteFailed { .. } | BakeError::RemoteCleanupFailed { .. }
        )
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BakeError::InvalidName { name, reason } => format!(
                "docker context名が不正です '{}': {}\n\
                 \n\
                 解決方法:\n\
                 context名にはタグ (`:tag`) やプロトコル (`scheme://`) を含めないでください",
                name, reason
            ),
            BakeError::MissingContext { path, reason } => format!(
                "docker contextを使用できません {}: {}\n\
                 \n\
                 解決方法:\n\
                 1. Dockerfileがあることを確認してください\n\
                 2. chef/zero.rb (local mode) か chef/client.rb (server mode) の\n\
                    どちらか一方だけを置いてください",
                path.display(),
                reason
            ),
            BakeError::MissingBaseAnnotation(path) => format!(
                "ベースイメージが指定されていません: {}\n\
                 \n\
                 解決方法:\n\
                 Dockerfileに `# BASE chef/ubuntu-14.04:latest` のような行を追加してください",
                path.display()
            ),
            BakeError::CookbooksDirectoryExists(path) => format!(
                "cookbooksディレクトリが既に存在します: {}\n\
                 \n\
                 解決方法:\n\
                 1. docker contextからこのディレクトリを削除してください\n\
                 2. または --force フラグを指定してください",
                path.display()
            ),
            BakeError::RestoreFailed { path, message } => format!(
                "secureディレクトリの復元に失敗しました {}: {}\n\
                 \n\
                 元の認証情報は `.bak` 付きのディレクトリに残っています。\n\
                 再度ビルドを実行すると、ステージング前に復元されます。",
                path.display(),
                message
            ),
            BakeError::EngineUnavailable(msg) => format!(
                "Docker APIに接続できません: {}\n\
                 \n\
                 解決方法:\n\
                 Dockerデーモンが起動しているか確認してください",
                msg
            ),
            _ => format!("{}", self),
        }
    }
}

/// 停止したステップ付きの致命的エラー
#[derive(Debug, Error)]
#[error("{phase} failed: {source}")]
pub struct PipelineError {
    pub phase: Phase,
    #[source]
    pub source: BakeError,
}

impl PipelineError {
    pub fn new(phase: Phase, source: impl Into<BakeError>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> &BakeError {
        &self.source
    }

    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.phase, self.source.user_message())
    }
}

/// 結果に記録される非致命的な失敗
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub phase: Phase,
    pub message: String,
}

impl Warning {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
        }
    }

    /// 非致命的エラーをログに出し、結果用に保持する
    pub fn downgrade(phase: Phase, error: &BakeError) -> Self {
        tracing::warn!("{}: {}", phase, error);
        Self::new(phase, error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BakeError>;
