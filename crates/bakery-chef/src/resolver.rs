//! cookbook 依存解決の抽象

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// context の依存定義に書かれた cookbook を解決する
///
/// `workdir` は依存定義のある docker context ディレクトリ
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// ツールがインストールされていて使えるか
    async fn available(&self) -> bool;

    async fn install(&self, workdir: &Path) -> Result<()>;

    /// 解決したすべての cookbook を `target` にコピー
    async fn vendor(&self, workdir: &Path, target: &Path, force: bool) -> Result<()>;

    /// 解決したすべての cookbook を Chef Server にアップロード
    async fn upload(&self, workdir: &Path, force: bool, config: Option<&Path>) -> Result<()>;
}
