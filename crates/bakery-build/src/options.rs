//! パイプラインに渡すオプション

use crate::error::{BakeError, Result};
use bakery_core::{DEFAULT_TAG, ImageReference, validate_tag};
use serde::Serialize;
use std::path::PathBuf;

/// Dockerfile にも設定にもベースイメージがない場合に使うイメージ
pub const DEFAULT_BASE_IMAGE: &str = "chef/ubuntu-12.04:latest";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Berksfile があれば Berkshelf を実行する
    pub run_dependency_resolution: bool,
    /// 既存の `cookbooks` を置き換える / アップロード済み cookbook を上書きする
    pub force: bool,
    /// server mode のビルドで登録された node と client を削除する
    pub cleanup_remote_identity: bool,
    /// ビルド中だけ `chef/secure` にコピーする認証情報
    pub secure_source_dir: Option<PathBuf>,
    /// `berks upload` に渡す Berkshelf の設定
    pub alternate_resolver_config: Option<PathBuf>,
    pub tags: Vec<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            run_dependency_resolution: true,
            force: false,
            cleanup_remote_identity: true,
            secure_source_dir: None,
            alternate_resolver_config: None,
            tags: vec![DEFAULT_TAG.to_string()],
        }
    }
}

impl BuildOptions {
    /// 指定順で重複を除いたタグ（指定がなければ `latest`）
    pub fn effective_tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = Vec::new();
        for tag in &self.tags {
            validate_tag(tag).map_err(BakeError::from)?;
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        if tags.is_empty() {
            tags.push(DEFAULT_TAG.to_string());
        }
        Ok(tags)
    }
}

/// rebase 時の不要レイヤーの削除方法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebaseStrategy {
    /// 旧ベースより上のレイヤーを新しい順にすべて削除
    #[default]
    HistoryWalk,
    /// ターゲット名が指すイメージだけを削除
    DirectReplace,
}

impl std::str::FromStr for RebaseStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "history-walk" | "history" => Ok(RebaseStrategy::HistoryWalk),
            "direct-replace" | "replace" => Ok(RebaseStrategy::DirectReplace),
            other => Err(format!(
                "unknown rebase strategy '{}' (expected history-walk or direct-replace)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RebaseOptions {
    pub strategy: RebaseStrategy,
    /// 最新のベースに付けるタグ（context のリポジトリ名で）
    pub tag: String,
    /// Dockerfile に `# BASE` 行がない場合に使う設定上のベース
    pub default_base_image: Option<ImageReference>,
}

impl Default for RebaseOptions {
    fn default() -> Self {
        Self {
            strategy: RebaseStrategy::default(),
            tag: DEFAULT_TAG.to_string(),
            default_base_image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_tags_default_to_latest() {
        let options = BuildOptions {
            tags: Vec::new(),
            ..Default::default()
        };
        assert_eq!(options.effective_tags().unwrap(), vec!["latest"]);
    }

    #[test]
    fn test_effective_tags_dedupe_in_order() {
        let options = BuildOptions {
            tags: vec!["v1".into(), "latest".into(), "v1".into()],
            ..Default::default()
        };
        assert_eq!(options.effective_tags().unwrap(), vec!["v1", "latest"]);
    }

    #[test]
    fn test_effective_tags_rejects_invalid() {
        let options = BuildOptions {
            tags: vec!["feature/x".into()],
            ..Default::default()
        };
        assert!(matches!(
            options.effective_tags(),
            Err(BakeError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("history-walk".parse::<RebaseStrategy>().unwrap(), RebaseStrategy::HistoryWalk);
        assert_eq!("replace".parse::<RebaseStrategy>().unwrap(), RebaseStrategy::DirectReplace);
        assert!("squash".parse::<RebaseStrategy>().is_err());
    }

    #[test]
    fn test_default_base_image_parses() {
        let image = ImageReference::parse(DEFAULT_BASE_IMAGE).unwrap();
        assert_eq!(image.repository, "chef/ubuntu-12.04");
    }
}
