//! イメージ参照のパース
//!
//! パイプラインに届く名前は2種類: ユーザーが入力する context 名（タグなし）と、
//! Dockerfile や設定に書かれた pull 用の名前（タグは任意）

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TAG: &str = "latest";

/// コンテナイメージ名とタグ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// docker context 名をパースする
    ///
    /// context 名はディレクトリとイメージのリポジトリを同時に表すので、
    /// タグやプロトコルを含めてはならない
    ///
    /// # 例
    /// - `docker/demo` -> `docker/demo:latest`
    /// - `registry.example.com:4000/app` -> OK（`:4000` はポート）
    /// - `docker/demo:v1` -> `InvalidName`
    pub fn from_context_name(raw: &str) -> Result<Self> {
        check_common(raw)?;

        if has_tag_suffix(raw) {
            return Err(CoreError::invalid_name(
                raw,
                "a docker context name may not have a tag",
            ));
        }

        Ok(Self::new(raw, DEFAULT_TAG))
    }

    /// `chef/ubuntu-14.04:latest` のような pull 用の名前をパースする
    pub fn parse(raw: &str) -> Result<Self> {
        check_common(raw)?;
        if raw.ends_with(':') {
            return Err(CoreError::invalid_name(raw, "dangling tag separator"));
        }

        let (repository, tag) = split_image_tag(raw);
        if repository.is_empty() || tag.is_empty() {
            return Err(CoreError::invalid_name(raw, "empty repository or tag"));
        }

        Ok(Self { repository, tag })
    }

    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self::new(self.repository.clone(), tag)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

fn check_common(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(CoreError::invalid_name(raw, "name is empty"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(CoreError::invalid_name(raw, "name contains whitespace"));
    }
    if has_protocol_prefix(raw) {
        return Err(CoreError::invalid_name(
            raw,
            "a docker image name may not start with a protocol",
        ));
    }
    Ok(())
}

/// 最後の `:` の後が末尾までタグに使える文字だけなら `true`
///
/// 後ろに `/` が続く `:` はレジストリのホスト部なので
/// `localhost:5000/app` はタグなし
pub fn has_tag_suffix(name: &str) -> bool {
    match name.rfind(':') {
        Some(pos) => name[pos + 1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')),
        None => false,
    }
}

/// `https://...` のような名前（英数字の後に `://`）なら `true`
pub fn has_protocol_prefix(name: &str) -> bool {
    match name.find("://") {
        Some(pos) if pos > 0 => name[..pos]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Docker のタグ規則: `[A-Za-z0-9_.-]` で128文字以内、
/// 先頭は `.` と `-` 以外
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(CoreError::invalid_name(tag, "tag is empty"));
    }

    if tag.len() > 128 {
        return Err(CoreError::invalid_name(
            tag,
            format!("tag too long ({} characters, max 128)", tag.len()),
        ));
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(CoreError::invalid_name(tag, "tag may not start with '.' or '-'"));
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(CoreError::invalid_name(
            tag,
            format!("invalid character '{}' in tag", c),
        ));
    }

    Ok(())
}

/// 相対パスとして使えるように `.` と `:` を `_` に置き換える
///
/// `registry.example.com:4000/my_image` -> `registry_example_com_4000/my_image`
pub fn sanitize(name: &str) -> String {
    name.replace(['.', ':'], "_")
}

/// イメージ名をリポジトリとタグに分割（デフォルトは `latest`）
///
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `debian:12` -> `("debian", "12")`
/// - `localhost:5000/app` -> `("localhost:5000/app", "latest")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // レジストリのポートの後には必ずパスが続く
        if !potential_tag.contains('/') {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), DEFAULT_TAG.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_context_name_defaults_to_latest() {
        let image = ImageReference::from_context_name("docker/demo").unwrap();
        assert_eq!(image.repository, "docker/demo");
        assert_eq!(image.tag, "latest");
        assert_eq!(image.to_string(), "docker/demo:latest");
    }

    #[test]
    fn test_context_name_with_registry_port() {
        let image = ImageReference::from_context_name("registry.example.com:4000/app").unwrap();
        assert_eq!(image.repository, "registry.example.com:4000/app");
    }

    #[test]
    fn test_context_name_rejects_tag() {
        for name in ["docker/demo:v1", "demo:latest", "demo:", "demo:1.0-rc_2"] {
            let result = ImageReference::from_context_name(name);
            assert!(
                matches!(result, Err(CoreError::InvalidName { .. })),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_context_name_rejects_protocol() {
        let result = ImageReference::from_context_name("https://registry.example.com/app");
        assert!(matches!(result, Err(CoreError::InvalidName { .. })));
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(ImageReference::from_context_name("").is_err());
        assert!(ImageReference::from_context_name("docker /demo").is_err());
        assert!(ImageReference::parse("").is_err());
    }

    #[test]
    fn test_parse_pull_specifier() {
        let image = ImageReference::parse("chef/ubuntu-14.04:latest").unwrap();
        assert_eq!(image.repository, "chef/ubuntu-14.04");
        assert_eq!(image.tag, "latest");

        let image = ImageReference::parse("localhost:5000/base").unwrap();
        assert_eq!(image.repository, "localhost:5000/base");
        assert_eq!(image.tag, "latest");

        let image = ImageReference::parse("localhost:5000/base:dev").unwrap();
        assert_eq!(image.repository, "localhost:5000/base");
        assert_eq!(image.tag, "dev");
    }

    #[test]
    fn test_parse_numeric_tag() {
        for (raw, repository, tag) in [
            ("debian:12", "debian", "12"),
            ("postgres:16", "postgres", "16"),
            ("localhost:5000/app:7", "localhost:5000/app", "7"),
        ] {
            let image = ImageReference::parse(raw).unwrap();
            assert_eq!(image.repository, repository);
            assert_eq!(image.tag, tag);
            assert_eq!(image.to_string(), raw);
        }
    }

    #[test]
    fn test_split_image_tag() {
        assert_eq!(
            split_image_tag("docker/demo:2"),
            ("docker/demo".to_string(), "2".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/app"),
            ("localhost:5000/app".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_dangling_colon() {
        assert!(ImageReference::parse("base:").is_err());
    }

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("latest").is_ok());
        assert!(validate_tag("v1.2.3-rc_1").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("-dev").is_err());
        assert!(validate_tag(".dev").is_err());
        assert!(validate_tag("feature/x").is_err());
        assert!(validate_tag(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(
            sanitize("registry.example.com:4000/my_image"),
            "registry_example_com_4000/my_image"
        );
        assert_eq!(sanitize("docker/demo"), "docker/demo");
    }

    #[test]
    fn test_with_tag() {
        let image = ImageReference::from_context_name("docker/demo").unwrap();
        assert_eq!(image.with_tag("v2").to_string(), "docker/demo:v2");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(name in "[a-z0-9._:/-]{1,40}") {
            let once = sanitize(&name);
            prop_assert_eq!(sanitize(&once), once.clone());
            prop_assert!(!once.contains('.') && !once.contains(':'));
        }

        #[test]
        fn prop_plain_names_parse(name in "[a-z0-9][a-z0-9_-]{0,12}(/[a-z0-9][a-z0-9_-]{0,12}){0,2}") {
            let image = ImageReference::from_context_name(&name).unwrap();
            prop_assert_eq!(image.repository, name);
            prop_assert_eq!(image.tag, DEFAULT_TAG);
        }

        #[test]
        fn prop_tagged_names_rejected(
            name in "[a-z0-9][a-z0-9/_-]{0,20}",
            tag in "[A-Za-z0-9._-]{0,10}",
        ) {
            let raw = format!("{}:{}", name, tag);
            prop_assert!(ImageReference::from_context_name(&raw).is_err());
        }

        #[test]
        fn prop_protocol_names_rejected(
            scheme in "[a-z][a-z0-9_]{0,6}",
            rest in "[a-z0-9./-]{1,20}",
        ) {
            let raw = format!("{}://{}", scheme, rest);
            prop_assert!(ImageReference::from_context_name(&raw).is_err());
            prop_assert!(ImageReference::parse(&raw).is_err());
        }
    }
}
