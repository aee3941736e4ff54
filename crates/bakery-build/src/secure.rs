//! secure 認証情報のステージング
//!
//! `chef/secure` はイメージに焼き込まれるため、別の認証情報が必要なビルドでは
//! ビルドの間だけディレクトリを差し替える:
//!
//! ```text
//! stage:   chef/secure -> chef/secure.bak, <source> -> chef/secure
//! restore: rm chef/secure, chef/secure.bak -> chef/secure
//! ```
//!
//! 途中でプロセスが落ちると `secure.bak` が残る。次の
//! `stage` は最初にそれを元に戻す

use crate::error::{BakeError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 認証情報ディレクトリに最低1つ必要なファイル
pub const CREDENTIAL_FILES: [&str; 2] = ["client.pem", "validation.pem"];

pub const BACKUP_SUFFIX: &str = ".bak";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureStagingState {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub active: bool,
    /// ステージング前に `secure` ディレクトリがあったか
    pub had_original: bool,
    /// 中断された実行のバックアップを先に復元したか
    pub recovered_backup: bool,
}

impl SecureStagingState {
    /// 復元するものがない状態
    pub fn inactive(original_path: impl Into<PathBuf>) -> Self {
        let original_path = original_path.into();
        Self {
            backup_path: backup_path_for(&original_path),
            original_path,
            active: false,
            had_original: false,
            recovered_backup: false,
        }
    }
}

pub fn backup_path_for(secure_dir: &Path) -> PathBuf {
    let mut name = secure_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    secure_dir.with_file_name(name)
}

pub struct SecureStager;

impl SecureStager {
    /// `source` が認証情報ディレクトリらしいか確認
    pub fn validate_source(source: &Path) -> Result<()> {
        if !source.is_dir() {
            return Err(BakeError::InvalidSecureDirectory {
                path: source.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        if !CREDENTIAL_FILES.iter().any(|f| source.join(f).is_file()) {
            return Err(BakeError::InvalidSecureDirectory {
                path: source.to_path_buf(),
                reason: format!("must contain {} or {}", CREDENTIAL_FILES[0], CREDENTIAL_FILES[1]),
            });
        }
        Ok(())
    }

    /// `secure_dir` を退避し、代わりに `source` をコピー
    pub fn stage(secure_dir: &Path, source: &Path) -> Result<SecureStagingState> {
        Self::validate_source(source)?;

        let mut state = SecureStagingState::inactive(secure_dir);

        if state.backup_path.exists() {
            tracing::warn!(
                "Found {} from an interrupted build, restoring it first",
                state.backup_path.display()
            );
            let mut leftover = SecureStagingState {
                active: true,
                had_original: true,
                ..state.clone()
            };
            Self::restore(&mut leftover)?;
            state.recovered_backup = true;
        }

        state.had_original = secure_dir.exists();
        if state.had_original {
            fs::rename(secure_dir, &state.backup_path)?;
        }

        tracing::debug!("Copying {} to {}", source.display(), secure_dir.display());
        if let Err(e) = copy_dir_recursive(source, secure_dir) {
            // 失敗したら元に戻す
            let _ = fs::remove_dir_all(secure_dir);
            if state.had_original {
                fs::rename(&state.backup_path, secure_dir).map_err(|restore_err| {
                    BakeError::RestoreFailed {
                        path: secure_dir.to_path_buf(),
                        message: restore_err.to_string(),
                    }
                })?;
            }
            return Err(BakeError::Io(e));
        }

        state.active = true;
        Ok(state)
    }

    /// `stage` を元に戻す。`state` が active でなければ何もしないので
    /// 何度呼んでもよい
    pub fn restore(state: &mut SecureStagingState) -> Result<()> {
        if !state.active {
            return Ok(());
        }

        let failed = |e: std::io::Error| BakeError::RestoreFailed {
            path: state.original_path.clone(),
            message: e.to_string(),
        };

        if state.original_path.exists() {
            fs::remove_dir_all(&state.original_path).map_err(failed)?;
        }
        if state.had_original && state.backup_path.exists() {
            fs::rename(&state.backup_path, &state.original_path).map_err(failed)?;
        }

        state.active = false;
        tracing::debug!("Restored {}", state.original_path.display());
        Ok(())
    }
}

/// drop 時にステージングしたディレクトリを復元する
///
/// 結果を受け取るには [`SecureGuard::restore`] を呼ぶ（drop では
/// 失敗をログに出すことしかできない）。明示的な復元は1回だけ試行し、
/// 試行済みのガードは drop 時に何もしない
pub struct SecureGuard {
    state: SecureStagingState,
}

impl SecureGuard {
    pub fn stage(secure_dir: &Path, source: &Path) -> Result<Self> {
        let state = SecureStager::stage(secure_dir, source)?;
        Ok(Self { state })
    }

    pub fn state(&self) -> &SecureStagingState {
        &self.state
    }

    pub fn restore(&mut self) -> Result<()> {
        let result = SecureStager::restore(&mut self.state);
        self.state.active = false;
        result
    }
}

impl Drop for SecureGuard {
    fn drop(&mut self) {
        if let Err(e) = SecureStager::restore(&mut self.state) {
            tracing::error!("{}", e);
        }
    }
}

/// ディレクトリを再帰的にコピー（ファイルのパーミッションは保持）
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    fs::set_permissions(dst, fs::metadata(src)?.permissions())?;
    Ok(())
}
