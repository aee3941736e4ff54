use crate::error::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `exclude` は `context_path` からの相対パス。除外したディレクトリは
    /// 配下ごと含めない
    pub fn create_context(context_path: &Path, exclude: &[PathBuf]) -> Result<Vec<u8>> {
        tracing::debug!("Creating build context from: {}", context_path.display());

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(true);

            append_tree(&mut tar, context_path, context_path, exclude)?;
            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());

        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context is large ({}MB). Consider excluding files with a .dockerignore",
                size / 1024 / 1024
            );
        }
    }
}

fn append_tree<W: Write>(
    tar: &mut Builder<W>,
    root: &Path,
    dir: &Path,
    exclude: &[PathBuf],
) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = path.strip_prefix(root).map_err(std::io::Error::other)?;
        if exclude.iter().any(|e| relative.starts_with(e)) {
            tracing::debug!("Excluding {} from build context", relative.display());
            continue;
        }

        if path.is_dir() {
            tar.append_dir(relative, &path)?;
            append_tree(tar, root, &path, exclude)?;
        } else {
            tar.append_path_with_name(&path, relative)?;
        }
    }
    Ok(())
}
