//! [`ContainerEngine`] の Docker 実装

use crate::context::ContextBuilder;
use crate::engine::{ContainerEngine, HistoryEntry, ImageHandle, ImageId};
use crate::error::{ContainerError, Result};
use crate::progress::BuildProgress;
use async_trait::async_trait;
use bakery_core::ImageReference;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::path::{Path, PathBuf};

pub struct DockerEngine {
    docker: Docker,
    show_progress: bool,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            show_progress: true,
        }
    }

    /// ローカルの Docker デーモンに接続し、応答を確認する
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))?;

        tracing::debug!("Connected to Docker daemon");
        Ok(Self::new(docker))
    }

    /// ビルドのスピナーを無効にする（stdout が端末でない場合など）
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    async fn inspect_id(&self, reference: &str) -> Result<ImageId> {
        let handle = self.get(reference).await?;
        Ok(handle.id)
    }

    fn handle_build_output(
        &self,
        output: bollard::models::BuildInfo,
        progress: &BuildProgress,
    ) -> Result<()> {
        if let Some(stream) = output.stream {
            let line = stream.trim_end();
            if !line.is_empty() {
                tracing::debug!(target: "bakery::build", "{}", line);
                progress.set_message(line);
            }
        }

        if let Some(error) = output.error {
            return Err(ContainerError::BuildFailed(error));
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(ContainerError::BuildFailed(error_msg));
        }

        if let Some(status) = output.status {
            tracing::debug!(target: "bakery::build", "{}", status);
        }

        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn pull(&self, image: &ImageReference) -> Result<ImageId> {
        tracing::info!("Pulling {}", image);

        #[allow(deprecated)]
        let options = bollard::image::CreateImageOptions {
            from_image: image.repository.as_str(),
            tag: image.tag.as_str(),
            ..Default::default()
        };

        #[allow(deprecated)]
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(info) = stream.next().await {
            match info {
                Ok(bollard::models::CreateImageInfo {
                    status: Some(status),
                    progress,
                    ..
                }) => {
                    tracing::debug!(
                        "{}: {} {}",
                        image,
                        status,
                        progress.as_deref().unwrap_or("")
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    let err = ContainerError::from(e);
                    if err.is_connection_failure() {
                        return Err(err);
                    }
                    return Err(ContainerError::PullFailed {
                        image: image.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let id = self.inspect_id(&image.to_string()).await?;
        tracing::info!("Pulled {} ({})", image, id.short());
        Ok(id)
    }

    async fn build_from_directory(
        &self,
        path: &Path,
        reference: &ImageReference,
        exclude: &[PathBuf],
    ) -> Result<ImageId> {
        tracing::info!("Building image {} from {}", reference, path.display());

        let context_data = ContextBuilder::create_context(path, exclude)?;
        let tag = reference.to_string();

        // FROM はローカルにしかないイメージを指すことがあるので pull しない
        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag.as_str(),
            rm: true,
            forcerm: true,
            pull: false,
            ..Default::default()
        };

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context_data));

        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        let progress = if self.show_progress {
            BuildProgress::new(&tag)
        } else {
            BuildProgress::hidden()
        };

        while let Some(msg) = stream.next().await {
            let result = match msg {
                Ok(output) => self.handle_build_output(output, &progress),
                Err(e) => Err(ContainerError::from(e)),
            };
            if let Err(e) = result {
                progress.finish_error(&e.to_string());
                return Err(e);
            }
        }
        progress.finish_success();

        let id = self.inspect_id(&tag).await?;
        tracing::info!("Successfully built {} ({})", tag, id.short());
        Ok(id)
    }

    async fn tag(&self, image: &ImageId, repository: &str, tag: &str) -> Result<()> {
        tracing::debug!("Tagging {} as {}:{}", image.short(), repository, tag);

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo: repository,
            tag,
        };

        self.docker
            .tag_image(image.as_str(), Some(options))
            .await
            .map_err(|e| ContainerError::from_bollard(image.as_str(), e))
    }

    async fn get(&self, reference: &str) -> Result<ImageHandle> {
        let inspect = self
            .docker
            .inspect_image(reference)
            .await
            .map_err(|e| ContainerError::from_bollard(reference, e))?;

        let id = inspect.id.ok_or_else(|| {
            ContainerError::DockerApiError(format!("image '{}' has no id", reference))
        })?;

        Ok(ImageHandle {
            id: ImageId::new(id),
        })
    }

    async fn remove(&self, image: &ImageId) -> Result<()> {
        let responses = self
            .docker
            .remove_image(
                image.as_str(),
                None::<bollard::query_parameters::RemoveImageOptions>,
                None,
            )
            .await
            .map_err(|e| ContainerError::from_bollard(image.as_str(), e))?;

        for response in responses {
            if let Some(untagged) = response.untagged {
                tracing::debug!("Untagged {}", untagged);
            }
            if let Some(deleted) = response.deleted {
                tracing::debug!("Deleted {}", deleted);
            }
        }
        Ok(())
    }

    async fn history(&self, image: &ImageId) -> Result<Vec<HistoryEntry>> {
        let items = self
            .docker
            .image_history(image.as_str())
            .await
            .map_err(|e| ContainerError::from_bollard(image.as_str(), e))?;

        Ok(items
            .into_iter()
            .map(|item| HistoryEntry {
                id: ImageId::new(item.id),
                tags: item.tags,
            })
            .collect())
    }
}
