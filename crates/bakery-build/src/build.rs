//! build パイプライン
//!
//! 検証 -> 依存解決 -> secure ステージング -> ビルド -> タグ付け
//! -> secure 復元 -> Chef Server の node/client 削除
//!
//! 各ステップは前のステップの完了を待ってから始まる。認証情報を
//! ステージングした後は、future が drop された場合も含めて必ず復元する

use crate::error::{BakeError, Phase, PipelineError, Warning};
use crate::options::BuildOptions;
use crate::outcome::{BuildOutcome, CleanupStatus, RemoteCleanup, ResolutionStatus};
use crate::secure::{SecureGuard, SecureStager, backup_path_for};
use bakery_chef::{DeleteStatus, DependencyResolver, RemoteIdentityStore};
use bakery_container::{ContainerEngine, ImageId};
use bakery_core::context::{CHEF_REPO_DIR, SECURE_DIR};
use bakery_core::{BuildContext, ChefMode};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

type StepResult<T> = std::result::Result<T, PipelineError>;

fn at<T>(phase: Phase) -> impl FnOnce(T) -> PipelineError
where
    T: Into<BakeError>,
{
    move |e| PipelineError::new(phase, e)
}

pub struct BuildPipeline<'a> {
    engine: &'a dyn ContainerEngine,
    resolver: &'a dyn DependencyResolver,
    identities: &'a dyn RemoteIdentityStore,
}

/// `Validate` で確定した内容
struct Validated {
    context: BuildContext,
    mode: ChefMode,
    tags: Vec<String>,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        resolver: &'a dyn DependencyResolver,
        identities: &'a dyn RemoteIdentityStore,
    ) -> Self {
        Self {
            engine,
            resolver,
            identities,
        }
    }

    /// `root` 配下の `context_name` をビルド
    pub async fn run(
        &self,
        context_name: &str,
        root: &Path,
        options: &BuildOptions,
    ) -> StepResult<BuildOutcome> {
        let mut warnings = Vec::new();

        let Validated {
            context,
            mode,
            tags,
        } = validate(context_name, root, options).map_err(at(Phase::Validate))?;
        info!("Building {} ({}) from {}", context.name(), mode, context.path().display());

        let resolution = self
            .resolve_dependencies(&context, mode, options, &mut warnings)
            .await
            .map_err(at(Phase::ResolveDependencies))?;

        let guard = match &options.secure_source_dir {
            Some(source) => {
                info!("Staging credentials from {}", source.display());
                let guard = SecureGuard::stage(&context.secure_dir(), source)
                    .map_err(at(Phase::StageSecure))?;
                if guard.state().recovered_backup {
                    warnings.push(Warning::new(
                        Phase::StageSecure,
                        format!(
                            "restored {} left behind by an interrupted build",
                            guard.state().backup_path.display()
                        ),
                    ));
                }
                Some(guard)
            }
            None => None,
        };
        let secure_staged = guard.is_some();

        let built = self.build_and_tag(&context, &tags).await;

        let restored = match guard {
            Some(mut guard) => {
                info!("Restoring {}", context.secure_dir().display());
                guard.restore().map_err(at(Phase::UnstageSecure))
            }
            None => Ok(()),
        };

        let (image_id, applied) = match (built, restored) {
            (Ok(built), Ok(())) => built,
            (Ok(_), Err(restore_err)) => return Err(restore_err),
            (Err(build_err), Ok(())) => return Err(build_err),
            (Err(build_err), Err(restore_err)) => {
                error!("{}", restore_err);
                return Err(build_err);
            }
        };

        let cleanup = self
            .cleanup_remote_identity(&context, mode, options, &mut warnings)
            .await;

        Ok(BuildOutcome {
            context: context.name().to_string(),
            mode,
            resolution,
            secure_staged,
            image_id,
            tags: applied,
            cleanup,
            warnings,
        })
    }

    async fn resolve_dependencies(
        &self,
        context: &BuildContext,
        mode: ChefMode,
        options: &BuildOptions,
        warnings: &mut Vec<Warning>,
    ) -> crate::Result<ResolutionStatus> {
        if !options.run_dependency_resolution {
            debug!("Dependency resolution disabled");
            return Ok(ResolutionStatus::Skipped);
        }
        if !context.has_dependency_manifest() {
            info!("No Berksfile in {}, skipping dependency resolution", context.path().display());
            return Ok(ResolutionStatus::Skipped);
        }
        if !self.resolver.available().await {
            warnings.push(Warning::downgrade(
                Phase::ResolveDependencies,
                &BakeError::DependencyResolutionFailed(
                    "Berkshelf is not installed; cookbooks were not resolved".to_string(),
                ),
            ));
            return Ok(ResolutionStatus::Skipped);
        }

        let workdir = context.path();
        match mode {
            ChefMode::Local => {
                let cookbooks = context.cookbooks_dir();
                if cookbooks.exists() {
                    if !options.force {
                        return Err(BakeError::CookbooksDirectoryExists(cookbooks));
                    }
                    info!("Removing {}", cookbooks.display());
                    std::fs::remove_dir_all(&cookbooks)?;
                }

                self.resolver
                    .install(workdir)
                    .await
                    .map_err(BakeError::from_resolver)?;
                self.resolver
                    .vendor(workdir, &cookbooks, options.force)
                    .await
                    .map_err(BakeError::from_resolver)?;
                Ok(ResolutionStatus::Vendored)
            }
            ChefMode::Server => {
                self.resolver
                    .install(workdir)
                    .await
                    .map_err(BakeError::from_resolver)?;
                self.resolver
                    .upload(
                        workdir,
                        options.force,
                        options.alternate_resolver_config.as_deref(),
                    )
                    .await
                    .map_err(BakeError::from_resolver)?;
                Ok(ResolutionStatus::Uploaded)
            }
        }
    }

    async fn build_and_tag(
        &self,
        context: &BuildContext,
        tags: &[String],
    ) -> StepResult<(ImageId, Vec<String>)> {
        let repository = &context.image().repository;
        let provisional = context.image().with_tag(&tags[0]);

        info!("Building image {}", provisional);
        let image_id = self
            .engine
            .build_from_directory(context.path(), &provisional, &[secure_backup_relative()])
            .await
            .map_err(|e| {
                PipelineError::new(
                    Phase::BuildImage,
                    BakeError::from_engine(e, BakeError::BuildFailed),
                )
            })?;
        debug!("Built {}", image_id);

        let mut applied = Vec::with_capacity(tags.len());
        for tag in tags {
            let target = format!("{}:{}", repository, tag);
            self.engine
                .tag(&image_id, repository, tag)
                .await
                .map_err(|e| {
                    let image = image_id.to_string();
                    let target = target.clone();
                    PipelineError::new(
                        Phase::ApplyTags,
                        BakeError::from_engine(e, move |message| BakeError::TagFailed {
                            image,
                            target,
                            message,
                        }),
                    )
                })?;
            info!("Tagged {} as {}", image_id.short(), target);
            applied.push(target);
        }

        Ok((image_id, applied))
    }

    async fn cleanup_remote_identity(
        &self,
        context: &BuildContext,
        mode: ChefMode,
        options: &BuildOptions,
        warnings: &mut Vec<Warning>,
    ) -> RemoteCleanup {
        if !options.cleanup_remote_identity || mode == ChefMode::Local {
            return RemoteCleanup::skipped();
        }

        let name = match context.node_name() {
            Ok(Some(name)) => name,
            Ok(None) => {
                warnings.push(Warning::downgrade(
                    Phase::CleanupRemoteIdentity,
                    &BakeError::RemoteCleanupFailed {
                        kind: "node and client".to_string(),
                        name: context.name().to_string(),
                        message: format!("no node name recorded in {}", context.node_name_path().display()),
                    },
                ));
                return RemoteCleanup::skipped();
            }
            Err(e) => {
                warnings.push(Warning::downgrade(
                    Phase::CleanupRemoteIdentity,
                    &BakeError::RemoteCleanupFailed {
                        kind: "node and client".to_string(),
                        name: context.name().to_string(),
                        message: e.to_string(),
                    },
                ));
                return RemoteCleanup::skipped();
            }
        };

        info!("Cleaning up Chef Server node and client '{}'", name);
        let node = self.identities.delete_node(&name).await;
        let node = cleanup_status("node", &name, node, warnings);
        let client = self.identities.delete_client(&name).await;
        let client = cleanup_status("client", &name, client, warnings);

        RemoteCleanup {
            identity: Some(name),
            node,
            client,
        }
    }
}

/// ステージング中の `chef/secure.bak` には元の認証情報が入っているので
/// エンジンに送ってはならない
fn secure_backup_relative() -> PathBuf {
    backup_path_for(Path::new(CHEF_REPO_DIR).join(SECURE_DIR).as_path())
}

fn validate(context_name: &str, root: &Path, options: &BuildOptions) -> crate::Result<Validated> {
    let context = BuildContext::for_name(context_name, root)?;
    context.ensure_exists()?;
    let mode = context.detect_mode()?;
    let tags = options.effective_tags()?;

    if let Some(source) = &options.secure_source_dir {
        if mode != ChefMode::Server {
            return Err(BakeError::InvalidSecureDirectory {
                path: source.clone(),
                reason: format!(
                    "credentials are only used by server-mode contexts, {} is {}",
                    context.name(),
                    mode
                ),
            });
        }
        SecureStager::validate_source(source)?;
    }

    if let Some(config) = &options.alternate_resolver_config {
        if !config.is_file() {
            return Err(BakeError::InvalidConfig(format!(
                "Berkshelf config {} does not exist",
                config.display()
            )));
        }
    }

    Ok(Validated {
        context,
        mode,
        tags,
    })
}

fn cleanup_status(
    kind: &str,
    name: &str,
    result: bakery_chef::Result<DeleteStatus>,
    warnings: &mut Vec<Warning>,
) -> CleanupStatus {
    match result {
        Ok(DeleteStatus::Deleted) => {
            info!("Deleted {} '{}'", kind, name);
            CleanupStatus::Deleted
        }
        Ok(DeleteStatus::NotFound) => {
            tracing::warn!("Could not find a {} named '{}' to delete", kind, name);
            CleanupStatus::NotFound
        }
        Err(e) => {
            warnings.push(Warning::downgrade(
                Phase::CleanupRemoteIdentity,
                &BakeError::RemoteCleanupFailed {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    message: e.to_string(),
                },
            ));
            CleanupStatus::Failed
        }
    }
}
