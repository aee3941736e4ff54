//! rebase パイプライン
//!
//! 記録されたベースより上のレイヤーを捨て、chef を再実行せずに
//! 最新の pull 済みベースへ置き換える:
//!
//! ベース決定 -> 旧ベースID取得 -> pull -> 不要レイヤー削除
//! -> 最新のベースにターゲット名でタグ付け
//!
//! 旧ベースIDは pull より前に取得すること（pull でベースのタグが
//! 新しいイメージへ移る）

use crate::error::{BakeError, Phase, PipelineError, Warning};
use crate::options::{DEFAULT_BASE_IMAGE, RebaseOptions, RebaseStrategy};
use crate::outcome::{BaseSource, RebaseOutcome};
use bakery_container::{ContainerEngine, ContainerError, HistoryEntry, ImageId};
use bakery_core::{BuildContext, CoreError, ImageReference, split_image_tag, validate_tag};
use std::path::Path;
use tracing::{debug, info};

type StepResult<T> = std::result::Result<T, PipelineError>;

/// 削除するレイヤー（新しい順）と、他のリポジトリが参照しているため
/// 残すレイヤー
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerPlan {
    pub delete: Vec<ImageId>,
    pub skip: Vec<ImageId>,
}

/// `history` を先頭から `old_base` まで辿る
///
/// 最初に現れる `old_base` より前のエントリはすべて削除対象。ただし
/// `<missing>` と、`repository` 以外のリポジトリのタグが付いたものは除く。
/// `old_base` とそれ以降には触れない。
/// `old_base` が見つからなければ `None`
pub fn plan_history_walk(
    history: &[HistoryEntry],
    old_base: &ImageId,
    repository: &str,
) -> Option<LayerPlan> {
    let sentinel = history.iter().position(|entry| &entry.id == old_base)?;

    let mut plan = LayerPlan::default();
    for entry in &history[..sentinel] {
        if entry.is_missing() {
            continue;
        }
        let foreign = entry
            .tags
            .iter()
            .any(|tag| split_image_tag(tag).0 != repository);
        if foreign {
            plan.skip.push(entry.id.clone());
        } else if !plan.delete.contains(&entry.id) {
            plan.delete.push(entry.id.clone());
        }
    }
    Some(plan)
}

pub struct RebasePipeline<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> RebasePipeline<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    pub async fn run(
        &self,
        context_name: &str,
        root: &Path,
        options: &RebaseOptions,
    ) -> StepResult<RebaseOutcome> {
        let mut warnings = Vec::new();
        let phase = Phase::DetermineDeclaredBase;

        let context = BuildContext::for_name(context_name, root)
            .and_then(|c| c.ensure_exists().map(|_| c))
            .map_err(|e| PipelineError::new(phase, e))?;
        validate_tag(&options.tag).map_err(|e| PipelineError::new(phase, e))?;
        let target = context.image().with_tag(&options.tag);

        let (declared, base_source) = declared_base(&context, options, &mut warnings)
            .map_err(|e| PipelineError::new(phase, e))?;
        info!("Rebasing {} onto {} ({:?})", target, declared, base_source);

        let phase = Phase::PullFreshBase;
        let old_base_id = self
            .lookup(&declared.to_string())
            .await
            .map_err(|e| PipelineError::new(phase, e))?;
        let current_id = self
            .lookup(&target.to_string())
            .await
            .map_err(|e| PipelineError::new(phase, e))?;

        info!("Pulling {}", declared);
        let new_base_id = self.engine.pull(&declared).await.map_err(|e| {
            let image = declared.to_string();
            PipelineError::new(
                phase,
                BakeError::from_engine(e, |message| BakeError::PullFailed { image, message }),
            )
        })?;
        debug!("{} is now {}", declared, new_base_id);

        let phase = Phase::ReconcileLayers;
        let (deleted_layers, skipped_layers) = match (current_id, options.strategy) {
            (None, _) => {
                info!("{} does not exist yet, nothing to delete", target);
                (Vec::new(), Vec::new())
            }
            (Some(current), RebaseStrategy::HistoryWalk) => {
                let old_base = old_base_id.clone().ok_or_else(|| {
                    PipelineError::new(
                        phase,
                        BakeError::BaseNotInHistory {
                            image: target.to_string(),
                            base: declared.to_string(),
                            base_id: "<not present locally>".to_string(),
                        },
                    )
                })?;
                let history = self.engine.history(&current).await.map_err(|e| {
                    PipelineError::new(
                        phase,
                        BakeError::from_engine(e, |message| BakeError::LayerDeleteFailed {
                            id: current.to_string(),
                            message,
                        }),
                    )
                })?;
                let plan = plan_history_walk(&history, &old_base, &target.repository)
                    .ok_or_else(|| {
                        PipelineError::new(
                            phase,
                            BakeError::BaseNotInHistory {
                                image: target.to_string(),
                                base: declared.to_string(),
                                base_id: old_base.to_string(),
                            },
                        )
                    })?;
                for id in &plan.skip {
                    info!("Keeping layer {}, it is tagged by another repository", id.short());
                }
                let deleted = self.delete_layers(&plan.delete, &mut warnings).await?;
                (deleted, plan.skip)
            }
            (Some(current), RebaseStrategy::DirectReplace) => {
                if old_base_id.as_ref() == Some(&current) {
                    (Vec::new(), Vec::new())
                } else {
                    let deleted = self
                        .delete_layers(std::slice::from_ref(&current), &mut warnings)
                        .await?;
                    (deleted, Vec::new())
                }
            }
        };

        let phase = Phase::RetagAsTarget;
        self.engine
            .tag(&new_base_id, &target.repository, &target.tag)
            .await
            .map_err(|e| {
                let image = new_base_id.to_string();
                let target = target.to_string();
                PipelineError::new(
                    phase,
                    BakeError::from_engine(e, |message| BakeError::TagFailed {
                        image,
                        target,
                        message,
                    }),
                )
            })?;
        info!("Tagged {} as {}", new_base_id.short(), target);

        Ok(RebaseOutcome {
            target,
            declared_base: declared,
            base_source,
            old_base_id,
            new_base_id,
            strategy: options.strategy,
            deleted_layers,
            skipped_layers,
            warnings,
        })
    }

    /// `reference` をIDに解決する。イメージがなければ `None`
    async fn lookup(&self, reference: &str) -> crate::Result<Option<ImageId>> {
        match self.engine.get(reference).await {
            Ok(handle) => Ok(Some(handle.id)),
            Err(ContainerError::ImageNotFound { .. }) => Ok(None),
            Err(e) => Err(BakeError::from_engine(e, |message| BakeError::PullFailed {
                image: reference.to_string(),
                message,
            })),
        }
    }

    /// `ids` を順に削除する。エンジンとの接続断以外の失敗は
    /// 警告として記録
    async fn delete_layers(
        &self,
        ids: &[ImageId],
        warnings: &mut Vec<Warning>,
    ) -> StepResult<Vec<ImageId>> {
        let mut deleted = Vec::new();
        for id in ids {
            match self.engine.remove(id).await {
                Ok(()) => {
                    info!("Deleted layer {}", id.short());
                    deleted.push(id.clone());
                }
                // 子を消すとタグのない親も一緒に消える
                Err(ContainerError::ImageNotFound { .. }) => {
                    debug!("Layer {} is already gone", id.short());
                    deleted.push(id.clone());
                }
                Err(e) if e.is_connection_failure() => {
                    return Err(PipelineError::new(
                        Phase::ReconcileLayers,
                        BakeError::EngineUnavailable(e.to_string()),
                    ));
                }
                Err(e) => {
                    warnings.push(Warning::downgrade(
                        Phase::ReconcileLayers,
                        &BakeError::LayerDeleteFailed {
                            id: id.to_string(),
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }
        Ok(deleted)
    }
}

/// `# BASE` 行、設定のデフォルト、組み込みのデフォルトの順
fn declared_base(
    context: &BuildContext,
    options: &RebaseOptions,
    warnings: &mut Vec<Warning>,
) -> crate::Result<(ImageReference, BaseSource)> {
    match context.base_image() {
        Ok(image) => Ok((image, BaseSource::Recorded)),
        Err(CoreError::MissingBaseAnnotation(dockerfile)) => {
            let (image, source) = match &options.default_base_image {
                Some(image) => (image.clone(), BaseSource::Configured),
                None => (ImageReference::parse(DEFAULT_BASE_IMAGE)?, BaseSource::Default),
            };
            warnings.push(Warning::downgrade(
                Phase::DetermineDeclaredBase,
                &BakeError::MissingBaseAnnotation(dockerfile),
            ));
            Ok((image, source))
        }
        Err(e) => Err(e.into()),
    }
}
