pub mod build;
pub mod rebase;
pub mod rebuild;

use bakery_build::{BakeError, Phase, PipelineError, Warning};
use bakery_container::DockerEngine;
use bakery_core::BuildContext;
use colored::Colorize;
use std::path::Path;

/// Dockerに接続する前に不正な名前と存在しない context を弾く
pub fn check_context(name: &str, root: &Path) -> Result<BuildContext, PipelineError> {
    let context =
        BuildContext::for_name(name, root).map_err(|e| PipelineError::new(Phase::Validate, e))?;
    context
        .ensure_exists()
        .map_err(|e| PipelineError::new(Phase::Validate, e))?;
    Ok(context)
}

pub async fn connect_engine(show_progress: bool) -> Result<DockerEngine, PipelineError> {
    let engine = DockerEngine::connect().await.map_err(|e| {
        PipelineError::new(
            Phase::Validate,
            BakeError::from_engine(e, BakeError::EngineUnavailable),
        )
    })?;
    Ok(engine.with_progress(show_progress))
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        println!(
            "  {} [{}] {}",
            "⚠".yellow(),
            warning.phase,
            warning.message.yellow()
        );
    }
}
