use super::build::{self, BuildArgs};
use super::rebase::{self, StrategyArg, rebase_options};
use super::{check_context, connect_engine};
use bakery_build::{BuildPipeline, RebasePipeline};
use bakery_chef::Berks;
use bakery_config::Settings;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct RebuildArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    #[command(flatten)]
    pub strategy: StrategyArg,
}

/// 最新のベースへ rebase し、その上で chef を再実行する
pub async fn handle(args: &RebuildArgs, root: &Path, settings: &Settings) -> anyhow::Result<()> {
    let build_args = &args.build;
    check_context(&build_args.name, root)?;
    let build_options = build_args.options(settings);
    let tag = build_options
        .tags
        .first()
        .map(String::as_str)
        .unwrap_or(bakery_core::DEFAULT_TAG);
    let rebase_opts = rebase_options(tag, args.strategy.strategy, settings)?;

    let engine = connect_engine(!build_args.json).await?;
    let berks = Berks::new();
    let knife = build_args.knife(settings);

    if !build_args.json {
        println!("{} {}", "Rebuilding".blue(), build_args.name.cyan());
    }
    let rebased = RebasePipeline::new(&engine)
        .run(&build_args.name, root, &rebase_opts)
        .await?;
    if !build_args.json {
        rebase::report(&rebased);
    }

    let built = BuildPipeline::new(&engine, &berks, &knife)
        .run(&build_args.name, root, &build_options)
        .await?;

    if build_args.json {
        let combined = serde_json::json!({ "rebase": rebased, "build": built });
        println!("{}", serde_json::to_string_pretty(&combined)?);
    } else {
        build::report(&built);
    }
    Ok(())
}
