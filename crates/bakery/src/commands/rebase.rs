use super::{check_context, connect_engine, print_warnings};
use bakery_build::{
    BakeError, Phase, PipelineError, RebaseOptions, RebaseOutcome, RebasePipeline, RebaseStrategy,
};
use bakery_config::Settings;
use bakery_core::ImageReference;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct RebaseArgs {
    /// docker context名 (例: `docker/demo`、タグなし)
    pub name: String,

    /// 最新のベースに付けるタグ
    #[arg(short = 't', long, default_value = "latest")]
    pub tag: String,

    #[command(flatten)]
    pub strategy: StrategyArg,

    /// 結果をJSONで出力
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StrategyArg {
    /// 不要レイヤーの削除方法: history-walk または direct-replace
    #[arg(long = "strategy", default_value = "history-walk")]
    pub strategy: RebaseStrategy,
}

/// `rebase` と `rebuild` 共通のオプション
pub fn rebase_options(
    tag: &str,
    strategy: RebaseStrategy,
    settings: &Settings,
) -> Result<RebaseOptions, PipelineError> {
    let default_base_image = match &settings.default_base_image {
        Some(raw) => Some(ImageReference::parse(raw).map_err(|e| {
            PipelineError::new(
                Phase::DetermineDeclaredBase,
                BakeError::InvalidConfig(format!("default_base_image: {}", e)),
            )
        })?),
        None => None,
    };

    Ok(RebaseOptions {
        strategy,
        tag: tag.to_string(),
        default_base_image,
    })
}

pub async fn handle(args: &RebaseArgs, root: &Path, settings: &Settings) -> anyhow::Result<()> {
    check_context(&args.name, root)?;
    let options = rebase_options(&args.tag, args.strategy.strategy, settings)?;
    let engine = connect_engine(!args.json).await?;

    if !args.json {
        println!("{} {}", "Rebasing".blue(), args.name.cyan());
    }
    let outcome = RebasePipeline::new(&engine)
        .run(&args.name, root, &options)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        report(&outcome);
    }
    Ok(())
}

pub fn report(outcome: &RebaseOutcome) {
    println!(
        "{} {} onto {} ({})",
        "✓ Rebased".green().bold(),
        outcome.target.to_string().cyan(),
        outcome.declared_base.to_string().cyan(),
        outcome.new_base_id.short()
    );
    for id in &outcome.deleted_layers {
        println!("  deleted layer {}", id.short());
    }
    for id in &outcome.skipped_layers {
        println!("  kept layer {} (tagged by another repository)", id.short().dimmed());
    }
    print_warnings(&outcome.warnings);
}
