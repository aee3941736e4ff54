use super::{check_context, connect_engine, print_warnings};
use bakery_build::{BuildOptions, BuildOutcome, BuildPipeline, CleanupStatus, ResolutionStatus};
use bakery_chef::{Berks, Knife};
use bakery_config::Settings;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// docker context名 (例: `docker/demo`、タグなし)
    pub name: String,

    /// Berksfileがあっても Berkshelf を実行しない
    #[arg(long)]
    pub no_berks: bool,

    /// server mode のビルドで登録された node と client を残す
    #[arg(long)]
    pub no_cleanup: bool,

    /// 既存の chef/cookbooks を置き換え、アップロード済みの cookbook を上書きする
    #[arg(long)]
    pub force: bool,

    /// ビルド中だけ chef/secure にコピーする認証情報
    #[arg(long, value_name = "DIR")]
    pub secure_dir: Option<PathBuf>,

    /// `berks upload` で使う Berkshelf の設定
    #[arg(long, value_name = "FILE")]
    pub berks_config: Option<PathBuf>,

    /// ビルド後に node と client を削除する knife の設定
    #[arg(long, value_name = "FILE")]
    pub knife_config: Option<PathBuf>,

    /// 付けるタグ (複数指定可、デフォルト: latest)
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// 結果をJSONで出力
    #[arg(long)]
    pub json: bool,
}

impl BuildArgs {
    /// フラグと設定をマージする（フラグが優先）
    pub fn options(&self, settings: &Settings) -> BuildOptions {
        BuildOptions {
            run_dependency_resolution: settings.run_berks && !self.no_berks,
            force: self.force,
            cleanup_remote_identity: settings.cleanup && !self.no_cleanup,
            secure_source_dir: self.secure_dir.clone(),
            alternate_resolver_config: self
                .berks_config
                .clone()
                .or_else(|| settings.berks_config.clone()),
            tags: self.tags.clone(),
        }
    }

    pub fn knife_config(&self, settings: &Settings) -> Option<PathBuf> {
        self.knife_config
            .clone()
            .or_else(|| settings.knife_config.clone())
    }

    pub fn knife(&self, settings: &Settings) -> Knife {
        match self.knife_config(settings) {
            Some(config) => Knife::new().with_config(config),
            None => Knife::new(),
        }
    }
}

pub async fn handle(args: &BuildArgs, root: &Path, settings: &Settings) -> anyhow::Result<()> {
    check_context(&args.name, root)?;
    let engine = connect_engine(!args.json).await?;
    let berks = Berks::new();
    let knife = args.knife(settings);

    if !args.json {
        println!("{} {}", "Building".blue(), args.name.cyan());
    }
    let outcome = BuildPipeline::new(&engine, &berks, &knife)
        .run(&args.name, root, &args.options(settings))
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        report(&outcome);
    }
    Ok(())
}

pub fn report(outcome: &BuildOutcome) {
    println!(
        "{} {} ({}, {})",
        "✓ Built".green().bold(),
        outcome.context.cyan(),
        outcome.image_id.short(),
        outcome.mode
    );
    match outcome.resolution {
        ResolutionStatus::Vendored => println!("  cookbooks vendored into chef/cookbooks"),
        ResolutionStatus::Uploaded => println!("  cookbooks uploaded to the Chef Server"),
        ResolutionStatus::Skipped => {}
    }
    if outcome.secure_staged {
        println!("  secure credentials staged and restored");
    }
    for tag in &outcome.tags {
        println!("  tagged {}", tag.cyan());
    }
    if let Some(identity) = &outcome.cleanup.identity {
        println!(
            "  Chef Server cleanup for '{}': node {}, client {}",
            identity,
            status(outcome.cleanup.node),
            status(outcome.cleanup.client)
        );
    }
    print_warnings(&outcome.warnings);
}

fn status(status: CleanupStatus) -> String {
    match status {
        CleanupStatus::Deleted => "deleted".green().to_string(),
        CleanupStatus::NotFound => "not found".yellow().to_string(),
        CleanupStatus::Failed => "failed".red().to_string(),
        CleanupStatus::Skipped => "skipped".dimmed().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(argv: &[&str]) -> BuildArgs {
        let mut full = vec!["build"];
        full.extend_from_slice(argv);
        Wrapper::parse_from(full).args
    }

    #[test]
    fn test_flags_override_settings() {
        let args = parse(&["docker/demo", "--no-berks", "-t", "v1", "-t", "latest"]);
        let options = args.options(&Settings::default());
        assert!(!options.run_dependency_resolution);
        assert!(options.cleanup_remote_identity);
        assert_eq!(options.tags, vec!["v1", "latest"]);
    }

    #[test]
    fn test_settings_apply_without_flags() {
        let settings = Settings {
            cleanup: false,
            berks_config: Some(PathBuf::from("/etc/berkshelf/config.json")),
            ..Default::default()
        };
        let options = parse(&["docker/demo"]).options(&settings);
        assert!(!options.cleanup_remote_identity);
        assert!(options.run_dependency_resolution);
        assert_eq!(
            options.alternate_resolver_config,
            Some(PathBuf::from("/etc/berkshelf/config.json"))
        );

        let options = parse(&["docker/demo", "--berks-config", "berks.json"]).options(&settings);
        assert_eq!(options.alternate_resolver_config, Some(PathBuf::from("berks.json")));
    }

    #[test]
    fn test_knife_config_flag_wins() {
        let settings = Settings {
            knife_config: Some(PathBuf::from("/etc/chef/knife.rb")),
            ..Default::default()
        };
        assert_eq!(
            parse(&["docker/demo"]).knife_config(&settings),
            Some(PathBuf::from("/etc/chef/knife.rb"))
        );
        assert_eq!(
            parse(&["docker/demo", "--knife-config", "knife.rb"]).knife_config(&settings),
            Some(PathBuf::from("knife.rb"))
        );
        assert_eq!(parse(&["docker/demo"]).knife_config(&Settings::default()), None);
    }
}
