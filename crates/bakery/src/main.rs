mod commands;

use bakery_build::PipelineError;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bakery", version)]
#[command(
    about = "Build Chef-baked Docker images and rebase them onto fresh base images",
    long_about = None
)]
struct Cli {
    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    /// docker contextを置くディレクトリ (デフォルト: ./dockerfiles)
    #[arg(
        short = 'd',
        long = "dockerfiles-path",
        env = "BAKERY_DOCKERFILES_PATH",
        global = true
    )]
    dockerfiles_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// docker contextからイメージをビルド
    Build(commands::build::BuildArgs),
    /// イメージを最新のベースイメージへ載せ替える
    Rebase(commands::rebase::RebaseArgs),
    /// rebase してから最新のベース上で再ビルド
    Rebuild(commands::rebuild::RebuildArgs),
}

fn init_tracing(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        filter = filter.add_directive(tracing::Level::DEBUG.into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        let message = match e.downcast_ref::<PipelineError>() {
            Some(pipeline_err) => pipeline_err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = bakery_config::load()?;
    let root = cli
        .dockerfiles_path
        .unwrap_or_else(|| settings.dockerfiles_path.clone());

    match cli.command {
        Commands::Build(args) => commands::build::handle(&args, &root, &settings).await,
        Commands::Rebase(args) => commands::rebase::handle(&args, &root, &settings).await,
        Commands::Rebuild(args) => commands::rebuild::handle(&args, &root, &settings).await,
    }
}
