//! GECR Store - Equipment inventory for the college stores
//! Mission: Sign in, browse equipment by department and keep an audit trail

use anyhow::{Context, Result};
use clap::Parser;
use gecr_store::app::App;
use gecr_store::config::{load_env, normalize_base_path, AppConfig};
use gecr_store::shell::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gecr-store")]
#[command(about = "Equipment inventory dashboard for the terminal")]
struct Args {
    /// Use in-memory demo services even when a backend is configured
    #[arg(long, default_value = "false")]
    demo: bool,

    /// Page to open first
    #[arg(long, default_value = "/")]
    start: String,

    /// Prefix the app is mounted under
    #[arg(long, env = "GECR_BASE_PATH")]
    base_path: Option<String>,

    /// Directory CSV exports are written to
    #[arg(long, env = "GECR_EXPORT_DIR")]
    export_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if args.demo {
        config.supabase_url = None;
        config.supabase_anon_key = None;
    }
    if let Some(base) = args.base_path.as_deref() {
        config.base_path = normalize_base_path(base);
    }
    if let Some(dir) = args.export_dir {
        config.export_dir = dir;
    }

    info!("🚀 GECR Store starting (demo: {})", config.is_demo());

    let app = Arc::new(App::from_config(config, &args.start).context("Failed to start app")?);
    let mut shell = Shell::new(app.clone());
    app.start().await;

    let mut stdout = tokio::io::stdout();
    let result = shell.run(BufReader::new(tokio::io::stdin()), &mut stdout).await;

    app.shutdown();
    info!("👋 GECR Store stopped");
    result
}

/// Logs go to stderr so they never interleave with the rendered pages.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gecr_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
