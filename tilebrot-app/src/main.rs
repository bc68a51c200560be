use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use tilebrot_app::{run_script, AppConfig, ScriptStep};

/// Render the Mandelbrot set headlessly, optionally replaying interaction
/// events, and print the final view as a query string.
#[derive(Debug, Parser)]
#[command(name = "tilebrot", version, about)]
struct Cli {
    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Initial view, as `cx=..&cy=..&pp=..&it=..` or a URL carrying it.
    #[arg(long)]
    state: Option<String>,

    /// Interaction step, repeatable: zoom:X,Y drag:DX,DY pan:DX,DY
    /// resize:WxH in out iter+ iter- up down left right reset back forward.
    #[arg(long = "event", value_name = "SPEC")]
    events: Vec<ScriptStep>,

    /// Write the final frame as a PNG.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Config file (defaults to config.json in the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads (defaults to one per logical CPU).
    #[arg(long)]
    workers: Option<usize>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting Tilebrot");

    let mut config = AppConfig::load(cli.config.as_deref());
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    let config = config.sanitized();

    match run_script(&config, cli.state.as_deref(), &cli.events, cli.output.as_deref()) {
        Ok(summary) => {
            info!(frames = summary.frames, history = summary.history_len, "Session finished");
            println!("{}", summary.view.to_query());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
