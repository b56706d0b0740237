//! CLI entry point for multicam.
//!
//! Runs a multi-camera capture session over the simulated pattern bus:
//! spawns one worker per selected source, waits for all of them to become
//! ready, then streams frames into a tiled viewport until the user quits
//! (Ctrl-C), the optional duration expires, or a source fails.
//!
//! # Usage
//!
//! List sources on the bus:
//! ```bash
//! multicam --ls
//! ```
//!
//! Capture three sources at 320x240 for ten seconds:
//! ```bash
//! multicam -c 0 1 2 --width 320 --height 240 --duration 10
//! ```

use anyhow::Result;
use clap::Parser;
use multicam::config::AppConfig;
use multicam::{
    logging, HeadlessSink, PatternProvider, PixelFormat, SourceDescriptor, SourceProvider,
    Supervisor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "multicam")]
#[command(about = "Parallel multi-camera capture with a tiled live view", long_about = None)]
struct Cli {
    /// List available sources and exit
    #[arg(long)]
    ls: bool,

    /// Source indices to capture (omit to use all available)
    #[arg(short = 'c', long = "sources", num_args = 1..)]
    sources: Option<Vec<u32>>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Capture frame rate in frames per second
    #[arg(long)]
    fps: Option<f64>,

    /// Display pixel format (mono8 or bgr8)
    #[arg(long)]
    pixel_format: Option<PixelFormat>,

    /// Stop automatically after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Number of simulated sources on the pattern bus
    #[arg(long, default_value_t = 3)]
    sim_sources: u32,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::default(),
    };
    if let Some(width) = cli.width {
        config.session.frame_width = width;
    }
    if let Some(height) = cli.height {
        config.session.frame_height = height;
    }
    if let Some(format) = cli.pixel_format {
        config.session.display_format = format;
    }

    logging::init(&config.application.log_level, config.application.log_format)?;

    let provider: Arc<dyn SourceProvider> = Arc::new(PatternProvider::new(cli.sim_sources));

    if cli.ls {
        println!("Idx\tSerial");
        for info in provider.enumerate().await? {
            println!("{}\t{}", info.index, info.serial);
        }
        return Ok(());
    }

    let descriptors = select_descriptors(&cli, &config, provider.as_ref()).await?;

    let sink = match cli.duration {
        Some(secs) => HeadlessSink::with_deadline(Duration::from_secs(secs)),
        None => HeadlessSink::new(),
    };
    let quit = sink.quit_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            quit.request();
        }
    });

    let mut supervisor = Supervisor::new(config.session.clone());
    let summary = supervisor.run(provider, descriptors, Arc::new(sink)).await?;

    println!("Done");
    println!("  ticks rendered: {}", summary.ticks);
    for stats in &summary.sources {
        println!("  source {}: {} frames", stats.index, stats.frames);
    }
    if summary.forced_stops > 0 {
        println!("  workers force-stopped: {}", summary.forced_stops);
    }
    Ok(())
}

/// Resolve which sources to capture and with what settings.
///
/// Priority: explicit CLI indices, then enabled config-file sources, then
/// every source the provider enumerates. CLI-selected sources inherit any
/// settings the config file declares for the same index; otherwise the
/// session geometry and rate are forwarded to the provider.
async fn select_descriptors(
    cli: &Cli,
    config: &AppConfig,
    provider: &dyn SourceProvider,
) -> Result<Vec<SourceDescriptor>> {
    let configured = config.enabled_descriptors();

    let indices: Vec<u32> = match &cli.sources {
        Some(indices) => indices.clone(),
        None if !configured.is_empty() => return Ok(configured),
        None => provider
            .enumerate()
            .await?
            .into_iter()
            .map(|info| info.index)
            .collect(),
    };

    Ok(indices
        .into_iter()
        .map(|index| {
            configured
                .iter()
                .find(|descriptor| descriptor.index == index)
                .cloned()
                .unwrap_or_else(|| {
                    SourceDescriptor::new(index, session_settings(cli, config))
                })
        })
        .collect())
}

/// Settings table forwarded to the provider for sources the config file
/// does not describe.
fn session_settings(cli: &Cli, config: &AppConfig) -> toml::Value {
    let mut table = toml::map::Map::new();
    table.insert(
        "width".into(),
        toml::Value::Integer(i64::from(config.session.frame_width)),
    );
    table.insert(
        "height".into(),
        toml::Value::Integer(i64::from(config.session.frame_height)),
    );
    if let Some(fps) = cli.fps {
        table.insert("frame_rate".into(), toml::Value::Float(fps));
    }
    toml::Value::Table(table)
}
