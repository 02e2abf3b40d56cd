//! SSS Audio demo (sss-audio-demo) - Main entry point
//!
//! Drives an sss-audio [`Device`] on the virtual backend from a command
//! script, one command per line, read from a file or stdin.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sss_audio::Device;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod script;

use config::DemoConfig;

/// Command-line arguments for sss-audio-demo
#[derive(Parser, Debug)]
#[command(name = "sss-audio-demo")]
#[command(about = "Run audio source/buffer scripts against the virtual backend")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SSS_AUDIO_CONFIG")]
    config: Option<PathBuf>,

    /// Output endpoint to open instead of the default
    #[arg(short, long, env = "SSS_AUDIO_DEVICE")]
    device: Option<String>,

    /// Master volume in percent (0-100)
    #[arg(long, env = "SSS_AUDIO_VOLUME", allow_negative_numbers = true)]
    volume: Option<i32>,

    /// Print the available output endpoints and exit
    #[arg(long)]
    list_devices: bool,

    /// Script file; reads stdin when omitted or "-"
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Priority: command line / environment, then TOML file, then defaults
    let mut config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    if let Some(device) = &args.device {
        config.audio.preferred_endpoint = Some(device.clone());
    }
    if let Some(volume) = args.volume {
        config.audio.master_volume = Some(volume);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Some(path) = &args.config {
        info!("Loaded configuration from {}", path.display());
    }

    let mut device = Device::from_config(&config.audio);

    if args.list_devices {
        for name in device.list_endpoints() {
            println!("{}", name);
        }
        return Ok(());
    }

    let summary = match args.script.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            info!("Running script {}", path.display());
            let file = File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            script::run_script(&mut device, BufReader::new(file))?
        }
        _ => script::run_script(&mut device, io::stdin().lock())?,
    };

    if summary.failed > 0 {
        warn!(
            "Script finished: {} commands executed, {} failed",
            summary.executed, summary.failed
        );
    } else {
        info!("Script finished: {} commands executed", summary.executed);
    }

    device.shutdown();
    Ok(())
}
