//! pabridge CLI - enumerate output devices, check formats and play test tones.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use commands::common::Backend;
use pabridge_config::{BridgeConfig, default_config_path, load_or_default};
use pabridge_io::mock::MockHost;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pabridge")]
#[command(author, version, about = "PortAudio output adapter CLI", long_about = None)]
struct Cli {
    /// Native audio backend
    #[arg(long, value_enum, global = true, default_value_t = Backend::default())]
    backend: Backend,

    /// Configuration file (default: <config dir>/pabridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise the log level (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbosity", action = ArgAction::Count, global = true)]
    verbosity: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List and inspect audio devices
    Devices(commands::devices::DevicesArgs),

    /// Ask whether a device can play a stream format
    Check(commands::check::CheckArgs),

    /// Play a sine test tone
    Tone(commands::tone::ToneArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => load_or_default(&default_config_path())?,
    };
    init_tracing(cli.verbosity, &config);

    match cli.backend {
        Backend::Mock => run(MockHost::virtual_devices(), cli.command, &config),
        #[cfg(feature = "portaudio")]
        Backend::Portaudio => run(
            pabridge_io::portaudio::PortAudioHost::new()?,
            cli.command,
            &config,
        ),
        #[cfg(not(feature = "portaudio"))]
        Backend::Portaudio => anyhow::bail!(
            "pabridge was built without PortAudio support; rebuild with --features portaudio or use --backend mock"
        ),
    }
}

fn run<H: commands::common::Playback>(
    host: H,
    command: Commands,
    config: &BridgeConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Devices(args) => commands::devices::run(host, args, config),
        Commands::Check(args) => commands::check::run(host, args, config),
        Commands::Tone(args) => commands::tone::run(host, args, config),
    }
}

fn init_tracing(verbosity: u8, config: &BridgeConfig) {
    let default = match verbosity {
        0 => config
            .diagnostics
            .log_filter
            .clone()
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    // Logs go to stderr so `devices list --json` stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}
