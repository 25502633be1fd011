//! ndnstream - Publish a live camera stream over NDN
//!
//! Captures the camera with ffmpeg, publishes it with ndnrtc-client and
//! shows a local ffplay preview with live publishing statistics.
//!
//! # Usage
//!
//! ```bash
//! # Publish under the default identity
//! ndnstream publish
//!
//! # Publish under a prefix, signing with a specific identity
//! ndnstream publish /ndn/edu/ucla/studio -i /ndn/edu/ucla/alex -s 640x480 -b 800
//!
//! # Keep the session workspace for inspection
//! ndnstream publish --keep-workspace -v
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use ndnstream_session::{build, CommandRequest, MonitorExit, PublishOptions, Settings};

/// ndnstream - live NDN video publishing
#[derive(Parser, Debug)]
#[command(name = "ndnstream", version, about)]
struct Cli {
    /// Settings file (default: ~/.config/ndnstream/config.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish the camera stream
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
struct PublishArgs {
    /// Publishing prefix (default: the signing identity)
    prefix: Option<String>,

    /// Signing identity; created self-signed if missing
    #[arg(short = 'i', long)]
    identity: Option<String>,

    /// Video size as <width>x<height> (default: 1280x720)
    #[arg(short = 's', long)]
    video_size: Option<String>,

    /// Encoder start bitrate in kbit/s
    #[arg(short = 'b', long)]
    bitrate: Option<u32>,

    /// ndnrtc-client configuration file to start from
    #[arg(short = 'c', long)]
    config_file: Option<PathBuf>,

    /// Publisher instance name
    #[arg(long)]
    instance_name: Option<String>,

    /// Stream name
    #[arg(long)]
    stream_name: Option<String>,

    /// Encoder thread name
    #[arg(long)]
    thread_name: Option<String>,

    /// Debug logging and echo of the preview player's output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Leave the session workspace on disk
    #[arg(long)]
    keep_workspace: bool,
}

impl From<PublishArgs> for PublishOptions {
    fn from(args: PublishArgs) -> Self {
        Self {
            prefix: args.prefix,
            identity: args.identity,
            video_size: args.video_size,
            bitrate: args.bitrate,
            config_file: args.config_file,
            instance_name: args.instance_name,
            stream_name: args.stream_name,
            thread_name: args.thread_name,
            verbose: args.verbose,
            keep_workspace: args.keep_workspace,
        }
    }
}

impl Command {
    fn verbose(&self) -> bool {
        match self {
            Self::Publish(args) => args.verbose,
        }
    }

    fn into_request(self) -> CommandRequest {
        match self {
            Self::Publish(args) => CommandRequest::Publish(args.into()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Session failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (settings, loaded) =
        Settings::load_reported(cli.settings.as_deref()).context("Failed to load settings")?;
    init_logging(&settings, cli.command.verbose())?;
    loaded.log();

    let request = cli.command.into_request();
    let kind = request.kind();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = %kind,
        "ndnstream starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let command = build(request, settings);
    let report = command
        .execute(cancel_token)
        .await
        .with_context(|| format!("{kind} failed"))?;

    if let Some(path) = &report.workspace {
        println!("Workspace kept at {}", path.display());
    }

    Ok(match report.exit {
        MonitorExit::ProcessExited(Some(0)) | MonitorExit::Interrupted => ExitCode::SUCCESS,
        MonitorExit::ProcessExited(_) | MonitorExit::StreamError(_) => ExitCode::FAILURE,
    })
}

/// Crates whose level follows the settings.
const LOG_TARGETS: &[&str] = &["ndnstream", "ndnstream_session", "ndnstream_core"];

fn init_logging(settings: &Settings, verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(settings, verbose)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// `RUST_LOG` directives plus one per crate at the settings level.
///
/// Settings loading resets unknown levels, so a directive parse failure
/// here is a bug rather than bad input.
fn log_filter(settings: &Settings, verbose: bool) -> Result<EnvFilter> {
    let level = if verbose {
        "debug"
    } else {
        settings.session.log_level.as_str()
    };

    let mut filter = EnvFilter::from_default_env();
    for target in LOG_TARGETS {
        let directive = format!("{target}={level}")
            .parse::<Directive>()
            .with_context(|| format!("Invalid log level {level:?}"))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_publish_arguments() {
        let cli = Cli::try_parse_from([
            "ndnstream",
            "publish",
            "/ndn/studio",
            "-i",
            "/ndn/alex",
            "-s",
            "640x480",
            "-b",
            "800",
            "--stream-name",
            "front",
            "-v",
        ])
        .unwrap();

        assert!(cli.command.verbose());
        let CommandRequest::Publish(options) = cli.command.into_request();
        assert_eq!(options.prefix.as_deref(), Some("/ndn/studio"));
        assert_eq!(options.identity.as_deref(), Some("/ndn/alex"));
        assert_eq!(options.video_size.as_deref(), Some("640x480"));
        assert_eq!(options.bitrate, Some(800));
        assert_eq!(options.stream_name.as_deref(), Some("front"));
        assert!(!options.keep_workspace);
    }

    #[test]
    fn test_log_filter_accepts_every_known_level() {
        for level in ndnstream_session::settings::LOG_LEVELS {
            let mut settings = Settings::default();
            settings.session.log_level = level.to_string();
            assert!(log_filter(&settings, false).is_ok(), "{level}");
        }
    }

    #[test]
    fn test_log_filter_after_fallback() {
        let mut settings = Settings::default();
        settings.session.log_level = "verbose".to_string();
        assert!(settings.sanitize_log_level().is_some());
        assert!(log_filter(&settings, false).is_ok());
        assert!(log_filter(&settings, true).is_ok());
    }

    #[test]
    fn test_settings_flag_is_global() {
        let cli = Cli::try_parse_from(["ndnstream", "publish", "--settings", "/tmp/s.toml"]).unwrap();
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.toml")));
    }
}
