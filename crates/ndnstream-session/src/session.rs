//! Publish session orchestration.
//!
//! A session runs in three phases:
//! 1. Setup: video size, workspace, pipes, publisher config, signing
//!    identity and trust policy. Any failure here ends the session before a
//!    single child is started.
//! 2. Run: spawn player, encoder and publisher, follow the publisher's stat
//!    file into the overlay, and watch the player until it exits or the
//!    operator interrupts.
//! 3. Teardown: stop children, stop the tailer, remove the workspace.

use std::path::PathBuf;

use ndnstream_core::{stat_file_name, PublishingPrefix, VideoSize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::identity::{resolve_signing_identity, IdentityStore};
use crate::invocation::{encoder_spec, player_spec, publisher_spec};
use crate::pipe::{create_pipe, DEFAULT_PIPE_MODE, SOURCE_PIPE_MODE};
use crate::producer::{publisher_log_level, write_policy, ProducerConfig, StatGathering};
use crate::settings::Settings;
use crate::supervisor::{monitor_primary, MonitorExit, MonitorOptions, ProcessSupervisor, Role};
use crate::tailer::{OverlayRenderer, StatTailer};
use crate::workspace::Workspace;

/// Publish parameters as given by the operator. `None` means "use the default".
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Base prefix; defaults to the signing identity
    pub prefix: Option<String>,
    pub identity: Option<String>,
    /// `<width>x<height>`
    pub video_size: Option<String>,
    /// Encoder start bitrate in kbit/s
    pub bitrate: Option<u32>,
    pub config_file: Option<PathBuf>,
    pub instance_name: Option<String>,
    pub stream_name: Option<String>,
    pub thread_name: Option<String>,
    pub verbose: bool,
    pub keep_workspace: bool,
}

/// Values resolved during setup and shared by the running session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub video_size: VideoSize,
    pub bitrate: Option<u32>,
    pub signing_identity: String,
    pub prefix: PublishingPrefix,
    pub thread_name: String,
    pub stats: StatGathering,
    pub verbose: bool,
}

impl SessionConfig {
    /// Name of the file the publisher writes statistics to.
    pub fn stat_file_name(&self) -> String {
        stat_file_name(
            &self.stats.id,
            &self.signing_identity,
            self.prefix.instance(),
            self.prefix.stream(),
        )
    }
}

/// Outcome of a session that got past setup.
#[derive(Debug)]
pub struct SessionReport {
    pub exit: MonitorExit,
    /// Full publishing prefix
    pub prefix: String,
    /// Workspace left on disk, when kept
    pub workspace: Option<PathBuf>,
}

/// Setup result handed from the producer step to the rest of the session.
struct ProducerSetup {
    stream: String,
    thread: String,
    stats: StatGathering,
}

/// One publishing session.
pub struct PublishSession<S> {
    settings: Settings,
    options: PublishOptions,
    identities: S,
}

impl<S: IdentityStore> PublishSession<S> {
    pub fn new(settings: Settings, options: PublishOptions, identities: S) -> Self {
        Self {
            settings,
            options,
            identities,
        }
    }

    /// Runs the session until the player exits or `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<SessionReport> {
        let settings = &self.settings;
        let options = &self.options;

        let video_size = match options.video_size.as_deref() {
            Some(requested) => VideoSize::resolve(Some(requested))?,
            None => settings.capture.video_size,
        };
        debug!(video_size = %video_size, "Resolved video size");

        let keep = options.keep_workspace || settings.session.keep_workspace;
        let workspace = Workspace::create(&settings.session.workspace_root, keep)?;
        info!(path = %workspace.path().display(), "Session workspace");

        create_pipe(&workspace.camera_pipe(), SOURCE_PIPE_MODE)?;
        create_pipe(&workspace.preview_pipe(), DEFAULT_PIPE_MODE)?;

        let producer = self.setup_producer(&workspace, video_size)?;

        let identity = resolve_signing_identity(&self.identities, options.identity.as_deref()).await?;
        write_policy(&workspace.policy_file())?;

        let base = options
            .prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&identity);
        let instance = options
            .instance_name
            .as_deref()
            .unwrap_or(&settings.session.instance_name);
        let prefix = PublishingPrefix::new(base, instance, &producer.stream)?;

        info!(prefix = %prefix, "Will publish stream");
        info!(identity = %identity, "Data will be signed using identity");

        let config = SessionConfig {
            video_size,
            bitrate: options.bitrate,
            signing_identity: identity,
            prefix,
            thread_name: producer.thread,
            stats: producer.stats,
            verbose: options.verbose,
        };

        let renderer = OverlayRenderer::new(&config.prefix, config.stats.statistics.clone(), workspace.overlay_file());
        renderer
            .write_initial()
            .await
            .map_err(|e| SessionError::resource("overlay file", workspace.overlay_file(), e))?;

        let mut supervisor = ProcessSupervisor::new(settings.session.shutdown_grace());
        if let Err(e) = self.spawn_children(&mut supervisor, &config, &workspace) {
            warn!(error = %e, "Failed to start session, stopping children");
            supervisor.stop_all().await;
            workspace.close();
            return Err(e);
        }

        let stat_path = workspace.join(&config.stat_file_name());
        debug!(path = %stat_path.display(), "Following publisher statistics");
        let mut tailer = StatTailer::new(settings.session.stat_poll_interval());
        tailer.start(stat_path, renderer);

        let monitor = MonitorOptions {
            echo: config.verbose,
            sink: Some(workspace.log_sink(Role::Player.log_name(), "err")),
        };
        let exit = monitor_primary(&mut supervisor, Role::Player, &monitor, &shutdown).await;

        supervisor.stop_all().await;
        tailer.stop().await;
        let kept = workspace.close();

        info!(reason = %exit, "Completed");
        Ok(SessionReport {
            exit,
            prefix: config.prefix.to_string(),
            workspace: kept,
        })
    }

    /// Builds the publisher config and writes it into the workspace.
    fn setup_producer(&self, workspace: &Workspace, video_size: VideoSize) -> Result<ProducerSetup> {
        let settings = &self.settings;
        let options = &self.options;

        let mut producer = match &options.config_file {
            Some(path) => ProducerConfig::load(path)?,
            None => ProducerConfig::template()?,
        };

        // Names in an operator's file stand unless overridden on the command line.
        let from_file = |name: Option<&str>| name.filter(|_| !producer.is_template()).map(str::to_string);
        let stream = options
            .stream_name
            .clone()
            .or_else(|| from_file(producer.stream_name()))
            .unwrap_or_else(|| settings.session.stream_name.clone());
        let thread = options
            .thread_name
            .clone()
            .or_else(|| from_file(producer.thread_name()))
            .unwrap_or_else(|| settings.session.thread_name.clone());

        producer.set_source_pipe(&workspace.camera_pipe())?;
        producer.set_stream_name(&stream)?;
        producer.set_thread_name(&thread)?;
        producer.set_logging(workspace.path(), publisher_log_level(&settings.session.log_level))?;
        if producer.is_template() {
            producer.set_coder(video_size, options.bitrate)?;
        } else if options.bitrate.is_some() {
            debug!("Bitrate option ignored for operator supplied config");
        }
        let stats = producer.ensure_statistics(&settings.session.stat_file_id, &settings.session.statistics)?;

        producer.write(&workspace.producer_config())?;

        Ok(ProducerSetup { stream, thread, stats })
    }

    fn spawn_children(
        &self,
        supervisor: &mut ProcessSupervisor,
        config: &SessionConfig,
        workspace: &Workspace,
    ) -> Result<()> {
        let tools = &self.settings.tools;

        supervisor.spawn(player_spec(tools, config.video_size, workspace))?;
        supervisor.spawn(encoder_spec(tools, &self.settings.capture, config.video_size, workspace))?;
        supervisor.spawn(publisher_spec(
            tools,
            &config.signing_identity,
            config.prefix.instance(),
            workspace,
        ))?;
        Ok(())
    }
}
