//! Operator settings for ndnstream.
//!
//! Values come from, in order (later wins):
//! 1. Compiled defaults
//! 2. `$XDG_CONFIG_HOME/ndnstream/config.toml`
//! 3. The file passed with `--settings`
//! 4. `NDNSTREAM_*` environment variables
//!
//! Files are merged table by table, so a `--settings` file that only sets
//! `[tools] ffplay` keeps everything else from the user file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ndnstream_core::VideoSize;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SetupError};

/// Name of the settings file under the user config directory.
pub const SETTINGS_FILE: &str = "config.toml";

/// Levels accepted for `session.log_level`.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Level used when `session.log_level` is not one of [`LOG_LEVELS`].
pub const FALLBACK_LOG_LEVEL: &str = "info";

/// Statistics gathered when the publisher config does not declare any.
pub const DEFAULT_STATISTICS: &[&str] = &[
    "framesCaptured",
    "capturedFps",
    "framesEncoded",
    "framesPub",
    "publishRate",
    "bytesPublished",
    "signNum",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tools: ToolSettings,
    pub capture: CaptureSettings,
    pub session: SessionSettings,
}

/// External executables. Bare names are looked up on `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ffmpeg: String,
    pub ffplay: String,
    pub ndnrtc_client: String,
    pub ndnsec: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffplay: "ffplay".to_string(),
            ndnrtc_client: "ndnrtc-client".to_string(),
            ndnsec: "ndnsec".to_string(),
        }
    }
}

/// Camera input handed to the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// ffmpeg input format (`-f`)
    pub input_format: String,
    /// ffmpeg input device (`-i`)
    pub device: String,
    pub framerate: u32,
    /// Extra arguments placed before `-i`, for devices that need them
    pub input_args: Vec<String>,
    /// Video size used when `--video-size` is omitted
    pub video_size: VideoSize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let (input_format, device) = if cfg!(target_os = "macos") {
            ("avfoundation", "0")
        } else {
            ("v4l2", "/dev/video0")
        };
        Self {
            input_format: input_format.to_string(),
            device: device.to_string(),
            framerate: 30,
            input_args: Vec::new(),
            video_size: VideoSize::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Directory under which session workspaces are created
    pub workspace_root: PathBuf,
    pub keep_workspace: bool,
    pub stat_poll_interval_ms: u64,
    pub shutdown_grace_ms: u64,
    /// Default tracing level, also passed to the publisher as its log level
    pub log_level: String,
    pub instance_name: String,
    pub stream_name: String,
    pub thread_name: String,
    /// Identifier of the publisher's stat gathering group
    pub stat_file_id: String,
    pub statistics: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            workspace_root: env::temp_dir(),
            keep_workspace: false,
            stat_poll_interval_ms: 100,
            shutdown_grace_ms: 3000,
            log_level: "info".to_string(),
            instance_name: "instance1".to_string(),
            stream_name: "camera".to_string(),
            thread_name: "t".to_string(),
            stat_file_id: "producer".to_string(),
            statistics: DEFAULT_STATISTICS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SessionSettings {
    pub fn stat_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stat_poll_interval_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Settings {
    /// Returns the user settings path, if a config directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ndnstream").join(SETTINGS_FILE))
    }

    /// Loads settings from files and the process environment.
    ///
    /// An explicit path must exist; the user path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_reported(explicit).map(|(settings, _)| settings)
    }

    /// Like [`Settings::load`], also returning what was applied.
    ///
    /// Loading happens before logging is set up, so callers log the report
    /// once a subscriber exists.
    pub fn load_reported(explicit: Option<&Path>) -> Result<(Self, LoadReport)> {
        let user = Self::default_path().filter(|path| path.exists());
        let files: Vec<&Path> = user.as_deref().into_iter().chain(explicit).collect();

        let mut settings = Self::from_files(&files)?;
        let env_overrides = settings.apply_env_overrides(|key| env::var(key).ok());
        let rejected_log_level = settings.sanitize_log_level();

        let report = LoadReport {
            files: files.iter().map(|p| p.to_path_buf()).collect(),
            env_overrides,
            rejected_log_level,
        };
        Ok((settings, report))
    }

    /// Merges `paths` over the defaults, later files winning per key.
    pub fn from_files(paths: &[&Path]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            merge_tables(&mut merged, read_table(path)?);
        }
        let settings = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| SetupError::Settings {
                path: paths.last().map(|p| p.to_path_buf()).unwrap_or_default(),
                reason: e.to_string(),
            })?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_files(&[path])
    }

    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies `NDNSTREAM_*` overrides using `lookup` to read variables.
    ///
    /// Returns the names of the variables that were applied.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let vars: [(&'static str, &mut String); 5] = [
            ("NDNSTREAM_FFMPEG", &mut self.tools.ffmpeg),
            ("NDNSTREAM_FFPLAY", &mut self.tools.ffplay),
            ("NDNSTREAM_NDNRTC_CLIENT", &mut self.tools.ndnrtc_client),
            ("NDNSTREAM_NDNSEC", &mut self.tools.ndnsec),
            ("NDNSTREAM_LOG_LEVEL", &mut self.session.log_level),
        ];
        for (key, slot) in vars {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *slot = value;
                applied.push(key);
            }
        }
        if let Some(value) = lookup("NDNSTREAM_WORKSPACE_ROOT").filter(|v| !v.is_empty()) {
            self.session.workspace_root = PathBuf::from(value);
            applied.push("NDNSTREAM_WORKSPACE_ROOT");
        }
        applied
    }

    /// Normalizes `session.log_level`, resetting unknown levels to
    /// [`FALLBACK_LOG_LEVEL`].
    ///
    /// Returns the rejected value, if any.
    pub fn sanitize_log_level(&mut self) -> Option<String> {
        let level = self.session.log_level.trim().to_ascii_lowercase();
        let level = if level == "none" { "off".to_string() } else { level };
        if LOG_LEVELS.contains(&level.as_str()) {
            self.session.log_level = level;
            None
        } else {
            Some(std::mem::replace(
                &mut self.session.log_level,
                FALLBACK_LOG_LEVEL.to_string(),
            ))
        }
    }
}

/// What [`Settings::load_reported`] applied on top of the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Settings files merged, in order
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode a value
    pub env_overrides: Vec<&'static str>,
    /// A `log_level` that was replaced by [`FALLBACK_LOG_LEVEL`]
    pub rejected_log_level: Option<String>,
}

impl LoadReport {
    /// Emits the report through `tracing`.
    pub fn log(&self) {
        for path in &self.files {
            debug!(path = %path.display(), "Loaded settings");
        }
        for key in &self.env_overrides {
            debug!(key, "Settings override from environment");
        }
        if let Some(level) = &self.rejected_log_level {
            warn!(
                level = %level,
                fallback = FALLBACK_LOG_LEVEL,
                "Unknown log level in settings, using fallback"
            );
        }
    }
}

/// Reads one settings file, checking it on its own so errors name the file.
fn read_table(path: &Path) -> Result<toml::Table> {
    let settings_error = |reason: String| SetupError::Settings {
        path: path.to_path_buf(),
        reason,
    };
    let contents = std::fs::read_to_string(path).map_err(|e| settings_error(e.to_string()))?;
    Settings::from_toml_str(&contents).map_err(|e| settings_error(e.to_string()))?;
    let table = contents
        .parse::<toml::Table>()
        .map_err(|e| settings_error(e.to_string()))?;
    Ok(table)
}

/// Recursively merges `overlay` into `base`; overlay values win.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
