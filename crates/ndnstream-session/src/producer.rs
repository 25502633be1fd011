//! Publisher configuration document.
//!
//! ndnrtc-client reads a libconfig file. A session either loads the
//! operator's file or starts from a built-in template, changes the handful
//! of settings that must point into the workspace, and writes the result
//! next to the pipes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ndnstream_core::VideoSize;
use ndnstream_libconf::{parse, Group, Value};
use tracing::debug;

use crate::error::{Result, SessionError, SetupError};

/// Configuration used when the operator does not supply one.
pub const PRODUCER_TEMPLATE: &str = r#"
general =
{
    log_level = "default";
    log_file = "ndnrtc-client.log";
    log_path = "/tmp";
    use_fec = true;
    use_avsync = true;
    ndnnetwork =
    {
        connect_host = "localhost";
        connect_port = 6363;
    };
};
produce =
{
    streams =
    (
        {
            type = "video";
            name = "camera";
            segment_size = 1000;
            freshness = 2000;
            sync = "sound";
            source =
            {
                name = "/tmp/camera";
                type = "pipe";
            };
            threads =
            (
                {
                    name = "t";
                    coder =
                    {
                        frame_rate = 30;
                        gop = 30;
                        start_bitrate = 1000;
                        max_bitrate = 10000;
                        encode_width = 1280;
                        encode_height = 720;
                        drop_frames = true;
                    };
                }
            );
        }
    );
};
"#;

/// Trust policy that accepts data signed by anyone.
pub const POLICY_ACCEPT_ANY: &str = "validator\n{\n  trust-anchor\n  {\n    type any\n  }\n}\n";

/// Where a configuration document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Template,
    File(PathBuf),
}

impl ConfigSource {
    fn path(&self) -> PathBuf {
        match self {
            Self::Template => PathBuf::from("<built-in template>"),
            Self::File(path) => path.clone(),
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template => f.write_str("built-in template"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Statistics the publisher writes, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatGathering {
    /// Identifier that starts the stat file name
    pub id: String,
    pub statistics: Vec<String>,
}

/// The publisher's libconfig document.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    doc: Group,
    source: ConfigSource,
}

impl ProducerConfig {
    pub fn template() -> Result<Self> {
        Self::parse_str(PRODUCER_TEMPLATE, ConfigSource::Template)
    }

    /// Loads an operator supplied configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| SetupError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse_str(&text, ConfigSource::File(path.to_path_buf()))
    }

    pub fn parse_str(text: &str, source: ConfigSource) -> Result<Self> {
        let doc = parse(text).map_err(|e| SetupError::ConfigParse {
            path: source.path(),
            source: e,
        })?;
        debug!(source = %source, "Loaded producer config");
        Ok(Self { doc, source })
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn is_template(&self) -> bool {
        self.source == ConfigSource::Template
    }

    pub fn document(&self) -> &Group {
        &self.doc
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.stream()?.get("name")?.as_str()
    }

    pub fn thread_name(&self) -> Option<&str> {
        first_group(self.stream()?, "threads")?.get("name")?.as_str()
    }

    /// Points the first stream at the pipe the encoder writes.
    pub fn set_source_pipe(&mut self, pipe: &Path) -> Result<()> {
        let source = &self.source;
        let stream = stream_mut(&mut self.doc).ok_or_else(|| shape_error(source, "produce.streams"))?;
        let input = stream
            .group_entry("source")
            .ok_or_else(|| shape_error(source, "produce.streams.source"))?;
        input.set("name", pipe.to_string_lossy().into_owned());
        Ok(())
    }

    pub fn set_stream_name(&mut self, name: &str) -> Result<()> {
        let source = &self.source;
        stream_mut(&mut self.doc)
            .ok_or_else(|| shape_error(source, "produce.streams"))?
            .set("name", name);
        Ok(())
    }

    pub fn set_thread_name(&mut self, name: &str) -> Result<()> {
        let source = &self.source;
        thread_mut(&mut self.doc)
            .ok_or_else(|| shape_error(source, "produce.streams.threads"))?
            .set("name", name);
        Ok(())
    }

    /// Directs the publisher's logs, including its stat file, to `log_path`.
    pub fn set_logging(&mut self, log_path: &Path, log_level: &str) -> Result<()> {
        let source = &self.source;
        let general = self
            .doc
            .group_entry("general")
            .ok_or_else(|| shape_error(source, "general"))?;
        general.set("log_path", log_path.to_string_lossy().into_owned());
        general.set("log_level", log_level);
        if general.get("log_file").is_none() {
            general.set("log_file", "ndnrtc-client.log");
        }
        Ok(())
    }

    /// Encoder size and start bitrate. Only meaningful for the template.
    pub fn set_coder(&mut self, size: VideoSize, bitrate: Option<u32>) -> Result<()> {
        let source = &self.source;
        let coder = thread_mut(&mut self.doc)
            .and_then(|thread| thread.group_entry("coder"))
            .ok_or_else(|| shape_error(source, "produce.streams.threads.coder"))?;
        coder.set("encode_width", size.width);
        coder.set("encode_height", size.height);
        if let Some(kbps) = bitrate {
            coder.set("start_bitrate", kbps);
        }
        Ok(())
    }

    /// Statistics declared under `produce.stat_gathering`, if any.
    pub fn statistics(&self) -> Option<StatGathering> {
        let produce = self.doc.get("produce")?.as_group()?;
        let gathering = first_group(produce, "stat_gathering")?;
        let id = gathering.get("name")?.as_str()?.to_string();
        let statistics: Vec<String> = gathering
            .get("statistics")?
            .as_items()?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if statistics.is_empty() {
            return None;
        }
        Some(StatGathering { id, statistics })
    }

    /// Returns the declared statistics, declaring `defaults` when there are none.
    pub fn ensure_statistics(&mut self, id: &str, defaults: &[String]) -> Result<StatGathering> {
        if let Some(declared) = self.statistics() {
            return Ok(declared);
        }

        let source = &self.source;
        let produce = self
            .doc
            .group_entry("produce")
            .ok_or_else(|| shape_error(source, "produce"))?;

        let mut gathering = Group::new();
        gathering.set("name", id);
        gathering.set(
            "statistics",
            Value::Array(defaults.iter().map(|s| Value::from(s.as_str())).collect()),
        );
        produce.set("stat_gathering", Value::List(vec![Value::Group(gathering)]));
        debug!(id, count = defaults.len(), "Declared default statistics");

        Ok(StatGathering {
            id: id.to_string(),
            statistics: defaults.to_vec(),
        })
    }

    /// Serializes the document to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.doc.to_string()).map_err(|e| SessionError::resource("config file", path, e))?;
        debug!(path = %path.display(), "Saved producer config");
        Ok(())
    }

    fn stream(&self) -> Option<&Group> {
        first_group(self.doc.get("produce")?.as_group()?, "streams")
    }
}

/// Writes the accept-any trust policy.
pub fn write_policy(path: &Path) -> Result<()> {
    fs::write(path, POLICY_ACCEPT_ANY).map_err(|e| SessionError::resource("policy file", path, e))?;
    debug!(path = %path.display(), "Saved verification policy");
    Ok(())
}

/// Maps a tracing level name onto the publisher's log levels.
pub fn publisher_log_level(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "all",
        "debug" => "debug",
        "off" | "none" => "none",
        _ => "default",
    }
}

fn shape_error(source: &ConfigSource, setting: &str) -> SessionError {
    SetupError::ConfigShape {
        path: source.path(),
        setting: setting.to_string(),
    }
    .into()
}

fn first_group<'a>(group: &'a Group, name: &str) -> Option<&'a Group> {
    group.get(name)?.as_items()?.first()?.as_group()
}

fn first_group_mut<'a>(group: &'a mut Group, name: &str) -> Option<&'a mut Group> {
    group.get_mut(name)?.as_items_mut()?.first_mut()?.as_group_mut()
}

fn stream_mut(doc: &mut Group) -> Option<&mut Group> {
    first_group_mut(doc.get_mut("produce")?.as_group_mut()?, "streams")
}

fn thread_mut(doc: &mut Group) -> Option<&mut Group> {
    first_group_mut(stream_mut(doc)?, "threads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndnstream_libconf::to_string;

    fn source_name(config: &ProducerConfig) -> Option<String> {
        config
            .stream()?
            .get("source")?
            .as_group()?
            .get("name")?
            .as_str()
            .map(str::to_string)
    }

    #[test]
    fn test_template_defaults() {
        let config = ProducerConfig::template().unwrap();
        assert!(config.is_template());
        assert_eq!(config.stream_name(), Some("camera"));
        assert_eq!(config.thread_name(), Some("t"));
        assert!(config.statistics().is_none());
    }

    #[test]
    fn test_template_mutations() {
        let mut config = ProducerConfig::template().unwrap();
        config.set_source_pipe(Path::new("/tmp/ws/camera")).unwrap();
        config.set_stream_name("front").unwrap();
        config.set_thread_name("hd").unwrap();
        config.set_logging(Path::new("/tmp/ws"), "debug").unwrap();
        config.set_coder(VideoSize::new(640, 480), Some(800)).unwrap();

        assert_eq!(source_name(&config).as_deref(), Some("/tmp/ws/camera"));
        assert_eq!(config.stream_name(), Some("front"));
        assert_eq!(config.thread_name(), Some("hd"));

        let text = to_string(config.document());
        assert!(text.contains("log_path = \"/tmp/ws\";"));
        assert!(text.contains("log_level = \"debug\";"));
        assert!(text.contains("encode_width = 640;"));
        assert!(text.contains("encode_height = 480;"));
        assert!(text.contains("start_bitrate = 800;"));

        let reparsed = ProducerConfig::parse_str(&text, ConfigSource::Template).unwrap();
        assert_eq!(reparsed.document(), config.document());
    }

    #[test]
    fn test_user_config_without_statistics_gets_defaults() {
        let text = r#"
            produce = {
                streams = ({ name = "cam"; source = { name = "/dev/null"; type = "pipe"; }; threads = ({ name = "a"; }); });
            };
        "#;
        let mut config = ProducerConfig::parse_str(text, ConfigSource::File("user.cfg".into())).unwrap();
        assert!(!config.is_template());
        assert!(config.statistics().is_none());

        let defaults = vec!["framesCaptured".to_string(), "framesPub".to_string()];
        let gathering = config.ensure_statistics("producer", &defaults).unwrap();
        assert_eq!(gathering.statistics, defaults);
        assert_eq!(config.statistics(), Some(gathering));
        assert_eq!(config.stream_name(), Some("cam"));
    }

    #[test]
    fn test_declared_statistics_win() {
        let text = r#"
            produce = {
                stat_gathering = ({ name = "consumer"; statistics = ["framesPub", "signNum"]; });
                streams = ({ name = "cam"; });
            };
        "#;
        let mut config = ProducerConfig::parse_str(text, ConfigSource::File("user.cfg".into())).unwrap();
        let gathering = config.ensure_statistics("producer", &["bytesPublished".to_string()]).unwrap();
        assert_eq!(gathering.id, "consumer");
        assert_eq!(gathering.statistics, vec!["framesPub", "signNum"]);
    }

    #[test]
    fn test_missing_streams_is_shape_error() {
        let mut config =
            ProducerConfig::parse_str("general = { log_level = \"none\"; };", ConfigSource::File("x.cfg".into()))
                .unwrap();
        let err = config.set_source_pipe(Path::new("/tmp/camera")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Setup(SetupError::ConfigShape { ref setting, .. }) if setting == "produce.streams"
        ));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ProducerConfig::load(&dir.path().join("absent.cfg")).unwrap_err();
        assert!(matches!(missing, SessionError::Setup(SetupError::ConfigRead { .. })));

        let path = dir.path().join("broken.cfg");
        fs::write(&path, "produce = {").unwrap();
        let broken = ProducerConfig::load(&path).unwrap_err();
        assert!(matches!(broken, SessionError::Setup(SetupError::ConfigParse { .. })));
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProducerConfig::template().unwrap();
        let cfg = dir.path().join("producer.cfg");
        config.write(&cfg).unwrap();
        assert!(ProducerConfig::load(&cfg).is_ok());

        let policy = dir.path().join("policy.conf");
        write_policy(&policy).unwrap();
        assert!(fs::read_to_string(&policy).unwrap().contains("type any"));
    }

    #[test]
    fn test_publisher_log_level() {
        assert_eq!(publisher_log_level("info"), "default");
        assert_eq!(publisher_log_level("DEBUG"), "debug");
        assert_eq!(publisher_log_level("trace"), "all");
    }
}
