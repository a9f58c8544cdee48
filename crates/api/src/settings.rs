//! Layered settings: TOML file, then `DRIVER_MONITOR__*` environment variables.

use std::path::Path;

use alerting::AlertConfig;
use camera_capture::MediaSource;
use config::{Config, ConfigError, Environment, File};
use dms::{FaceDetectorConfig, PipelineConfig};
use inference_engine::ClassifierConfig;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "DRIVER_MONITOR";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub pipeline: PipelineConfig,
    pub face: FaceDetectorConfig,
    pub classifier: ClassifierConfig,
    pub source: MediaSource,
    pub alert: AlertConfig,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load from an optional file overlaid with process environment variables
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(path, environment())
    }

    /// Load from an optional file overlaid with the given environment source
    pub fn load_layered(path: &Path, environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()?
            .try_deserialize()
    }
}

/// Environment source for `DRIVER_MONITOR__SECTION__KEY=value`
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Interpret a `--source` argument.
///
/// Device nodes and `stub://` names select a camera; anything else is a
/// recorded video path, played in a loop.
pub fn parse_source_arg(arg: &str) -> MediaSource {
    if arg.starts_with("/dev/") || arg.starts_with("stub://") {
        match MediaSource::default() {
            MediaSource::Camera {
                width, height, fps, ..
            } => MediaSource::Camera {
                device: arg.to_string(),
                width,
                height,
                fps,
            },
            other => other,
        }
    } else {
        MediaSource::VideoFile {
            path: arg.into(),
            fps: 15,
            looping: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_defaults_without_file() {
        let settings =
            Settings::load_layered(Path::new("/nonexistent/driver-monitor.toml"), env_from(&[]))
                .unwrap();
        assert_eq!(settings.server.bind, "0.0.0.0:8080");
        assert_eq!(settings.pipeline.confidence_threshold, 0.7);
        assert_eq!(settings.pipeline.sample_interval, 5);
        assert_eq!(settings.alert.interval_ms, 1000);
        assert!(matches!(settings.source, MediaSource::Camera { .. }));
    }

    #[test]
    fn test_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[pipeline]
confidence_threshold = 0.8
sample_interval = 3

[source]
kind = "synthetic"
width = 64
height = 48

[logging]
json = true
"#
        )
        .unwrap();

        let settings = Settings::load_layered(
            file.path(),
            env_from(&[
                ("DRIVER_MONITOR__PIPELINE__CONFIDENCE_THRESHOLD", "0.9"),
                ("DRIVER_MONITOR__SERVER__BIND", "127.0.0.1:9000"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.pipeline.confidence_threshold, 0.9);
        assert_eq!(settings.pipeline.sample_interval, 3);
        assert_eq!(settings.server.bind, "127.0.0.1:9000");
        assert!(settings.logging.json);
        assert!(matches!(
            settings.source,
            MediaSource::Synthetic {
                width: 64,
                height: 48,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_source_arg() {
        assert!(matches!(
            parse_source_arg("/dev/video2"),
            MediaSource::Camera { ref device, width: 640, .. } if device == "/dev/video2"
        ));
        assert!(matches!(
            parse_source_arg("stub://front"),
            MediaSource::Camera { ref device, .. } if device == "stub://front"
        ));
        assert!(matches!(
            parse_source_arg("clips/drive.gif"),
            MediaSource::VideoFile { looping: true, .. }
        ));
    }
}
