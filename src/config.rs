use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("Invalid log format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Acoustic WebSocket endpoint
    pub feed_url: String,

    /// Base URL of the vibration analysis REST API
    pub api_base_url: String,

    /// Fixed delay between reconnect attempts
    pub reconnect_delay_ms: u64,

    /// Frames per second for the streaming renderers
    pub frame_rate: u32,

    /// Waveform amplitude scale, 0.0..=1.0
    pub amplitude: f32,

    pub waveform_size: CanvasSize,
    pub spectrogram_size: CanvasSize,
    pub static_size: CanvasSize,

    /// Dark or light palette for the static spectrogram
    pub dark_mode: bool,

    /// Capture every N-th frame of each view when capturing to disk
    pub capture_every: u64,

    /// Default tracing filter, overridden by RUST_LOG
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: crate::feed::DEFAULT_FEED_URL.to_string(),
            api_base_url: crate::api::DEFAULT_BASE_URL.to_string(),
            reconnect_delay_ms: 3000,
            frame_rate: 60,
            amplitude: 1.0,
            waveform_size: CanvasSize::new(800, 300),
            spectrogram_size: CanvasSize::new(800, 400),
            static_size: CanvasSize::new(1200, 600),
            dark_mode: true,
            capture_every: 60,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Where the active settings came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults { reason: String },
}

impl Settings {
    /// Load config from ~/.config/aquaguard-viz/config.toml.
    ///
    /// Falls back to defaults if the file is missing, unreadable or invalid.
    /// Logging is not up yet at this point, so the outcome is returned for the
    /// caller to report.
    pub fn load() -> (Self, ConfigSource) {
        let Some(path) = config_path() else {
            return (
                Self::default(),
                ConfigSource::Defaults {
                    reason: "could not determine config directory".to_string(),
                },
            );
        };

        if !path.exists() {
            return (
                Self::default(),
                ConfigSource::Defaults {
                    reason: format!("no config file at {}", path.display()),
                },
            );
        }

        match Self::load_from(&path) {
            Ok(settings) => (settings, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Defaults {
                    reason: e.to_string(),
                },
            ),
        }
    }

    /// Load and validate an explicit config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(ConfigError::Invalid(format!(
                "amplitude must be within 0.0..=1.0, got {}",
                self.amplitude
            )));
        }
        if self.capture_every == 0 {
            return Err(ConfigError::Invalid("capture_every must be at least 1".into()));
        }
        for (name, size) in [
            ("waveform_size", self.waveform_size),
            ("spectrogram_size", self.spectrogram_size),
            ("static_size", self.static_size),
        ] {
            if size.width == 0 || size.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be non-zero, got {}x{}",
                    name, size.width, size.height
                )));
            }
        }
        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// Get config file path: ~/.config/aquaguard-viz/config.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "aquaguard-viz").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "aquaguard-viz-{}-{}.toml",
            std::process::id(),
            name
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.feed_url, "ws://localhost:8000/ws/acoustic");
        assert_eq!(settings.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(settings.spectrogram_size, CanvasSize::new(800, 400));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = write_temp(
            "partial",
            r#"
feed_url = "ws://sensor-gw:9000/ws/acoustic"
dark_mode = false
log_format = "compact"

[waveform_size]
width = 640
height = 200
"#,
        );

        let settings = Settings::load_from(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.feed_url, "ws://sensor-gw:9000/ws/acoustic");
        assert!(!settings.dark_mode);
        assert_eq!(settings.log_format, LogFormat::Compact);
        assert_eq!(settings.waveform_size, CanvasSize::new(640, 200));
        assert_eq!(settings.frame_rate, 60);
        assert_eq!(settings.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = write_temp("invalid", "amplitude = 1.5\n");
        let err = Settings::load_from(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let settings = Settings {
            frame_rate: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unparsable_file_is_a_parse_error() {
        let path = write_temp("garbage", "frame_rate = \"fast\"\n");
        let err = Settings::load_from(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = Settings::load_from(Path::new("/nonexistent/aquaguard-viz.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_frame_interval() {
        let settings = Settings::default();
        let interval = settings.frame_interval();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("json".parse::<LogFormat>().is_err());
    }
}
