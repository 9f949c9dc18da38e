use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Camera acquisition settings. `backends` is tried in order at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendKind>,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_input_format")]
    pub input_format: String,
    #[serde(default = "default_capture_fps")]
    pub capture_fps: f64,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
    #[serde(default = "default_poll_fps")]
    pub poll_fps: f64,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_max_frame_age")]
    pub max_frame_age_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External `ffmpeg` process reading a local device, MJPEG on stdout.
    Ffmpeg,
    /// HTTP multipart MJPEG stream.
    Mjpeg,
    /// HTTP endpoint returning one JPEG per request.
    Snapshot,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ffmpeg => "ffmpeg",
            BackendKind::Mjpeg => "mjpeg",
            BackendKind::Snapshot => "snapshot",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_min_area")]
    pub min_area: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_scores_file")]
    pub scores_file: PathBuf,
    #[serde(default = "default_screenshots_dir")]
    pub screenshots_dir: PathBuf,
    #[serde(default = "default_background_file")]
    pub background_file: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Optional TTF/OTF used for hit labels. Built-in digits are used when unset.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: i32,
    #[serde(default = "default_label_scale")]
    pub label_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backends: default_backends(),
            device: default_device(),
            input_format: default_input_format(),
            capture_fps: default_capture_fps(),
            stream_url: default_stream_url(),
            snapshot_url: default_snapshot_url(),
            poll_fps: default_poll_fps(),
            startup_timeout_secs: default_startup_timeout(),
            max_frame_age_ms: default_max_frame_age(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_area: default_min_area(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scores_file: default_scores_file(),
            screenshots_dir: default_screenshots_dir(),
            background_file: default_background_file(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            marker_radius: default_marker_radius(),
            label_scale: default_label_scale(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.backends.is_empty() {
            return Err(ConfigError::Invalid("camera.backends must not be empty".into()));
        }
        if self.camera.poll_fps <= 0.0 || self.camera.capture_fps <= 0.0 {
            return Err(ConfigError::Invalid("camera fps values must be positive".into()));
        }
        if !(1..=100).contains(&self.storage.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "storage.jpeg_quality must be in 1..=100, got {}",
                self.storage.jpeg_quality
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5002
}
fn default_backends() -> Vec<BackendKind> {
    vec![BackendKind::Ffmpeg, BackendKind::Mjpeg, BackendKind::Snapshot]
}
fn default_device() -> String {
    "/dev/video0".into()
}
fn default_input_format() -> String {
    "v4l2".into()
}
fn default_capture_fps() -> f64 {
    15.0
}
fn default_stream_url() -> String {
    "http://127.0.0.1:8080/stream".into()
}
fn default_snapshot_url() -> String {
    "http://127.0.0.1:8080/frame".into()
}
fn default_poll_fps() -> f64 {
    10.0
}
fn default_startup_timeout() -> u64 {
    5
}
fn default_max_frame_age() -> i64 {
    2000
}
fn default_threshold() -> u8 {
    50
}
fn default_min_area() -> f64 {
    50.0
}
fn default_scores_file() -> PathBuf {
    "scores.json".into()
}
fn default_screenshots_dir() -> PathBuf {
    "screenshots".into()
}
fn default_background_file() -> PathBuf {
    "background.jpg".into()
}
fn default_jpeg_quality() -> u8 {
    95
}
fn default_marker_radius() -> i32 {
    12
}
fn default_label_scale() -> f32 {
    21.0
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 5002);
        assert_eq!(config.detection.threshold, 50);
        assert_eq!(config.detection.min_area, 50.0);
        assert_eq!(
            config.camera.backends,
            vec![BackendKind::Ffmpeg, BackendKind::Mjpeg, BackendKind::Snapshot]
        );
        assert_eq!(config.storage.scores_file, PathBuf::from("scores.json"));
        assert!(config.annotation.font_path.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [camera]
            backends = ["snapshot"]
            snapshot_url = "http://cam.local/jpg"

            [detection]
            threshold = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.backends, vec![BackendKind::Snapshot]);
        assert_eq!(config.camera.snapshot_url, "http://cam.local/jpg");
        assert_eq!(config.camera.poll_fps, 10.0);
        assert_eq!(config.detection.threshold, 30);
        assert_eq!(config.detection.min_area, 50.0);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = Config::parse("[camera]\nbackends = [\"gstreamer\"]\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn empty_backend_list_is_rejected() {
        let result = Config::parse("[camera]\nbackends = []\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn jpeg_quality_out_of_range_is_rejected() {
        let result = Config::parse("[storage]\njpeg_quality = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
