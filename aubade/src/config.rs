//! Configuration for generation, delivery and playback.
//!
//! Everything lives in one TOML file. Every section and every field has a
//! default, so a missing file or a partial file is valid.

use crate::errors::{AubadeError, Result};
use crate::pipeline::SourceQuorum;
use crate::schedule::ObserverLocation;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AubadeConfig {
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Observer location and playback offset.
    pub location: LocationConfig,
    /// Pipeline policy.
    pub pipeline: PipelineConfig,
    /// Greeting length distribution.
    pub composition: CompositionConfig,
    /// Language model server.
    pub ollama: OllamaConfig,
    /// Weather service.
    pub weather: WeatherConfig,
    /// Music library.
    pub navidrome: NavidromeConfig,
    /// Literature catalog.
    pub literature: LiteratureConfig,
    /// Speech renderer.
    pub tts: TtsConfig,
    /// Delivery client.
    pub delivery: DeliveryConfig,
    /// Schedule receiver.
    pub server: ServerConfig,
    /// Playback scheduler.
    pub playback: PlaybackConfig,
}

impl AubadeConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| AubadeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AubadeError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Reads configuration from a file, or uses defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        let lat = self.location.latitude;
        let lon = self.location.longitude;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AubadeError::Config(format!("latitude {lat} is outside -90..=90")));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AubadeError::Config(format!("longitude {lon} is outside -180..=180")));
        }
        if self.delivery.max_attempts == 0 {
            return Err(AubadeError::Config("delivery.max_attempts must be at least 1".to_string()));
        }
        if self.pipeline.literature_attempts == 0 {
            return Err(AubadeError::Config(
                "pipeline.literature_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.album_choices == 0 {
            return Err(AubadeError::Config("pipeline.album_choices must be at least 1".to_string()));
        }
        if self.composition.first_quartile_words >= self.composition.mean_words
            || self.composition.first_quartile_words <= 0.0
        {
            return Err(AubadeError::Config(
                "composition.first_quartile_words must be positive and below mean_words".to_string(),
            ));
        }
        if self.tts.command.is_empty() {
            return Err(AubadeError::Config("tts.command must not be empty".to_string()));
        }
        Ok(())
    }

    /// The source quorum for the generation pipeline.
    #[must_use]
    pub fn quorum(&self) -> SourceQuorum {
        SourceQuorum::new(self.pipeline.min_sources, self.pipeline.require_non_optional)
    }

    /// The observer for sunrise computation.
    #[must_use]
    pub fn observer(&self) -> ObserverLocation {
        ObserverLocation::new(self.location.latitude, self.location.longitude)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root for generation runs (one dated directory per run).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Where the playback node keeps the greeting, references and schedule.
    #[serde(default = "default_playback_dir")]
    pub playback_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_playback_dir() -> PathBuf {
    PathBuf::from("data/playback")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            playback_dir: default_playback_dir(),
        }
    }
}

impl PathsConfig {
    /// Directory holding dated run directories.
    #[must_use]
    pub fn runs_dir(&self) -> PathBuf {
        self.data_dir.join("runs")
    }

    /// The current greeting audio on the playback node.
    #[must_use]
    pub fn greeting_path(&self) -> PathBuf {
        self.playback_dir.join("greeting.wav")
    }

    /// The current references list on the playback node.
    #[must_use]
    pub fn references_path(&self) -> PathBuf {
        self.playback_dir.join("references.txt")
    }

    /// The persisted schedule record.
    #[must_use]
    pub fn schedule_path(&self) -> PathBuf {
        self.playback_dir.join(".playback_schedule")
    }
}

/// Observer location and playback offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Degrees north.
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    /// Degrees east.
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Minutes added to sunrise (may be negative).
    #[serde(default)]
    pub offset_minutes: i64,
}

fn default_latitude() -> f64 {
    42.27
}

fn default_longitude() -> f64 {
    -71.81
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            offset_minutes: 0,
        }
    }
}

/// Pipeline policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source stages that must produce data.
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,
    /// Whether at least one non-optional source must produce data.
    #[serde(default = "default_require_non_optional")]
    pub require_non_optional: bool,
    /// Excerpts fetched and judged before giving up on literature.
    #[serde(default = "default_literature_attempts")]
    pub literature_attempts: usize,
    /// Albums offered to the selection judge.
    #[serde(default = "default_album_choices")]
    pub album_choices: usize,
}

fn default_min_sources() -> usize {
    1
}

fn default_require_non_optional() -> bool {
    true
}

fn default_literature_attempts() -> usize {
    5
}

fn default_album_choices() -> usize {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
            require_non_optional: default_require_non_optional(),
            literature_attempts: default_literature_attempts(),
            album_choices: default_album_choices(),
        }
    }
}

/// Greeting length distribution (words).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Median of the log-normal target length.
    #[serde(default = "default_mean_words")]
    pub mean_words: f64,
    /// First quartile of the target length.
    #[serde(default = "default_first_quartile_words")]
    pub first_quartile_words: f64,
    /// Shortest target length.
    #[serde(default = "default_min_words")]
    pub min_words: u32,
}

fn default_mean_words() -> f64 {
    140.0
}

fn default_first_quartile_words() -> f64 {
    100.0
}

fn default_min_words() -> u32 {
    80
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            mean_words: default_mean_words(),
            first_quartile_words: default_first_quartile_words(),
            min_words: default_min_words(),
        }
    }
}

/// Language model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server base URL.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model for text prompts.
    #[serde(default = "default_text_model")]
    pub model: String,
    /// Model for image description.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_text_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_vision_model() -> String {
    "gemma3:4b".to_string()
}

fn default_ollama_timeout() -> u64 {
    300
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_text_model(),
            vision_model: default_vision_model(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}

impl OllamaConfig {
    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Weather service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// API base URL.
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    /// User-Agent sent with every request (the service requires one).
    #[serde(default = "default_weather_user_agent")]
    pub user_agent: String,
    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_weather_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_weather_user_agent() -> String {
    "aubade-daily-greeting".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            user_agent: default_weather_user_agent(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Music library (Subsonic API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavidromeConfig {
    /// Server base URL.
    #[serde(default = "default_navidrome_url")]
    pub base_url: String,
    /// Account name.
    #[serde(default)]
    pub username: String,
    /// Account password.
    #[serde(default)]
    pub password: String,
    /// Client name reported to the server.
    #[serde(default = "default_navidrome_client")]
    pub client_name: String,
    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_navidrome_url() -> String {
    "http://localhost:4533".to_string()
}

fn default_navidrome_client() -> String {
    "aubade".to_string()
}

impl Default for NavidromeConfig {
    fn default() -> Self {
        Self {
            base_url: default_navidrome_url(),
            username: String::new(),
            password: String::new(),
            client_name: default_navidrome_client(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Literature catalog (Gutendex).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureConfig {
    /// Catalog listing URL.
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Excerpt length in characters before trimming to word boundaries.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Characters skipped at both ends of a book.
    #[serde(default = "default_padding_chars")]
    pub padding_chars: usize,
    /// Rate of the exponential distribution used to pick a catalog page.
    #[serde(default = "default_page_rate")]
    pub page_rate: f64,
    /// Request timeout in seconds.
    #[serde(default = "default_literature_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    "https://gutendex.com/books/".to_string()
}

fn default_excerpt_chars() -> usize {
    600
}

fn default_padding_chars() -> usize {
    2000
}

fn default_page_rate() -> f64 {
    0.05
}

fn default_literature_timeout() -> u64 {
    60
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            excerpt_chars: default_excerpt_chars(),
            padding_chars: default_padding_chars(),
            page_rate: default_page_rate(),
            timeout_secs: default_literature_timeout(),
        }
    }
}

/// Speech renderer command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Command argv; text arrives on stdin, `{output}` is the WAV path.
    #[serde(default = "default_tts_command")]
    pub command: Vec<String>,
    /// Timeout in seconds.
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,
}

fn default_tts_command() -> Vec<String> {
    [
        "piper",
        "--model",
        "models/en_US-ryan-high.onnx",
        "--length_scale",
        "1.15",
        "--output_file",
        "{output}",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_tts_timeout() -> u64 {
    300
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: default_tts_command(),
            timeout_secs: default_tts_timeout(),
        }
    }
}

/// Delivery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Receiver endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Total attempts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// First pause between attempts, in seconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,
    /// Multiplier for later pauses.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:7000/greeting".to_string()
}

fn default_max_attempts() -> usize {
    5
}

fn default_initial_backoff() -> u64 {
    2
}

fn default_backoff_factor() -> u32 {
    2
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_attempts: default_max_attempts(),
            initial_backoff_secs: default_initial_backoff(),
            backoff_factor: default_backoff_factor(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Schedule receiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload")]
    pub max_upload_bytes: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 7000))
}

fn default_max_upload() -> usize {
    64 * 1024 * 1024 // 64MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload(),
        }
    }
}

/// Playback scheduler and device commands.
///
/// Command templates are argv lists. `{file}`, `{volume}` and `{reference}`
/// are replaced before execution. An empty template disables that step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Plays the greeting.
    #[serde(default = "default_play_command")]
    pub play_command: Vec<String>,
    /// Plays a notification cue.
    #[serde(default = "default_cue_command")]
    pub cue_command: Vec<String>,
    /// Stops whatever is playing.
    #[serde(default = "default_stop_command")]
    pub stop_command: Vec<String>,
    /// Sets the output volume.
    #[serde(default = "default_volume_command")]
    pub volume_command: Vec<String>,
    /// Clears the media queue.
    #[serde(default = "default_clear_command")]
    pub clear_queue_command: Vec<String>,
    /// Adds one reference to the media queue.
    #[serde(default = "default_enqueue_command")]
    pub enqueue_command: Vec<String>,
    /// Starts queue playback.
    #[serde(default = "default_start_command")]
    pub start_queue_command: Vec<String>,
    /// Directory of `.wav` notification cues.
    #[serde(default)]
    pub cue_dir: Option<PathBuf>,
    /// Output volume (0-100).
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// Timeout for the greeting, in seconds.
    #[serde(default = "default_play_timeout")]
    pub play_timeout_secs: u64,
    /// Timeout for every other command, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(ToString::to_string).collect()
}

fn default_play_command() -> Vec<String> {
    argv(&["mpv", "--no-video", "{file}"])
}

fn default_cue_command() -> Vec<String> {
    argv(&["aplay", "-d", "10", "{file}"])
}

fn default_stop_command() -> Vec<String> {
    argv(&["mpc", "stop"])
}

fn default_volume_command() -> Vec<String> {
    argv(&["mpc", "volume", "{volume}"])
}

fn default_clear_command() -> Vec<String> {
    argv(&["mpc", "clear"])
}

fn default_enqueue_command() -> Vec<String> {
    argv(&["mpc", "add", "{reference}"])
}

fn default_start_command() -> Vec<String> {
    argv(&["mpc", "play"])
}

fn default_volume() -> u8 {
    70
}

fn default_play_timeout() -> u64 {
    60
}

fn default_command_timeout() -> u64 {
    15
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            play_command: default_play_command(),
            cue_command: default_cue_command(),
            stop_command: default_stop_command(),
            volume_command: default_volume_command(),
            clear_queue_command: default_clear_command(),
            enqueue_command: default_enqueue_command(),
            start_queue_command: default_start_command(),
            cue_dir: None,
            volume: default_volume(),
            play_timeout_secs: default_play_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AubadeConfig::default();
        assert_eq!(config.delivery.max_attempts, 5);
        assert_eq!(config.delivery.initial_backoff_secs, 2);
        assert_eq!(config.server.bind.port(), 7000);
        assert_eq!(config.ollama.model, "llama3.2:3b");
        assert_eq!(config.paths.schedule_path(), PathBuf::from("data/playback/.playback_schedule"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file() {
        let config = AubadeConfig::from_toml(
            r#"
            [location]
            latitude = 51.5
            longitude = -0.12
            offset_minutes = -15

            [pipeline]
            min_sources = 2

            [delivery]
            endpoint = "http://192.168.1.36:7000/greeting"
            "#,
        )
        .unwrap();

        assert_eq!(config.location.offset_minutes, -15);
        assert_eq!(config.pipeline.min_sources, 2);
        assert!(config.pipeline.require_non_optional);
        assert_eq!(config.delivery.endpoint, "http://192.168.1.36:7000/greeting");
        assert_eq!(config.delivery.max_attempts, 5);
        assert_eq!(config.quorum(), SourceQuorum::new(2, true));
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(AubadeConfig::from_toml("[location]\nlatitude = 91.0").is_err());
        assert!(AubadeConfig::from_toml("[location]\nlongitude = -181.0").is_err());
        assert!(AubadeConfig::from_toml("[delivery]\nmax_attempts = 0").is_err());
        assert!(AubadeConfig::from_toml("[pipeline]\nliterature_attempts = 0").is_err());
        assert!(AubadeConfig::from_toml("[tts]\ncommand = []").is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let err = AubadeConfig::from_toml("[location\nlatitude = ").unwrap_err();
        assert!(matches!(err, AubadeError::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AubadeConfig::load_or_default(&dir.path().join("aubade.toml")).unwrap();
        assert_eq!(config.pipeline.literature_attempts, 5);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aubade.toml");
        std::fs::write(&path, "[playback]\nvolume = 40\ncue_dir = \"/srv/chimes\"\n").unwrap();

        let config = AubadeConfig::load_or_default(&path).unwrap();
        assert_eq!(config.playback.volume, 40);
        assert_eq!(config.playback.cue_dir, Some(PathBuf::from("/srv/chimes")));
    }
}
