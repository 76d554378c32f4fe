//! Configuration types for batchpipe

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Phase A settings: what to fetch, from where, and how hard to try
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL that item locators are joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of items to fetch, ids `1..=item_count` (default: 150)
    #[serde(default = "default_item_count")]
    pub item_count: u32,

    /// File extension of fetched items, without the dot (default: "png")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory fetched files are written to (default: "./pokemon_dataset")
    #[serde(default = "default_dataset_dir")]
    pub output_dir: PathBuf,

    /// Concurrent fetch workers (default: 32)
    #[serde(default = "default_io_workers")]
    pub io_workers: usize,

    /// Retry policy applied to every fetch
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            item_count: default_item_count(),
            extension: default_extension(),
            output_dir: default_dataset_dir(),
            io_workers: default_io_workers(),
            retry: RetryConfig::default(),
        }
    }
}

/// Phase B settings: where transformed files go and how many cores to use
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Directory scanned for input files (default: same as the fetch output)
    #[serde(default = "default_dataset_dir")]
    pub input_dir: PathBuf,

    /// Directory transformed files are written to (default: "./pokemon_processed")
    #[serde(default = "default_processed_dir")]
    pub output_dir: PathBuf,

    /// Parallel transform workers, further capped by available cores (default: 8)
    #[serde(default = "default_cpu_workers")]
    pub cpu_workers: usize,

    /// Filter chain parameters
    #[serde(default)]
    pub transform: TransformParams,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            input_dir: default_dataset_dir(),
            output_dir: default_processed_dir(),
            cpu_workers: default_cpu_workers(),
            transform: TransformParams::default(),
        }
    }
}

/// Retry behavior for fallible operations
///
/// The defaults give a fixed backoff: `backoff_multiplier` of 1.0 and no jitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Time budget for a single attempt (default: 10 seconds)
    #[serde(default = "default_attempt_timeout", with = "duration_serde")]
    pub attempt_timeout: Duration,

    /// Wait between a failed attempt and the next one (default: 1000 ms)
    #[serde(default = "default_backoff", with = "duration_millis_serde")]
    pub backoff: Duration,

    /// Multiplier applied to the wait after every failure (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for the wait between attempts (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Add random jitter to waits (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout: default_attempt_timeout(),
            backoff: default_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

/// Fixed parameters of the image transform chain
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Gaussian blur radius applied first (default: 10)
    #[serde(default = "default_blur_pre")]
    pub blur_radius_pre: f32,

    /// Contrast enhancement factor, 1.0 is identity (default: 1.5)
    #[serde(default = "default_contrast")]
    pub contrast_factor: f32,

    /// Gaussian blur radius applied after inversion (default: 5)
    #[serde(default = "default_blur_post")]
    pub blur_radius_post: f32,

    /// Scale factor of the up-then-down resampling pass (default: 2)
    #[serde(default = "default_upscale")]
    pub upscale_factor: u32,

    /// Encoder quality for lossy formats (default: 95)
    #[serde(default = "default_quality")]
    pub save_quality: u8,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            blur_radius_pre: default_blur_pre(),
            contrast_factor: default_contrast(),
            blur_radius_post: default_blur_post(),
            upscale_factor: default_upscale(),
            save_quality: default_quality(),
        }
    }
}

/// Main configuration for a pipeline run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Phase A (fetch) settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Phase B (transform) settings
    #[serde(default)]
    pub process: ProcessConfig,
}

impl Config {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config("config_file", format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.io_workers == 0 {
            return Err(Error::config("fetch.io_workers", "must be at least 1"));
        }
        if self.process.cpu_workers == 0 {
            return Err(Error::config("process.cpu_workers", "must be at least 1"));
        }
        if self.fetch.retry.max_attempts == 0 {
            return Err(Error::config("fetch.retry.max_attempts", "must be at least 1"));
        }
        if self.fetch.extension.trim_start_matches('.').is_empty() {
            return Err(Error::config("fetch.extension", "must not be empty"));
        }
        if self.fetch.retry.attempt_timeout.is_zero() {
            return Err(Error::config(
                "fetch.retry.attempt_timeout",
                "must be greater than zero",
            ));
        }
        if self.process.transform.upscale_factor == 0 {
            return Err(Error::config(
                "process.transform.upscale_factor",
                "must be at least 1",
            ));
        }
        url::Url::parse(&self.fetch.base_url)
            .map_err(|e| Error::config("fetch.base_url", e.to_string()))?;
        Ok(())
    }

    /// Extension without a leading dot
    pub fn extension(&self) -> &str {
        self.fetch.extension.trim_start_matches('.')
    }
}

fn default_base_url() -> String {
    "https://raw.githubusercontent.com/HybridShivam/Pokemon/master/assets/imagesHQ".to_string()
}

fn default_item_count() -> u32 {
    150
}

fn default_extension() -> String {
    "png".to_string()
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("./pokemon_dataset")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("./pokemon_processed")
}

fn default_io_workers() -> usize {
    32
}

fn default_cpu_workers() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    2
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_blur_pre() -> f32 {
    10.0
}

fn default_contrast() -> f32 {
    1.5
}

fn default_blur_post() -> f32 {
    5.0
}

fn default_upscale() -> u32 {
    2
}

fn default_quality() -> u8 {
    95
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_a_full_run() {
        let config = Config::default();
        assert_eq!(config.fetch.item_count, 150);
        assert_eq!(config.fetch.io_workers, 32);
        assert_eq!(config.process.cpu_workers, 8);
        assert_eq!(config.fetch.retry.max_attempts, 2);
        assert_eq!(config.fetch.retry.attempt_timeout, Duration::from_secs(10));
        assert_eq!(config.fetch.retry.backoff, Duration::from_secs(1));
        assert_eq!(config.process.input_dir, config.fetch.output_dir);
        assert_eq!(
            config.process.transform,
            TransformParams {
                blur_radius_pre: 10.0,
                contrast_factor: 1.5,
                blur_radius_post: 5.0,
                upscale_factor: 2,
                save_quality: 95,
            }
        );
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty object must parse");
        assert_eq!(config.fetch.item_count, 150);
        assert_eq!(config.extension(), "png");
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{
            "fetch": { "item_count": 3, "io_workers": 4, "retry": { "backoff": 250 } },
            "process": { "cpu_workers": 2 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.fetch.item_count, 3);
        assert_eq!(config.fetch.io_workers, 4);
        assert_eq!(config.fetch.retry.backoff, Duration::from_millis(250));
        assert_eq!(
            config.fetch.retry.max_attempts, 2,
            "untouched retry fields keep their defaults"
        );
        assert_eq!(config.process.cpu_workers, 2);
        assert_eq!(config.process.transform.upscale_factor, 2);
    }

    #[test]
    fn durations_serialize_in_declared_units() {
        let json = serde_json::to_value(RetryConfig::default()).unwrap();
        assert_eq!(json["attempt_timeout"], 10);
        assert_eq!(json["backoff"], 1000);
        assert_eq!(json["max_delay"], 60);
    }

    #[test]
    fn validate_rejects_unusable_settings() {
        let mut config = Config::default();
        config.fetch.io_workers = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "fetch.io_workers"
        ));

        let mut config = Config::default();
        config.process.cpu_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.extension = ".".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fetch.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn extension_strips_leading_dot() {
        let mut config = Config::default();
        config.fetch.extension = ".jpg".into();
        assert_eq!(config.extension(), "jpg");
    }

    #[test]
    fn from_json_file_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"fetch":{"item_count":7}}"#).unwrap();
        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.fetch.item_count, 7);
    }
}
