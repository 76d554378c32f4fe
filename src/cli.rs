//! Command line arguments for the `batchpipe` binary.
//!
//! Every flag is optional. Values are layered: defaults, then the JSON file
//! given by `--config`, then flags. Directories and worker counts can also come
//! from `BATCHPIPE_*` environment variables.

use crate::config::Config;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Fetch a batch of images, then transform every fetched file
#[derive(Clone, Debug, Default, Parser)]
#[command(name = "batchpipe", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of items to fetch (ids 1..=COUNT)
    #[arg(long, short = 'n')]
    pub count: Option<u32>,

    /// Directory fetched files land in and transforms read from
    #[arg(long, value_name = "DIR", env = "BATCHPIPE_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Directory transformed files are written to
    #[arg(long, value_name = "DIR", env = "BATCHPIPE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Concurrent fetches
    #[arg(long, env = "BATCHPIPE_IO_WORKERS")]
    pub io_workers: Option<usize>,

    /// Parallel transforms (capped at the number of cores)
    #[arg(long, env = "BATCHPIPE_CPU_WORKERS")]
    pub cpu_workers: Option<usize>,

    /// Base URL item locators are resolved against
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Build the run configuration: file (or defaults) with overrides applied
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply every flag that was given on top of `config`
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(count) = self.count {
            config.fetch.item_count = count;
        }
        if let Some(dir) = &self.input_dir {
            config.fetch.output_dir = dir.clone();
            config.process.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.process.output_dir = dir.clone();
        }
        if let Some(n) = self.io_workers {
            config.fetch.io_workers = n;
        }
        if let Some(n) = self.cpu_workers {
            config.process.cpu_workers = n;
        }
        if let Some(url) = &self.base_url {
            config.fetch.base_url = url.clone();
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn no_arguments_keeps_defaults() {
        let args = Args::try_parse_from(["batchpipe"]).unwrap();
        assert_eq!(args.log_level, "info");

        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.fetch.item_count, 150);
        assert_eq!(config.fetch.io_workers, 32);
        assert_eq!(config.process.cpu_workers, 8);
    }

    #[test]
    fn input_dir_feeds_both_phases() {
        let args = Args::try_parse_from([
            "batchpipe",
            "--count",
            "12",
            "--input-dir",
            "/tmp/raw",
            "--output-dir",
            "/tmp/done",
            "--io-workers",
            "4",
            "--cpu-workers",
            "2",
        ])
        .unwrap();

        let mut config = Config::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.fetch.item_count, 12);
        assert_eq!(config.fetch.output_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.process.input_dir, PathBuf::from("/tmp/raw"));
        assert_eq!(config.process.output_dir, PathBuf::from("/tmp/done"));
        assert_eq!(config.fetch.io_workers, 4);
        assert_eq!(config.process.cpu_workers, 2);
    }

    #[test]
    fn zero_workers_fail_validation() {
        let args = Args::try_parse_from(["batchpipe", "--io-workers", "0"]).unwrap();
        assert!(args.load_config().is_err());
    }

    #[test]
    fn config_file_is_layered_under_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("batchpipe.json");
        std::fs::write(&path, r#"{"fetch": {"item_count": 7, "io_workers": 3}}"#).unwrap();

        let args = Args::try_parse_from([
            "batchpipe",
            "--config",
            path.to_str().unwrap(),
            "--io-workers",
            "5",
        ])
        .unwrap();
        let config = args.load_config().unwrap();
        assert_eq!(config.fetch.item_count, 7);
        assert_eq!(config.fetch.io_workers, 5);
    }

    #[test]
    fn only_directories_and_workers_read_the_environment() {
        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .unwrap()
                .get_env()
                .map(|e| e.to_string_lossy().into_owned())
        };

        assert_eq!(env_of("input_dir").as_deref(), Some("BATCHPIPE_INPUT_DIR"));
        assert_eq!(env_of("output_dir").as_deref(), Some("BATCHPIPE_OUTPUT_DIR"));
        assert_eq!(env_of("io_workers").as_deref(), Some("BATCHPIPE_IO_WORKERS"));
        assert_eq!(env_of("cpu_workers").as_deref(), Some("BATCHPIPE_CPU_WORKERS"));
        assert_eq!(env_of("count"), None);
        assert_eq!(env_of("base_url"), None);
    }

    #[test]
    fn rejects_non_numeric_count() {
        assert!(Args::try_parse_from(["batchpipe", "--count", "many"]).is_err());
    }
}
