//! Image fixtures and configuration helpers

use batchpipe::{Config, RetryConfig};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Width and height of every generated fixture
pub const FIXTURE_SIZE: u32 = 24;

/// Deterministic PNG whose blue channel is `seed`
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(FIXTURE_SIZE, FIXTURE_SIZE, |x, y| {
        Rgb([(x * 10) as u8, (y * 10) as u8, seed])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode fixture");
    buf
}

/// Small, fast configuration rooted at `root`
///
/// Fetched files go to `root/dataset`, transformed files to `root/processed`.
pub fn test_config(root: &Path, base_url: &str) -> Config {
    let mut config = Config::default();
    config.fetch.base_url = base_url.to_string();
    config.fetch.output_dir = root.join("dataset");
    config.fetch.io_workers = 4;
    config.fetch.retry = RetryConfig {
        max_attempts: 2,
        attempt_timeout: Duration::from_secs(5),
        backoff: Duration::from_millis(5),
        ..RetryConfig::default()
    };
    config.process.input_dir = root.join("dataset");
    config.process.output_dir = root.join("processed");
    config.process.cpu_workers = 2;
    config
}

/// Sorted file names in `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
