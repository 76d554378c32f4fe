//! Utility functions for file operations and path manipulation

use crate::error::{Error, Result};
use crate::types::ItemId;
use std::path::{Path, PathBuf};

/// Suffix of the temporary file a write goes through before being renamed
const PARTIAL_SUFFIX: &str = "part";

/// Create `dir` and its parents if missing
///
/// Failure is a setup error: the run cannot proceed without the directory.
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Error::Setup {
            path: dir.to_path_buf(),
            source,
        })
}

/// Write `bytes` to `path` so that the file is either absent or complete
///
/// The data goes to a sibling `.part` file first, which is then renamed over
/// the destination. An existing destination is overwritten.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = partial_path(path);
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Blocking twin of [`write_atomic`] for use inside CPU-bound tasks
pub fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = partial_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// List regular files in `dir` whose extension equals `ext` (case-insensitive),
/// sorted by file name
pub async fn list_inputs(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let setup_err = |source| Error::Setup {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(setup_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(setup_err)? {
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !matches_ext {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Item id encoded in a file stem such as `007.png`
pub fn item_id_from_path(path: &Path) -> Option<ItemId> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<ItemId>().ok())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_dir_creates_nested_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Idempotent
        ensure_dir(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_dir_under_a_file_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("blocker");
        std::fs::write(&file, b"x").unwrap();

        let err = ensure_dir(&file.join("sub")).await.unwrap_err();
        assert!(matches!(err, Error::Setup { .. }), "got {err:?}");
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn write_atomic_overwrites_and_leaves_no_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("001.png");

        write_atomic(&target, b"first").await.unwrap();
        write_atomic(&target, b"second").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert!(!tmp.path().join("001.png.part").exists());
    }

    #[tokio::test]
    async fn write_atomic_into_missing_dir_fails_without_output() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("missing").join("001.png");
        assert!(write_atomic(&target, b"x").await.is_err());
        assert!(!target.exists());
    }

    #[test]
    fn write_atomic_blocking_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("002.png");
        write_atomic_blocking(&target, b"abc").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"abc");
        assert!(!tmp.path().join("002.png.part").exists());
    }

    #[tokio::test]
    async fn list_inputs_filters_by_extension_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["010.png", "002.png", "001.PNG", "003.jpg", "notes.txt"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("dir.png")).unwrap();

        let files = list_inputs(tmp.path(), "png").await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001.PNG", "002.png", "010.png"]);
    }

    #[tokio::test]
    async fn list_inputs_on_missing_dir_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_inputs(&tmp.path().join("nope"), "png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Setup { .. }));
    }

    #[test]
    fn item_id_parsed_from_stem() {
        assert_eq!(item_id_from_path(Path::new("/x/007.png")), Some(ItemId(7)));
        assert_eq!(item_id_from_path(Path::new("150.png")), Some(ItemId(150)));
        assert_eq!(item_id_from_path(Path::new("pikachu.png")), None);
    }
}
