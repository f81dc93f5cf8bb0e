//! File system helpers shared by the resolver, materializer and stores.
//!
//! Writes go through [`atomic_write`] (temp file in the target directory, then rename) so
//! readers never observe a partially written file. Existence checks are a plain `stat`.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ensure a directory exists, creating it and all parents if necessary.
///
/// # Errors
///
/// Fails if the path exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Ensure the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Atomically write bytes to a file.
///
/// The content goes to a uniquely named temporary file next to the target, is synced, and
/// is then renamed over the target. Parent directories are created as needed. Concurrent
/// writers of the same target each use their own temporary file; the last rename wins.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".proji-")
        .suffix(".tmp")
        .tempfile_in(&dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(content)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    temp.as_file().sync_all().context("Failed to sync file to disk")?;
    temp.persist(path)
        .with_context(|| format!("Failed to move temp file into place: {}", path.display()))?;

    Ok(())
}

/// Recursively copy a directory.
///
/// Regular files are copied and directories are recreated; symlinks and other special
/// files are skipped. Existing files in the destination are overwritten.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }

    Ok(())
}

/// Whether `stat` succeeds on the path. Anything that can be stat'ed counts as present.
pub async fn path_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Turn a possibly relative path into an absolute one without touching the filesystem.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .with_context(|| format!("Failed to resolve absolute path for {}", path.display()))
}

/// Lowercase hex SHA-256 of a byte slice.
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("a/b/c");

        assert!(!test_dir.exists());
        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());
        ensure_dir(&test_dir).unwrap();
    }

    #[test]
    fn test_ensure_dir_on_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file.txt");
        fs::write(&file_path, "content").unwrap();

        assert!(ensure_dir(&file_path).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parents_and_replaces() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("nested/dir/file.txt");

        atomic_write(&target, b"first").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "first");

        atomic_write(&target, b"second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");

        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("inner")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("inner/deep.txt"), "deep").unwrap();

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert_eq!(fs::read_to_string(dst.join("inner/deep.txt")).unwrap(), "deep");
    }

    #[tokio::test]
    async fn test_path_exists_for_files_and_dirs() {
        let temp = tempdir().unwrap();
        assert!(path_exists(temp.path()).await);
        assert!(!path_exists(&temp.path().join("missing")).await);

        let file = temp.path().join("f");
        fs::write(&file, "").unwrap();
        assert!(path_exists(&file).await);
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
