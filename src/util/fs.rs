//! Filesystem utilities.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Recursively copy a directory, overwriting files that already exist.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Copy one file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst).with_context(|| {
        format!("failed to copy {} to {}", src.display(), dst.display())
    })?;
    Ok(())
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
        return Ok(true);
    }
    Ok(false)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a file only when its contents differ.
///
/// Keeps the modification time of generated build files stable, so CMake
/// does not reconfigure on every run. Returns whether the file was written.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(true)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Resolve `.` and `..` in a path.
///
/// Existing paths are canonicalized, so symlinks are followed too. Paths
/// that do not exist yet are folded lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir_all() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        fs::create_dir_all(src.join("matrix")).unwrap();
        fs::write(src.join("__init__.py"), "").unwrap();
        fs::write(src.join("matrix/kaldi_vector.so"), "elf").unwrap();

        assert_eq!(copy_dir_all(&src, &dst).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(dst.join("matrix/kaldi_vector.so")).unwrap(),
            "elf"
        );
    }

    #[test]
    fn test_write_if_changed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gen/CMakeLists.txt");

        assert!(write_if_changed(&path, "project(x)").unwrap());
        assert!(!write_if_changed(&path, "project(x)").unwrap());
        assert!(write_if_changed(&path, "project(y)").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "project(y)");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/b/lib/kaldi/feat"), Path::new("/b/lib/kaldi/matrix")),
            PathBuf::from("../matrix")
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/nonexistent/kaldiwrap/proj/./build/..")),
            PathBuf::from("/nonexistent/kaldiwrap/proj")
        );
        assert_eq!(
            normalize_path(Path::new("/nonexistent/kaldiwrap/proj/..")),
            PathBuf::from("/nonexistent/kaldiwrap")
        );

        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("proj/build")).unwrap();
        assert_eq!(
            normalize_path(&tmp.path().join("proj/build/..")),
            fs::canonicalize(tmp.path().join("proj")).unwrap()
        );
    }
}
