//! Implementation of `kaldiwrap clean`.

use anyhow::{bail, Result};

use crate::core::Workspace;
use crate::util::fs::{normalize_path, remove_dir_all_if_exists};

/// Remove the build root. Returns whether anything was removed.
pub fn clean(ws: &Workspace) -> Result<bool> {
    let build_root = ws.build_root();

    // The project must not live under the build root, however it is spelled.
    if normalize_path(ws.root()).starts_with(normalize_path(build_root)) {
        bail!(
            "refusing to remove {}: it contains the project at {}",
            build_root.display(),
            ws.root().display()
        );
    }

    let removed = remove_dir_all_if_exists(build_root)?;
    if removed {
        tracing::info!("removed {}", build_root.display());
    } else {
        tracing::debug!("{} does not exist", build_root.display());
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{workspace_at, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_build_root() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "build/lib/kaldi/_clif.so", "elf");
        let ws = workspace_at(tmp.path());

        assert!(clean(&ws).unwrap());
        assert!(!tmp.path().join("build").exists());
        assert!(!clean(&ws).unwrap());
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "setup.py", "");
        let ws = workspace_at(tmp.path()).with_build_root(tmp.path());

        assert!(clean(&ws).is_err());
        assert!(tmp.path().join("setup.py").is_file());
    }

    #[test]
    fn test_clean_refuses_parent_of_project() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("pykaldi");
        write_file(&project, "setup.py", "");
        let ws = workspace_at(&project).with_build_root(project.join(".."));

        assert!(clean(&ws).is_err());
        assert!(project.join("setup.py").is_file());

        let ws = workspace_at(&project).with_build_root(project.join("build/../.."));
        assert!(clean(&ws).is_err());
        assert!(project.join("setup.py").is_file());
    }
}
