//! Workspace - central configuration hub.
//!
//! A Workspace is the project being built: its root directory, the parsed
//! extension manifest, merged configuration, and the build directory
//! layout shared by every operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::Manifest;
use crate::util::config::Config;
use crate::util::GlobalContext;

/// Default build directory name, relative to the project root.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// A workspace containing the manifest and build layout.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Project root (holds the Python package sources)
    root: PathBuf,

    manifest: Manifest,

    config: Config,

    /// Build root (`build/` by default)
    build_root: PathBuf,
}

impl Workspace {
    /// Open the workspace for the current context.
    ///
    /// Uses `manifest_path` when given, otherwise the nearest Extensions.toml
    /// above the working directory, otherwise the bundled manifest with the
    /// working directory as project root.
    pub fn load(ctx: &GlobalContext, manifest_path: Option<&Path>) -> Result<Self> {
        let manifest_path = match manifest_path {
            Some(path) => Some(absolute(ctx.cwd(), path)),
            None => ctx.find_manifest(),
        };

        match manifest_path {
            Some(path) => {
                let manifest = Manifest::load(&path)?;
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .with_context(|| format!("manifest has no parent: {}", path.display()))?;
                tracing::debug!("using manifest {}", path.display());
                Ok(Self::new(ctx, root, manifest))
            }
            None => {
                tracing::debug!("no Extensions.toml found, using the bundled manifest");
                let manifest = Manifest::builtin()?;
                Ok(Self::new(ctx, ctx.cwd().to_path_buf(), manifest))
            }
        }
    }

    fn new(ctx: &GlobalContext, root: PathBuf, manifest: Manifest) -> Self {
        let config = ctx.config_for(&root);
        let build_root = match &config.build.build_dir {
            Some(dir) => absolute(&root, dir),
            None => root.join(DEFAULT_BUILD_DIR),
        };

        Workspace {
            root,
            manifest,
            config,
            build_root,
        }
    }

    /// Use a different build root (relative paths are taken from the project root).
    pub fn with_build_root(mut self, build_root: impl AsRef<Path>) -> Self {
        self.build_root = absolute(&self.root, build_root.as_ref());
        self
    }

    /// Get the project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the build root. Generated wrapper sources live directly under it.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Staged package tree (`build/lib`).
    pub fn lib_dir(&self) -> PathBuf {
        self.build_root.join("lib")
    }

    /// Python package sources (`<root>/kaldi`).
    pub fn package_dir(&self) -> PathBuf {
        self.root.join(&self.manifest.build.package_root)
    }
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::MANIFEST_NAME;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
[build]
package = "demo"
version = "1.0.0"
package_root = "demo"

[[extension]]
name = "core"
module = "demo.core"
sources = ["src/core.cc"]
"#;

    fn context(dir: &Path) -> GlobalContext {
        GlobalContext::with_cwd(dir.to_path_buf()).with_global_config(None)
    }

    #[test]
    fn test_discovers_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), MANIFEST).unwrap();

        let ws = Workspace::load(&context(tmp.path()), None).unwrap();
        assert_eq!(ws.root(), tmp.path());
        assert_eq!(ws.manifest().build.package, "demo");
        assert_eq!(ws.build_root(), tmp.path().join("build"));
        assert_eq!(ws.lib_dir(), tmp.path().join("build/lib"));
        assert_eq!(ws.package_dir(), tmp.path().join("demo"));
    }

    #[test]
    fn test_falls_back_to_bundled_manifest() {
        let tmp = TempDir::new().unwrap();

        let ws = Workspace::load(&context(tmp.path()), None).unwrap();
        assert_eq!(ws.manifest().build.package, "pykaldi");
        assert_eq!(ws.root(), tmp.path());
    }

    #[test]
    fn test_build_dir_from_config_and_override() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), MANIFEST).unwrap();
        std::fs::create_dir_all(tmp.path().join(".kaldiwrap")).unwrap();
        std::fs::write(
            tmp.path().join(".kaldiwrap/config.toml"),
            "[build]\nbuild_dir = \"out\"\n",
        )
        .unwrap();

        let ws = Workspace::load(&context(tmp.path()), None).unwrap();
        assert_eq!(ws.build_root(), tmp.path().join("out"));

        let ws = ws.with_build_root("/tmp/elsewhere");
        assert_eq!(ws.build_root(), Path::new("/tmp/elsewhere"));
    }
}
