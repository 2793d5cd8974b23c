//! Extensions.toml parsing.
//!
//! The manifest is the hand-authored source of the extension graph:
//! global compile/link settings under `[build]`, the native toolkit
//! libraries under `[native]`, and one `[[extension]]` table per shared
//! object. A copy of the Kaldi bindings manifest ships inside the binary and
//! is used when a project has no manifest of its own.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::errors::BuildError;
use crate::core::graph::ExtensionGraph;
use crate::core::target::{BuildTarget, LinkDep};

/// File name of the manifest.
pub const MANIFEST_NAME: &str = "Extensions.toml";

/// The manifest bundled with kaldiwrap.
pub const BUILTIN_MANIFEST: &str = include_str!("../../Extensions.toml");

/// Parsed Extensions.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub build: BuildSettings,

    #[serde(default)]
    pub native: NativeSettings,

    #[serde(default, rename = "extension")]
    pub extensions: Vec<ExtensionDecl>,
}

/// Settings shared by every extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Distribution name
    pub package: String,

    /// Distribution version, compiled in as `VERSION_INFO`
    pub version: String,

    /// Directory (relative to the project) of the top-level Python package
    #[serde(default = "default_package_root")]
    pub package_root: String,

    /// Extension every other extension links against implicitly
    #[serde(default)]
    pub runtime: Option<String>,

    #[serde(default)]
    pub compile_args: Vec<String>,

    #[serde(default)]
    pub link_args: Vec<String>,

    /// Extra compile arguments in debug builds
    #[serde(default)]
    pub debug_compile_args: Vec<String>,

    /// Extra link arguments in debug builds
    #[serde(default)]
    pub debug_link_args: Vec<String>,

    /// Include directories searched after each extension's own
    #[serde(default)]
    pub include_dirs: Vec<String>,

    /// Library search directories for native libraries
    #[serde(default)]
    pub library_dirs: Vec<String>,

    /// Runtime search paths added to every artifact
    #[serde(default)]
    pub rpaths: Vec<String>,
}

fn default_package_root() -> String {
    "kaldi".to_string()
}

/// Native toolkit libraries that extensions may link against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NativeSettings {
    #[serde(default)]
    pub libraries: Vec<String>,
}

/// One `[[extension]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionDecl {
    pub name: String,
    pub module: String,
    pub sources: Vec<String>,

    #[serde(default)]
    pub include_dirs: Vec<String>,

    /// Extension names or native library names, in link order
    #[serde(default)]
    pub link: Vec<String>,
}

impl Manifest {
    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    /// Parse manifest text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// The manifest bundled with kaldiwrap.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_MANIFEST).context("failed to parse the bundled manifest")
    }

    /// Whether any path in the manifest uses `{placeholder}`.
    pub fn references(&self, placeholder: &str) -> bool {
        let needle = format!("{{{}}}", placeholder);
        let build = &self.build;

        build
            .include_dirs
            .iter()
            .chain(&build.library_dirs)
            .chain(&build.rpaths)
            .chain(self.extensions.iter().flat_map(|e| e.sources.iter()))
            .chain(self.extensions.iter().flat_map(|e| e.include_dirs.iter()))
            .any(|s| s.contains(&needle))
    }

    /// Build and validate the extension graph.
    ///
    /// Each `link` entry is classified as a sibling extension or a native
    /// library. The runtime extension, if any, is appended to every other
    /// extension's link list.
    pub fn to_graph(&self) -> Result<ExtensionGraph, BuildError> {
        let declared: HashSet<&str> = self.extensions.iter().map(|e| e.name.as_str()).collect();
        let natives: HashSet<&str> = self.native.libraries.iter().map(String::as_str).collect();

        if let Some(runtime) = &self.build.runtime {
            if !declared.contains(runtime.as_str()) {
                return Err(BuildError::UnknownTarget {
                    name: runtime.clone(),
                });
            }
        }

        let mut targets = Vec::with_capacity(self.extensions.len());

        for decl in &self.extensions {
            let mut target = BuildTarget::new(&decl.name, &decl.module)?
                .with_sources(&decl.sources)
                .with_include_dirs(&decl.include_dirs);

            for name in &decl.link {
                let dep = if declared.contains(name.as_str()) {
                    LinkDep::Target(name.clone())
                } else if natives.contains(name.as_str()) {
                    LinkDep::Native(name.clone())
                } else {
                    return Err(BuildError::UnknownDependency {
                        target: decl.name.clone(),
                        dependency: name.clone(),
                    });
                };
                target = target.with_link(dep);
            }

            if let Some(runtime) = &self.build.runtime {
                if *runtime != decl.name {
                    target = target.with_link(LinkDep::Target(runtime.clone()));
                }
            }

            targets.push(target);
        }

        ExtensionGraph::new(targets, self.native.libraries.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
[build]
package = "pykaldi"
version = "0.0.1"
runtime = "_clif"

[native]
libraries = ["kaldi-matrix", "kaldi-base"]

[[extension]]
name = "_clif"
module = "kaldi._clif"
sources = ["{clif_dir}/python/runtime.cc"]

[[extension]]
name = "kaldi_vector"
module = "kaldi.matrix.kaldi_vector"
sources = ["{build}/kaldi/matrix/kaldi-vector-clifwrap.cc"]
link = ["matrix_common", "kaldi-matrix"]

[[extension]]
name = "matrix_common"
module = "kaldi.matrix.matrix_common"
sources = ["{build}/kaldi/matrix/matrix-common-clifwrap.cc"]
link = ["kaldi-matrix", "kaldi-base"]
"#;

    #[test]
    fn test_parse_and_classify_links() {
        let manifest = Manifest::parse(SMALL).unwrap();
        assert_eq!(manifest.build.package_root, "kaldi");

        let graph = manifest.to_graph().unwrap();
        let vector = graph.target("kaldi_vector").unwrap();
        assert_eq!(
            vector.link,
            vec![
                LinkDep::Target("matrix_common".into()),
                LinkDep::Native("kaldi-matrix".into()),
                LinkDep::Target("_clif".into()),
            ]
        );

        let runtime = graph.target("_clif").unwrap();
        assert!(runtime.link.is_empty());

        let plan = graph.resolve_order().unwrap();
        assert_eq!(plan.names(), vec!["_clif", "matrix_common", "kaldi_vector"]);
    }

    #[test]
    fn test_unknown_link_name() {
        let text = SMALL.replace(
            "link = [\"kaldi-matrix\", \"kaldi-base\"]",
            "link = [\"kaldi-lm\"]",
        );
        let manifest = Manifest::parse(&text).unwrap();

        let err = manifest.to_graph().unwrap_err();
        assert!(matches!(
            err,
            BuildError::UnknownDependency { ref dependency, .. } if dependency == "kaldi-lm"
        ));
    }

    #[test]
    fn test_runtime_must_be_declared() {
        let text = SMALL.replace("runtime = \"_clif\"", "runtime = \"_pybind\"");
        let manifest = Manifest::parse(&text).unwrap();
        assert!(matches!(
            manifest.to_graph(),
            Err(BuildError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = SMALL.replace("link = [\"kaldi-matrix\", \"kaldi-base\"]", "libs = []");
        assert!(Manifest::parse(&text).is_err());
    }

    #[test]
    fn test_placeholder_references() {
        let manifest = Manifest::parse(SMALL).unwrap();
        assert!(manifest.references("clif_dir"));
        assert!(!manifest.references("numpy_include"));
    }

    #[test]
    fn test_builtin_manifest_resolves() {
        let manifest = Manifest::builtin().unwrap();
        let graph = manifest.to_graph().unwrap();
        assert_eq!(graph.len(), 30);

        let plan = graph.resolve_order().unwrap();
        assert_eq!(plan.names()[0], "_clif");

        for (index, target) in plan.iter().enumerate() {
            for dep in target.target_deps() {
                assert!(plan.position(dep).unwrap() < index);
            }
        }

        let pos = |name| plan.position(name).unwrap();
        assert!(pos("matrix_common") < pos("kaldi_vector"));
        assert!(pos("wave_reader") < pos("kaldi_table"));
        assert!(pos("options_ext") < pos("feature_mfcc"));
        assert!(manifest.references("numpy_include"));
    }
}
