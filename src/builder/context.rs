//! Build context - toolchain, settings, and profile for one build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::builder::toolchain::{vars, ToolchainConfig};
use crate::core::errors::BuildError;
use crate::core::manifest::BuildSettings;
use crate::core::target::BuildTarget;
use crate::core::Workspace;

/// `{name}` placeholders in manifest paths.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Placeholders understood by [`BuildContext::expand`].
pub const PLACEHOLDERS: &[&str] = &[
    "project",
    "build",
    "kaldi_dir",
    "kaldi_src",
    "kaldi_lib",
    "clif_dir",
    "numpy_include",
];

/// Build profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    Debug,
    #[default]
    Release,
}

impl Profile {
    /// Value of `CMAKE_BUILD_TYPE` and `--config`.
    pub fn build_type(self) -> &'static str {
        match self {
            Profile::Debug => "Debug",
            Profile::Release => "Release",
        }
    }

    pub fn is_debug(self) -> bool {
        self == Profile::Debug
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.build_type())
    }
}

/// Build context containing toolchain and layout information.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub toolchain: ToolchainConfig,

    /// `[build]` table of the manifest
    pub settings: BuildSettings,

    pub project_root: PathBuf,

    /// Build root; generated wrappers live directly under it
    pub build_root: PathBuf,

    pub profile: Profile,

    /// Parallel jobs for `cmake --build`
    pub jobs: Option<usize>,

    /// CMake generator
    pub generator: Option<String>,
}

impl BuildContext {
    /// Create a build context for a workspace.
    ///
    /// The profile follows `DEBUG`; jobs and generator come from the
    /// workspace configuration.
    pub fn new(ws: &Workspace, toolchain: ToolchainConfig) -> Self {
        let profile = if toolchain.debug {
            Profile::Debug
        } else {
            Profile::Release
        };
        let config = &ws.config().build;

        BuildContext {
            settings: ws.manifest().build.clone(),
            project_root: ws.root().to_path_buf(),
            build_root: ws.build_root().to_path_buf(),
            profile,
            jobs: config.jobs,
            generator: config.generator.clone(),
            toolchain,
        }
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        if jobs.is_some() {
            self.jobs = jobs;
        }
        self
    }

    pub fn is_debug(&self) -> bool {
        self.profile.is_debug()
    }

    /// Staged package tree (`build/lib`).
    pub fn lib_dir(&self) -> PathBuf {
        self.build_root.join("lib")
    }

    /// Scratch directory of one target (`build/temp/<name>`).
    pub fn temp_dir(&self, target: &str) -> PathBuf {
        self.build_root.join("temp").join(target)
    }

    /// Substitute `{placeholder}`s in a manifest string.
    pub fn expand(&self, template: &str) -> Result<String, BuildError> {
        let mut error = None;

        let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
            match self.placeholder(&caps[1]) {
                Ok(value) => value,
                Err(e) => {
                    error.get_or_insert(e);
                    String::new()
                }
            }
        });

        match error {
            Some(e) => Err(e),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Expand a manifest path; relative results are taken from the project root.
    pub fn expand_path(&self, template: &str) -> Result<PathBuf, BuildError> {
        let path = PathBuf::from(self.expand(template)?);
        Ok(if path.is_absolute() {
            path
        } else {
            self.project_root.join(path)
        })
    }

    fn placeholder(&self, name: &str) -> Result<String, BuildError> {
        let show = |p: &Path| p.display().to_string();
        let tc = &self.toolchain;

        match name {
            "project" => Ok(show(&self.project_root)),
            "build" => Ok(show(&self.build_root)),
            "kaldi_dir" => Ok(show(&tc.kaldi_dir)),
            "kaldi_src" => Ok(show(&tc.kaldi_src_dir)),
            "kaldi_lib" => Ok(show(&tc.kaldi_lib_dir)),
            "clif_dir" => Ok(show(&tc.clif_dir)),
            "numpy_include" => tc.numpy_include.as_deref().map(show).ok_or_else(|| {
                BuildError::MissingConfiguration {
                    var: vars::NUMPY_INCLUDE_DIR.to_string(),
                    reason: "is not set and was not queried".to_string(),
                }
            }),
            other => Err(BuildError::InvalidConfiguration {
                var: format!("{{{}}}", other),
                reason: format!("is not a known placeholder (known: {})", PLACEHOLDERS.join(", ")),
            }),
        }
    }

    fn expand_all(&self, templates: &[impl AsRef<str>]) -> Result<Vec<PathBuf>, BuildError> {
        templates
            .iter()
            .map(|t| self.expand_path(t.as_ref()))
            .collect()
    }

    /// Source files of a target, expanded.
    pub fn sources(&self, target: &BuildTarget) -> Result<Vec<PathBuf>, BuildError> {
        let sources: Vec<String> = target
            .sources
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        self.expand_all(&sources)
    }

    /// Include directories of a target: its own first, then the global ones.
    pub fn include_dirs(&self, target: &BuildTarget) -> Result<Vec<PathBuf>, BuildError> {
        let own: Vec<String> = target
            .include_dirs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut dirs = self.expand_all(&own)?;
        for dir in self.expand_all(&self.settings.include_dirs)? {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        Ok(dirs)
    }

    /// Search directories for native libraries.
    pub fn library_dirs(&self) -> Result<Vec<PathBuf>, BuildError> {
        self.expand_all(&self.settings.library_dirs)
    }

    /// Absolute runtime search paths from the manifest.
    pub fn rpaths(&self) -> Result<Vec<PathBuf>, BuildError> {
        self.expand_all(&self.settings.rpaths)
    }

    /// Compile options: manifest arguments, debug extras, then `CXX_FLAGS`.
    pub fn compile_args(&self) -> Vec<String> {
        let mut args = self.settings.compile_args.clone();
        if self.is_debug() {
            args.extend(self.settings.debug_compile_args.iter().cloned());
        }
        args.extend(self.toolchain.cxx_flags.iter().cloned());
        args
    }

    /// Link options: manifest arguments plus debug extras.
    pub fn link_args(&self) -> Vec<String> {
        let mut args = self.settings.link_args.clone();
        if self.is_debug() {
            args.extend(self.settings.debug_link_args.iter().cloned());
        }
        args
    }

    /// `VERSION_INFO="<version>"` preprocessor definition.
    pub fn version_define(&self) -> String {
        format!("VERSION_INFO=\"{}\"", self.settings.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, test_toolchain};

    #[test]
    fn test_expand_placeholders() {
        let ctx = test_context("/work/pykaldi");

        assert_eq!(
            ctx.expand("{kaldi_src}/matrix").unwrap(),
            "/opt/kaldi/src/matrix"
        );
        assert_eq!(
            ctx.expand_path("{build}/kaldi/matrix/x.cc").unwrap(),
            PathBuf::from("/work/pykaldi/build/kaldi/matrix/x.cc")
        );
        assert_eq!(
            ctx.expand_path("kaldi/util").unwrap(),
            PathBuf::from("/work/pykaldi/kaldi/util")
        );
    }

    #[test]
    fn test_unknown_placeholder() {
        let ctx = test_context("/work/pykaldi");
        let err = ctx.expand("{kaldi_root}/src").unwrap_err();
        assert!(err.to_string().contains("{kaldi_root}"));
    }

    #[test]
    fn test_numpy_placeholder_needs_value() {
        let mut ctx = test_context("/work/pykaldi");
        ctx.toolchain.numpy_include = None;

        assert!(matches!(
            ctx.expand("{numpy_include}"),
            Err(BuildError::MissingConfiguration { ref var, .. }) if var == "NUMPY_INCLUDE_DIR"
        ));
    }

    #[test]
    fn test_include_dirs_target_first() {
        let ctx = test_context("/work/pykaldi");
        let target = BuildTarget::new("kaldi_table", "kaldi.util.kaldi_table")
            .unwrap()
            .with_include_dirs(["kaldi/util"]);

        let dirs = ctx.include_dirs(&target).unwrap();
        assert_eq!(dirs[0], PathBuf::from("/work/pykaldi/kaldi/util"));
        assert!(dirs.contains(&PathBuf::from("/opt/kaldi/src")));
    }

    #[test]
    fn test_debug_args() {
        let mut toolchain = test_toolchain();
        toolchain.cxx_flags = vec!["-march=native".to_string()];

        let release = test_context("/p");
        assert!(!release.compile_args().contains(&"-O0".to_string()));

        let mut debug = test_context("/p").with_profile(Profile::Debug);
        debug.toolchain = toolchain;
        let args = debug.compile_args();
        assert!(args.contains(&"-UNDEBUG".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("-march=native"));
        assert_eq!(debug.link_args(), vec!["-O0", "-g"]);
    }

    #[test]
    fn test_version_define() {
        let ctx = test_context("/p");
        assert_eq!(ctx.version_define(), "VERSION_INFO=\"0.0.1\"");
    }
}
