//! Stylesheet build
//!
//! Compiles the SCSS entry file into the report template stylesheet:
//! read, (sourcemap init), SCSS, autoprefix, clean-css, (sourcemap write),
//! then an atomic write of the result.

mod profile;
mod sourcemap;
mod stage;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use lightningcss::targets::{Browsers, Targets};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cli::BuildMode;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::server::{ReloadChannel, ReloadMessage};
use crate::utils::{format_duration, hash_content, relative_path};

pub use profile::{CleanCssProfile, OutputFormat};
pub use sourcemap::SourceMapSidecar;
pub use stage::{Autoprefix, CleanCss, CompileScss, InitSourceMaps, Stage, Stream, WriteSourceMaps};

/// Outcome of one stylesheet build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Output file path
    pub output_path: PathBuf,

    /// Stylesheet size in bytes
    pub size: usize,

    /// Content hash of the stylesheet
    pub hash: String,

    /// False when the output already held identical bytes
    pub written: bool,

    /// Whether a sourcemap comment was embedded
    pub sourcemap: bool,
}

/// The stylesheet pipeline for one entry file
pub struct CssPipeline {
    root: PathBuf,
    entry: PathBuf,
    output: PathBuf,
    mode: BuildMode,
    targets: Targets,
    reload: ReloadChannel,
}

impl CssPipeline {
    /// Create a pipeline for the configured entry and output
    pub fn with_browsers(
        config: &Config,
        mode: BuildMode,
        browsers: Option<Browsers>,
        reload: ReloadChannel,
    ) -> Self {
        Self {
            root: config.root.clone(),
            entry: config.entry_path(),
            output: config.output_path(),
            mode,
            targets: Targets {
                browsers,
                ..Targets::default()
            },
            reload,
        }
    }

    /// Stages in run order for the current mode
    fn stages(&self) -> Vec<Box<dyn Stage>> {
        let mut stages: Vec<Box<dyn Stage>> = Vec::new();

        if self.mode.emits_sourcemap() {
            let entry = relative_path(&self.root, &self.entry)
                .unwrap_or_else(|| self.entry.display().to_string());
            stages.push(Box::new(InitSourceMaps {
                project_root: self.root.display().to_string(),
                source_name: compiled_source_name(&entry),
            }));
        }

        stages.push(Box::new(CompileScss));
        stages.push(Box::new(Autoprefix {
            targets: self.targets,
        }));
        stages.push(Box::new(CleanCss {
            profile: CleanCssProfile::for_mode(self.mode),
            targets: self.targets,
        }));

        if self.mode.emits_sourcemap() {
            stages.push(Box::new(WriteSourceMaps));
        }

        stages
    }

    /// Run every stage and return the final stylesheet without writing it
    pub fn compile(&self) -> Result<String> {
        let source = fs::read_to_string(&self.entry).map_err(|e| Error::io(&self.entry, e))?;
        let mut stream = Stream::new(self.entry.clone(), source);

        for stage in self.stages() {
            let start = Instant::now();
            stream = stage.apply(stream)?;
            debug!("Stage '{}' done in {}", stage.name(), format_duration(start.elapsed()));
        }

        Ok(stream.contents)
    }

    /// Build the stylesheet, write it, and notify connected browsers
    pub fn build_css(&self) -> Result<BuildReport> {
        let css = self.compile()?;
        let written = write_if_changed(&self.output, css.as_bytes())?;

        let report = BuildReport {
            output_path: self.output.clone(),
            size: css.len(),
            hash: hash_content(css.as_bytes()),
            written,
            sourcemap: self.mode.emits_sourcemap(),
        };

        if written {
            let path = self
                .output
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let clients = self.reload.publish(ReloadMessage::CssUpdate { path });
            if clients > 0 {
                info!("Injected stylesheet into {} browser(s)", clients);
            }
        } else {
            debug!("{} unchanged, not rewritten", self.output.display());
        }

        Ok(report)
    }
}

/// Name the sourcemap gives the compiled SCSS: `scss/app.scss.css`.
///
/// grass emits no map of its own, so mapped positions are in its CSS
/// output rather than in the SCSS source.
fn compiled_source_name(entry: &str) -> String {
    format!("{entry}.css")
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers only ever see a complete file. Skips the write
/// when the file already holds the same bytes.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if hash_content(&existing) == hash_content(contents) {
            return Ok(false);
        }
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(contents).map_err(|e| Error::io(tmp.path(), e))?;

    // Temp files are owner-only; the stylesheet keeps the mode it had
    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| Error::io(tmp.path(), e))?;
    }

    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

    Ok(true)
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Project {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Project {
        fn new(scss: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("scss")).unwrap();
            fs::write(dir.path().join("scss/app.scss"), scss).unwrap();
            let config = Config::with_root(dir.path());
            Self { dir, config }
        }

        fn pipeline(&self, mode: BuildMode) -> CssPipeline {
            CssPipeline::with_browsers(&self.config, mode, None, ReloadChannel::new())
        }

        fn output(&self) -> String {
            fs::read_to_string(self.config.output_path()).unwrap()
        }
    }

    const SIMPLE: &str = "$c: red; body { color: $c; }";

    #[test]
    fn test_prod_build_is_minified_without_sourcemap() {
        let project = Project::new(SIMPLE);
        let report = project.pipeline(BuildMode::Prod).build_css().unwrap();

        assert!(report.written);
        assert!(!report.sourcemap);
        let css = project.output();
        assert!(css.contains("body{color:red}"));
        assert!(!css.contains("sourceMappingURL"));
    }

    #[test]
    fn test_dev_build_embeds_sourcemap() {
        let project = Project::new(SIMPLE);
        project.pipeline(BuildMode::Dev).build_css().unwrap();

        let css = project.output();
        assert!(css.contains("color: red"));
        assert!(css.contains("sourceMappingURL=data:application/json"));
    }

    #[test]
    fn test_sourcemap_names_compiled_css() {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let project = Project::new(SIMPLE);
        project.pipeline(BuildMode::Dev).build_css().unwrap();

        let css = project.output();
        let encoded = css
            .split("base64,")
            .nth(1)
            .and_then(|rest| rest.split(" */").next())
            .unwrap();
        let map = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();

        assert!(map.contains("\"scss/app.scss.css\""), "got {map}");
        assert!(!map.contains("\"scss/app.scss\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_mode_is_world_readable_and_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/app.css");
        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;

        assert!(write_if_changed(&path, b"a{}").unwrap());
        assert_eq!(mode(&path), 0o644);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o664)).unwrap();
        assert!(write_if_changed(&path, b"b{}").unwrap());
        assert_eq!(mode(&path), 0o664);
        assert_eq!(fs::read_to_string(&path).unwrap(), "b{}");
    }

    #[test]
    fn test_partials_resolve_relative_to_entry() {
        let project = Project::new("@import 'vars'; .report { margin: $gap; }");
        fs::write(project.dir.path().join("scss/_vars.scss"), "$gap: 4px;").unwrap();

        project.pipeline(BuildMode::Prod).build_css().unwrap();
        assert!(project.output().contains(".report{margin:4px}"));
    }

    #[test]
    fn test_rebuild_is_deterministic_and_skips_write() {
        let project = Project::new(SIMPLE);
        let pipeline = project.pipeline(BuildMode::Dev);

        let first = pipeline.build_css().unwrap();
        let second = pipeline.build_css().unwrap();

        assert_eq!(first.hash, second.hash);
        assert!(first.written);
        assert!(!second.written);
    }

    #[test]
    fn test_scss_error_keeps_last_good_output() {
        let project = Project::new(SIMPLE);
        let pipeline = project.pipeline(BuildMode::Prod);
        pipeline.build_css().unwrap();
        let good = project.output();

        fs::write(project.dir.path().join("scss/app.scss"), "body { color: ").unwrap();
        let err = pipeline.build_css().unwrap_err();

        assert!(matches!(err, Error::Build(_)));
        assert_eq!(project.output(), good);
    }

    #[test]
    fn test_missing_entry_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        let pipeline = CssPipeline::with_browsers(&config, BuildMode::Prod, None, ReloadChannel::new());

        let err = pipeline.build_css().unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(!config.output_path().exists());
    }

    #[test]
    fn test_build_publishes_css_update() {
        let project = Project::new(SIMPLE);
        let reload = ReloadChannel::new();
        let mut rx = reload.subscribe();
        let pipeline = CssPipeline::with_browsers(&project.config, BuildMode::Prod, None, reload);

        pipeline.build_css().unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::CssUpdate {
                path: "app.css".to_string()
            }
        );
    }

    #[test]
    fn test_prefixes_added_for_old_targets() {
        let project = Project::new(".box { user-select: none; }");
        let browsers = Browsers::from_browserslist(["safari 12"]).unwrap();
        let pipeline =
            CssPipeline::with_browsers(&project.config, BuildMode::Prod, browsers, ReloadChannel::new());

        pipeline.build_css().unwrap();
        assert!(project.output().contains("-webkit-user-select:none"));
    }
}
