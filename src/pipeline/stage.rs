//! Stylesheet transforms
//!
//! Each stage takes the stream produced by the previous one and hands back
//! a new one: `(contents, sourcemap sidecar) -> (contents, sourcemap sidecar)`.

use std::path::PathBuf;

use lightningcss::error::Error as CssError;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::Targets;
use tracing::debug;

use super::profile::CleanCssProfile;
use super::sourcemap::SourceMapSidecar;
use crate::error::{BuildError, SourceLocation};

/// Stylesheet contents flowing through the pipeline
pub struct Stream {
    /// File the stream was read from
    pub origin: PathBuf,

    /// Current contents
    pub contents: String,

    /// Sourcemap accumulator, present once initialised
    pub sourcemap: Option<SourceMapSidecar>,
}

impl Stream {
    pub fn new(origin: PathBuf, contents: String) -> Self {
        Self {
            origin,
            contents,
            sourcemap: None,
        }
    }

    fn origin_name(&self) -> String {
        self.origin.display().to_string()
    }
}

/// A single transform in the pipeline
pub trait Stage {
    fn name(&self) -> &'static str;

    fn apply(&self, stream: Stream) -> Result<Stream, BuildError>;
}

/// Attach a sourcemap accumulator to the stream
pub struct InitSourceMaps {
    /// Root the mapped source paths are made relative to
    pub project_root: String,
    /// Name recorded for the mapped source
    pub source_name: String,
}

impl Stage for InitSourceMaps {
    fn name(&self) -> &'static str {
        "sourcemaps-init"
    }

    fn apply(&self, mut stream: Stream) -> Result<Stream, BuildError> {
        stream.sourcemap = Some(SourceMapSidecar::new(
            self.source_name.clone(),
            self.project_root.clone(),
        ));
        Ok(stream)
    }
}

/// SCSS to CSS through grass
pub struct CompileScss;

impl Stage for CompileScss {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, mut stream: Stream) -> Result<Stream, BuildError> {
        // Imports resolve against the entry's directory
        let load_paths: Vec<PathBuf> = stream
            .origin
            .parent()
            .map(|dir| dir.to_path_buf())
            .into_iter()
            .collect();

        let options = grass::Options::default()
            .load_paths(&load_paths)
            .style(grass::OutputStyle::Expanded);

        stream.contents = grass::from_string(stream.contents.as_str(), &options)
            .map_err(|e| BuildError::Scss(format!("{}: {}", stream.origin.display(), e)))?;

        debug!("Compiled {} ({} bytes)", stream.origin.display(), stream.contents.len());
        Ok(stream)
    }
}

/// Vendor prefixes for the configured browser targets
pub struct Autoprefix {
    pub targets: Targets,
}

impl Stage for Autoprefix {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    fn apply(&self, stream: Stream) -> Result<Stream, BuildError> {
        // lightningcss only adds prefixes inside its minify pass
        transform_css(self.name(), stream, self.targets, false)
    }
}

/// Structural minification with a clean-css profile
pub struct CleanCss {
    pub profile: CleanCssProfile,
    pub targets: Targets,
}

impl Stage for CleanCss {
    fn name(&self) -> &'static str {
        "clean-css"
    }

    fn apply(&self, stream: Stream) -> Result<Stream, BuildError> {
        if !self.profile.restructures() {
            return Ok(stream);
        }
        transform_css(self.name(), stream, self.targets, self.profile.compacts_output())
    }
}

/// Append the accumulated sourcemap as an inline comment
pub struct WriteSourceMaps;

impl Stage for WriteSourceMaps {
    fn name(&self) -> &'static str {
        "sourcemaps-write"
    }

    fn apply(&self, mut stream: Stream) -> Result<Stream, BuildError> {
        let comment = match stream.sourcemap.as_mut() {
            Some(sidecar) => sidecar.inline_comment()?,
            None => None,
        };

        if let Some(comment) = comment {
            if !stream.contents.is_empty() && !stream.contents.ends_with('\n') {
                stream.contents.push('\n');
            }
            stream.contents.push_str(&comment);
            stream.contents.push('\n');
        }

        Ok(stream)
    }
}

/// Parse, minify with `targets`, and print; chains a sourcemap when the
/// stream carries one.
fn transform_css(
    stage: &'static str,
    mut stream: Stream,
    targets: Targets,
    compact: bool,
) -> Result<Stream, BuildError> {
    let mut map = stream
        .sourcemap
        .as_ref()
        .map(|sidecar| sidecar.begin(&stream.contents));

    let code = {
        let options = ParserOptions {
            filename: stream.origin_name(),
            ..ParserOptions::default()
        };

        let mut sheet = StyleSheet::parse(&stream.contents, options)
            .map_err(|e| css_error(stage, e))?;

        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| css_error(stage, e))?;

        sheet
            .to_css(PrinterOptions {
                minify: compact,
                source_map: map.as_mut(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| css_error(stage, e))?
            .code
    };

    if let (Some(sidecar), Some(map)) = (stream.sourcemap.as_mut(), map) {
        sidecar.advance(map)?;
    }

    stream.contents = code;
    Ok(stream)
}

fn css_error<T: std::fmt::Display>(stage: &'static str, err: CssError<T>) -> BuildError {
    BuildError::Css {
        stage,
        message: err.kind.to_string(),
        location: err.loc.map(|loc| SourceLocation {
            file: loc.filename,
            line: loc.line + 1,
            column: loc.column,
        }),
    }
}
