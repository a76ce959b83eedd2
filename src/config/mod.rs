//! Configuration handling
//!
//! Reads the optional `assets.toml` project file. Every key has a default,
//! so a project without the file builds with the stock layout.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use globset::Glob;
use lightningcss::targets::Browsers;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub use schema::*;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "assets.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Stylesheet processing
    #[serde(default)]
    pub css: CssConfig,

    /// External commands
    #[serde(default)]
    pub commands: CommandsConfig,

    /// File watching
    #[serde(default)]
    pub watch: WatchConfig,

    /// Development server settings
    #[serde(default)]
    pub dev: DevConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `assets.toml` in `cwd` is
    /// used when present, and the defaults rooted at `cwd` otherwise.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(cwd.join(path)),
            None => {
                let candidate = cwd.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::load(candidate)
                } else {
                    debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::with_root(cwd))
                }
            }
        }
    }

    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        // Set root directory to the directory containing the config file
        config.root = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration text without touching the filesystem
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Default configuration rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, command) in [
            ("commands.report", &self.commands.report),
            ("commands.formatter", &self.commands.formatter),
        ] {
            if command.split_whitespace().next().is_none() {
                return Err(ConfigError::Invalid(format!("`{key}` must not be empty")));
            }
        }

        for pattern in [&self.watch.styles, &self.watch.templates] {
            Glob::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        }

        self.browser_targets()?;

        if self.dev.port == 0 {
            return Err(ConfigError::Invalid("`dev.port` must not be 0".to_string()));
        }

        Ok(())
    }

    /// Resolve the configured browserslist queries
    pub fn browser_targets(&self) -> Result<Option<Browsers>, ConfigError> {
        Browsers::from_browserslist(&self.css.browsers).map_err(|e| ConfigError::Browsers {
            query: self.css.browsers.clone(),
            message: e.to_string(),
        })
    }

    /// Absolute path of the SCSS entry file
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.paths.entry)
    }

    /// Absolute path of the output directory
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output_dir)
    }

    /// Absolute path of the compiled stylesheet
    pub fn output_path(&self) -> PathBuf {
        self.output_dir().join(&self.paths.output)
    }

    /// Absolute path of the directory served by the dev server
    pub fn site_root(&self) -> PathBuf {
        self.root.join(&self.paths.site_root)
    }
}
