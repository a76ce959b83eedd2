//! Build environment (`--env dev | prod`)

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Build mode selected once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuildMode {
    #[default]
    Dev,
    Prod,
}

impl BuildMode {
    /// Resolve the mode from the optional `--env` value
    pub fn resolve(value: Option<&str>) -> Result<Self, ConfigError> {
        value.map_or(Ok(Self::default()), str::parse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Dev => "dev",
            BuildMode::Prod => "prod",
        }
    }

    /// Whether the compiled stylesheet carries a sourcemap
    pub fn emits_sourcemap(&self) -> bool {
        matches!(self, BuildMode::Dev)
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(BuildMode::Dev),
            "prod" => Ok(BuildMode::Prod),
            other => Err(ConfigError::UnknownEnv(other.to_string())),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
