//! Error kinds reported by the driver
//!
//! Every failure surfaces as one of four kinds: configuration problems
//! detected before any task runs, stylesheet build failures, external
//! command failures, and filesystem I/O failures. Task failures carry the
//! name of the task that produced them.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Subprocess(#[from] SubprocessError),

    /// Read/write failure on a known path
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Dev server failure (bind, accept loop)
    #[error("{0:#}")]
    Server(anyhow::Error),

    /// A task action failed; carries the failing task's name
    #[error("task {task}: {}: {source}", .source.kind())]
    Task {
        task: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Name of the error kind, as printed in diagnostics
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Build(_) => ErrorKind::Build,
            Error::Subprocess(_) => ErrorKind::Subprocess,
            Error::Io { .. } | Error::Server(_) => ErrorKind::Io,
            Error::Task { source, .. } => source.kind(),
        }
    }

    /// Name of the failing task, if the error came out of a task action
    pub fn task(&self) -> Option<&str> {
        match self {
            Error::Task { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Whether this came from a shutdown request stopping a command
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Subprocess(SubprocessError::Interrupted { .. }) => true,
            Error::Task { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            _ => 1,
        }
    }

    /// One-line diagnostic: `task <name>: <kind>: <message>` for task
    /// failures, `<kind>: <message>` otherwise.
    pub fn report(&self) -> String {
        match self {
            Error::Task { .. } => self.to_string(),
            _ => format!("{}: {}", self.kind(), self),
        }
    }
}

/// The four error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Build,
    Subprocess,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Build => "BuildError",
            ErrorKind::Subprocess => "SubprocessError",
            ErrorKind::Io => "IoError",
        };
        f.write_str(name)
    }
}

/// Configuration errors, reported before any task action runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown environment `{0}` (expected `dev` or `prod`)")]
    UnknownEnv(String),

    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("task `{task}` depends on unknown task `{missing}`")]
    MissingPrerequisite { task: String, missing: String },

    #[error("task `{0}` is already registered")]
    DuplicateTask(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid glob `{pattern}`: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid browser targets {query:?}: {message}")]
    Browsers { query: Vec<String>, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Position inside a stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    /// 1-based
    pub line: u32,
    /// 1-based
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Stylesheet build errors
#[derive(Debug, Error)]
pub enum BuildError {
    /// SCSS compilation error; the message carries grass' own source excerpt
    #[error("scss compilation failed\n{0}")]
    Scss(String),

    /// Failure in a CSS stage (autoprefix, clean-css)
    #[error("{stage}: {message}{}", .location.as_ref().map(|l| format!(" at {l}")).unwrap_or_default())]
    Css {
        stage: &'static str,
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("sourcemap: {0}")]
    SourceMap(String),
}

/// External command failures
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {}", .code.map(|c| format!("status {c}")).unwrap_or_else(|| "a signal".to_string()))]
    Exited { command: String, code: Option<i32> },

    /// Stopped by a shutdown request
    #[error("`{command}` interrupted")]
    Interrupted { command: String },
}
