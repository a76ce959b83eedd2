//! nbreport-assets library
//!
//! Build driver for the nbreport report theme: compiles the SCSS
//! stylesheet, runs the report HTML generator, and serves the test site
//! with live reload while watching sources.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod utils;
pub mod watch;

pub use cli::{BuildMode, Cli};
pub use config::Config;
pub use error::{Error, Result};
pub use tasks::TaskGraph;
