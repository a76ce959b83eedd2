//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Source and output locations, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// SCSS entry file
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Directory receiving the compiled stylesheet
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// File name of the compiled stylesheet
    #[serde(default = "default_output")]
    pub output: String,

    /// Directory served by the dev server
    #[serde(default = "default_site_root")]
    pub site_root: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            entry: default_entry(),
            output_dir: default_output_dir(),
            output: default_output(),
            site_root: default_site_root(),
        }
    }
}

fn default_entry() -> String {
    "scss/app.scss".to_string()
}

fn default_output_dir() -> String {
    "uservice_nbreport/publish/templates/report-html".to_string()
}

fn default_output() -> String {
    "app.css".to_string()
}

fn default_site_root() -> String {
    "test-sites/basic".to_string()
}

/// Stylesheet processing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CssConfig {
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
        }
    }
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".to_string()]
}

/// External commands.
///
/// Each is split on whitespace and run without a shell, so arguments
/// cannot be quoted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Report HTML generator, run by the `basic` task
    #[serde(default = "default_report")]
    pub report: String,

    /// Code formatter, run by the `pretty` task
    #[serde(default = "default_formatter")]
    pub formatter: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            report: default_report(),
            formatter: default_formatter(),
        }
    }
}

fn default_report() -> String {
    "lsst-report-html".to_string()
}

fn default_formatter() -> String {
    "npm run pretty".to_string()
}

/// File watching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Stylesheet sources; changes re-run `sass`
    #[serde(default = "default_styles_glob")]
    pub styles: String,

    /// Report templates; changes re-run `browser-sync-reload`
    #[serde(default = "default_templates_glob")]
    pub templates: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            styles: default_styles_glob(),
            templates: default_templates_glob(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_styles_glob() -> String {
    "scss/**/*.scss".to_string()
}

fn default_templates_glob() -> String {
    "uservice_nbreport/publish/templates/report-html/*.{css,jinja}".to_string()
}

/// Development server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to run dev server on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Open browser automatically
    #[serde(default = "default_true")]
    pub open: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: true,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}
