//! Command-line interface
//!
//! `nbreport-assets [--env dev|prod] [TASK]` runs one task of the stock
//! graph (and its prerequisites); `default` when no task is named.

mod env;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tasks::{builtin_graph, AssetContext, TaskGraph};

pub use env::BuildMode;

/// Stylesheet and report build driver for nbreport
#[derive(Parser, Debug)]
#[command(name = "nbreport-assets")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Task to run
    #[arg(default_value = TaskGraph::DEFAULT_TASK)]
    pub task: String,

    /// Build environment: dev or prod
    #[arg(long, value_name = "ENV")]
    pub env: Option<String>,

    /// List the available tasks and exit
    #[arg(short = 'T', long)]
    pub tasks: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to an assets.toml config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Run the selected task.
    ///
    /// The build mode and the configuration are settled before any task
    /// starts, so a bad flag never leaves partial output behind.
    pub async fn execute(&self) -> Result<()> {
        let mode = BuildMode::resolve(self.env.as_deref())?;
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        let config = Config::resolve(self.config.as_deref(), &cwd)?;

        let context = Arc::new(AssetContext::new(config, mode)?);
        let graph = builtin_graph(context.clone())?;

        if self.tasks {
            print_tasks(&graph);
            return Ok(());
        }

        // Unknown task names fail here, before the banner
        graph.resolve(&self.task)?;

        print_banner(mode);
        context.shutdown_on_ctrl_c();

        let record = graph.run(&self.task).await?;
        debug!("Ran {:?}", record.executed());

        Ok(())
    }
}

fn print_tasks(graph: &TaskGraph) {
    for name in graph.names() {
        let Some(task) = graph.get(name) else {
            continue;
        };
        if task.prerequisites.is_empty() {
            println!("{name}");
        } else {
            println!("{name} [{}]", task.prerequisites.join(", "));
        }
    }
}

fn print_banner(mode: BuildMode) {
    eprintln!(
        "\n{} {} {}\n",
        "nbreport-assets".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed(),
        format!("({mode})").dimmed()
    );
}
