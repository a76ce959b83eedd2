//! The stock task set
//!
//! | task                  | prerequisites   |
//! |-----------------------|-----------------|
//! | `environment`         |                 |
//! | `pretty`              |                 |
//! | `sass`                |                 |
//! | `basic`               | `sass`          |
//! | `serve`               | `sass`, `basic` |
//! | `watch`               |                 |
//! | `browser-sync-reload` | `basic`         |
//! | `default`             | `sass`, `watch` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use lightningcss::targets::Browsers;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::graph::{action, Action, TaskGraph};
use crate::cli::BuildMode;
use crate::command::run_command;
use crate::config::Config;
use crate::error::{ConfigError, Error, Result};
use crate::pipeline::CssPipeline;
use crate::server::{DevServer, DevServerOptions, ReloadChannel, ReloadMessage};
use crate::utils::{format_size, relative_path};
use crate::watch::{default_specs, Watcher};

/// Everything the stock tasks share
pub struct AssetContext {
    pub config: Config,
    pub mode: BuildMode,
    pub reload: ReloadChannel,
    pub pipeline: CssPipeline,
    /// Cancelled on interrupt; stops the watcher and running commands
    pub shutdown: CancellationToken,
}

impl AssetContext {
    pub fn new(config: Config, mode: BuildMode) -> Result<Self> {
        let browsers = config.browser_targets()?;
        Ok(Self::with_browsers(config, mode, browsers))
    }

    /// Context with explicit browser targets
    pub fn with_browsers(config: Config, mode: BuildMode, browsers: Option<Browsers>) -> Self {
        let reload = ReloadChannel::new();
        let pipeline = CssPipeline::with_browsers(&config, mode, browsers, reload.clone());

        Self {
            config,
            mode,
            reload,
            pipeline,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel [`AssetContext::shutdown`] on the first Ctrl-C
    pub fn shutdown_on_ctrl_c(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupted, shutting down...");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }

    async fn run_command(&self, command_line: &str) -> Result<()> {
        run_command(command_line, &self.config.root, &self.shutdown).await
    }

    fn watcher(&self) -> Result<Watcher, ConfigError> {
        Ok(Watcher::new(
            &self.config.root,
            default_specs(&self.config)?,
            Duration::from_millis(self.config.watch.debounce_ms),
        ))
    }

    /// Build the stylesheet and print a one-line summary
    fn build_css(&self) -> Result<()> {
        let report = self.pipeline.build_css()?;

        let shown = relative_path(&self.config.root, &report.output_path)
            .unwrap_or_else(|| report.output_path.display().to_string());

        eprintln!(
            "  {} {} {}{}",
            "•".dimmed(),
            shown.cyan(),
            format_size(report.size).dimmed(),
            if report.written { "" } else { " (unchanged)" }.dimmed()
        );

        Ok(())
    }
}

/// Register the stock tasks into a fresh graph
pub fn builtin_graph(ctx: Arc<AssetContext>) -> Result<TaskGraph, ConfigError> {
    let mut graph = TaskGraph::new();

    graph.register("environment", &[], {
        let mode = ctx.mode;
        action(move || async move {
            println!("{mode}");
            Ok(())
        })
    })?;

    graph.register("pretty", &[], {
        let ctx = ctx.clone();
        action(move || {
            let ctx = ctx.clone();
            async move { ctx.run_command(&ctx.config.commands.formatter).await }
        })
    })?;

    graph.register("sass", &[], {
        let ctx = ctx.clone();
        action(move || {
            let ctx = ctx.clone();
            async move { ctx.build_css() }
        })
    })?;

    graph.register("basic", &["sass"], {
        let ctx = ctx.clone();
        action(move || {
            let ctx = ctx.clone();
            async move { ctx.run_command(&ctx.config.commands.report).await }
        })
    })?;

    graph.register_persistent("serve", &["sass", "basic"], ServeTask { ctx: ctx.clone() })?;

    graph.register_persistent("watch", &[], WatchTask { ctx: ctx.clone() })?;

    graph.register("browser-sync-reload", &["basic"], {
        let ctx = ctx.clone();
        action(move || {
            let ctx = ctx.clone();
            async move {
                let clients = ctx.reload.publish(ReloadMessage::FullReload {
                    reason: "report templates rebuilt".to_string(),
                });
                info!("Reloaded {} browser(s)", clients);
                Ok(())
            }
        })
    })?;

    graph.register(TaskGraph::DEFAULT_TASK, &["sass", "watch"], action(|| async { Ok(()) }))?;

    Ok(graph)
}

/// `watch`: re-run tasks on source changes until interrupted
struct WatchTask {
    ctx: Arc<AssetContext>,
}

#[async_trait]
impl Action for WatchTask {
    async fn run(&self, graph: &TaskGraph) -> Result<()> {
        self.ctx.watcher()?.watch(graph, &self.ctx.shutdown).await
    }
}

/// `serve`: dev server plus watcher until interrupted
struct ServeTask {
    ctx: Arc<AssetContext>,
}

#[async_trait]
impl Action for ServeTask {
    async fn run(&self, graph: &TaskGraph) -> Result<()> {
        let config = &self.ctx.config;
        let watcher = self.ctx.watcher()?;

        let server = DevServer::new(
            config.site_root(),
            DevServerOptions {
                host: config.dev.host.clone(),
                port: config.dev.port,
                open: config.dev.open,
            },
            self.ctx.reload.clone(),
        );

        let running = server.start().await.map_err(Error::Server)?;

        eprintln!(
            "\n{} Dev server at {}\n",
            "→".blue(),
            running.url().cyan().underline()
        );

        let watched = watcher.watch(graph, &self.ctx.shutdown).await;
        running.shutdown().await.map_err(Error::Server)?;

        watched
    }
}
