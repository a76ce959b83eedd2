//! File watching
//!
//! Debounced filesystem events are matched against glob specs; each match
//! requests a re-run of the spec's tasks through the task graph. Re-runs
//! execute one at a time and failures are logged without stopping the
//! loop.

mod schedule;

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use colored::Colorize;
use globset::{GlobBuilder, GlobMatcher};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ConfigError, Error, Result};
use crate::tasks::{ErrorPolicy, TaskGraph};
use crate::utils::format_duration;

pub use schedule::{Scheduler, SlotState};

/// A glob and the tasks it triggers
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pattern: String,
    matcher: GlobMatcher,
    tasks: Vec<String>,
}

impl WatchSpec {
    pub fn new(pattern: &str, tasks: &[&str]) -> Result<Self, ConfigError> {
        // `*` stays within one directory; `**` crosses them
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| ConfigError::Glob {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Match a path relative to the project root
    pub fn matches(&self, relative: &Path) -> bool {
        self.matcher.is_match(relative)
    }

    /// Leading directories of the pattern that contain no glob syntax
    pub fn base_dir(&self) -> PathBuf {
        let mut base = PathBuf::new();
        let components: Vec<Component> = Path::new(&self.pattern).components().collect();

        // The last component names files, never a directory to watch
        for component in components.iter().take(components.len().saturating_sub(1)) {
            let text = component.as_os_str().to_string_lossy();
            if text.contains(['*', '?', '[', '{']) {
                break;
            }
            base.push(component);
        }

        base
    }
}

/// Watch specs of the stock task graph
pub fn default_specs(config: &Config) -> Result<Vec<WatchSpec>, ConfigError> {
    Ok(vec![
        WatchSpec::new(&config.watch.styles, &["sass"])?,
        WatchSpec::new(&config.watch.templates, &["browser-sync-reload"])?,
    ])
}

/// Re-runs tasks when watched files change
pub struct Watcher {
    root: PathBuf,
    specs: Vec<WatchSpec>,
    debounce: Duration,
}

impl Watcher {
    pub fn new(root: &Path, specs: Vec<WatchSpec>, debounce: Duration) -> Self {
        // Event paths come back canonical on some platforms
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            specs,
            debounce,
        }
    }

    /// Watch until `shutdown` is cancelled
    pub async fn watch(&self, graph: &TaskGraph, shutdown: &CancellationToken) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Dropping the debouncer stops the watch threads
        let _debouncer = self.start_debouncer(tx)?;

        for spec in &self.specs {
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                spec.pattern().cyan(),
                "→".dimmed(),
                spec.tasks().join(", ")
            );
        }
        eprintln!(
            "  {} Watching for changes, press {} to stop\n",
            "•".dimmed(),
            "Ctrl+C".yellow()
        );

        self.run(graph, rx, shutdown.cancelled()).await
    }

    fn start_debouncer(
        &self,
        tx: mpsc::UnboundedSender<Vec<PathBuf>>,
    ) -> Result<Debouncer<RecommendedWatcher>> {
        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let paths = events.into_iter().map(|event| event.path).collect();
                    let _ = tx.send(paths);
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        })
        .map_err(|e| Error::io(&self.root, io::Error::new(io::ErrorKind::Other, e)))?;

        let mut watched: Vec<PathBuf> = Vec::new();
        for spec in &self.specs {
            let dir = self.root.join(spec.base_dir());
            if watched.iter().any(|w| dir.starts_with(w)) {
                continue;
            }
            if !dir.is_dir() {
                warn!("Not watching {}: no such directory", dir.display());
                continue;
            }

            debouncer
                .watcher()
                .watch(&dir, RecursiveMode::Recursive)
                .map_err(|e| Error::io(&dir, io::Error::new(io::ErrorKind::Other, e)))?;

            debug!("Watching {} for `{}`", dir.display(), spec.pattern());
            watched.push(dir);
        }

        Ok(debouncer)
    }

    /// Drive re-runs from batches of changed paths until `shutdown`
    /// resolves or the event channel closes with nothing left to run.
    pub async fn run(
        &self,
        graph: &TaskGraph,
        mut events: mpsc::UnboundedReceiver<Vec<PathBuf>>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let mut scheduler = Scheduler::new(self.specs.len());
        let mut current: Option<std::pin::Pin<Box<dyn Future<Output = usize> + Send + '_>>> = None;
        let mut open = true;

        tokio::pin!(shutdown);

        loop {
            if current.is_none() {
                match scheduler.next() {
                    Some(slot) => current = Some(Box::pin(self.rerun(graph, slot))),
                    None if !open => break,
                    None => {}
                }
            }

            tokio::select! {
                batch = events.recv(), if open => match batch {
                    Some(paths) => self.dispatch(&paths, &mut scheduler),
                    None => open = false,
                },
                slot = in_flight(&mut current) => {
                    scheduler.finish(slot);
                    current = None;
                }
                _ = &mut shutdown => {
                    if let Some(running) = current.take() {
                        info!("Waiting for the running task to stop...");
                        running.await;
                    }
                    break;
                }
            }
        }

        info!("Stopped watching");
        Ok(())
    }

    fn dispatch(&self, paths: &[PathBuf], scheduler: &mut Scheduler) {
        for path in paths {
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };

            for (slot, spec) in self.specs.iter().enumerate() {
                if spec.matches(relative) && scheduler.request(slot) {
                    debug!("{} changed, queued {:?}", relative.display(), spec.tasks());
                }
            }
        }
    }

    async fn rerun(&self, graph: &TaskGraph, slot: usize) -> usize {
        let spec = &self.specs[slot];
        let start = Instant::now();

        eprintln!(
            "  {} {} changed",
            "↻".yellow(),
            spec.pattern().dimmed()
        );

        for task in spec.tasks() {
            match graph.run_with(task, ErrorPolicy::SwallowBuildErrors).await {
                Ok(_) => {}
                Err(err) if err.is_interrupted() => {
                    debug!("{}", err.report());
                    break;
                }
                Err(err) => {
                    error!("{}", err.report());
                    break;
                }
            }
        }

        debug!(
            "Re-run of {:?} took {}",
            spec.tasks(),
            format_duration(start.elapsed())
        );

        slot
    }
}

/// Await the in-flight re-run, or never resolve when there is none
async fn in_flight<F: Future + Unpin>(current: &mut Option<F>) -> F::Output {
    match current {
        Some(running) => running.await,
        None => std::future::pending().await,
    }
}
