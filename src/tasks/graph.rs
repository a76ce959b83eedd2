//! Task graph: named tasks with prerequisites, run in dependency order

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{ConfigError, Error, ErrorKind, Result};
use crate::utils::format_duration;

/// The effect of a task.
///
/// Actions receive the graph they run in so long-running tasks (the
/// watcher) can start further runs.
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, graph: &TaskGraph) -> Result<()>;
}

/// Adapter turning a closure returning a future into an [`Action`]
pub struct FnAction<F>(F);

/// Wrap a closure as an action
pub fn action<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnAction(f)
}

#[async_trait]
impl<F, Fut> Action for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self, _graph: &TaskGraph) -> Result<()> {
        (self.0)().await
    }
}

/// A registered task
pub struct Task {
    pub name: String,
    pub prerequisites: Vec<String>,
    /// Runs until interrupted (watch, serve)
    pub persistent: bool,
    action: Box<dyn Action>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

/// What a run does when a task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failure
    Abort,
    /// Log stylesheet build errors and keep going; abort on anything else
    SwallowBuildErrors,
}

/// Tasks executed by one top-level run, in execution order
#[derive(Debug, Default, Clone)]
pub struct RunRecord {
    executed: Vec<String>,
    seen: HashSet<String>,
}

impl RunRecord {
    /// Record `name`; false if it already ran in this invocation
    fn mark(&mut self, name: &str) -> bool {
        if self.seen.insert(name.to_string()) {
            self.executed.push(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn executed(&self) -> &[String] {
        &self.executed
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Mapping from task name to task.
///
/// Prerequisites are stored as names and only resolved when a run starts,
/// so registration order does not matter. Registration needs `&mut self`
/// and runs need `&self`, so the graph is frozen while anything runs.
#[derive(Default)]
pub struct TaskGraph {
    tasks: HashMap<String, Task>,
}

impl TaskGraph {
    /// Name of the task run when none is given
    pub const DEFAULT_TASK: &'static str = "default";

    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task
    pub fn register(
        &mut self,
        name: &str,
        prerequisites: &[&str],
        action: impl Action + 'static,
    ) -> Result<(), ConfigError> {
        self.insert(name, prerequisites, Box::new(action), false)
    }

    /// Register a task that runs until interrupted
    pub fn register_persistent(
        &mut self,
        name: &str,
        prerequisites: &[&str],
        action: impl Action + 'static,
    ) -> Result<(), ConfigError> {
        self.insert(name, prerequisites, Box::new(action), true)
    }

    fn insert(
        &mut self,
        name: &str,
        prerequisites: &[&str],
        action: Box<dyn Action>,
        persistent: bool,
    ) -> Result<(), ConfigError> {
        if self.tasks.contains_key(name) {
            return Err(ConfigError::DuplicateTask(name.to_string()));
        }

        self.tasks.insert(
            name.to_string(),
            Task {
                name: name.to_string(),
                prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
                persistent,
                action,
            },
        );

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Registered task names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Prerequisite closure of `target` followed by `target`, in an order
    /// where every task comes after its prerequisites.
    pub fn resolve(&self, target: &str) -> Result<Vec<&Task>, ConfigError> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();

        self.visit(target, &mut marks, &mut stack, &mut order)?;

        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<&'a Task>,
    ) -> Result<(), ConfigError> {
        let Some(task) = self.tasks.get(name) else {
            return Err(match stack.last() {
                Some(parent) => ConfigError::MissingPrerequisite {
                    task: parent.to_string(),
                    missing: name.to_string(),
                },
                None => ConfigError::UnknownTask(name.to_string()),
            });
        };

        match marks.get(task.name.as_str()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == task.name).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(task.name.clone());
                return Err(ConfigError::Cycle(cycle));
            }
            None => {}
        }

        marks.insert(&task.name, Mark::Visiting);
        stack.push(&task.name);

        for prerequisite in &task.prerequisites {
            self.visit(prerequisite, marks, stack, order)?;
        }

        stack.pop();
        marks.insert(&task.name, Mark::Done);
        order.push(task);

        Ok(())
    }

    /// Run `name` and its prerequisites.
    ///
    /// Runs that include a persistent task swallow stylesheet build errors
    /// so the watcher still comes up after a broken initial build.
    pub async fn run(&self, name: &str) -> Result<RunRecord> {
        let order = self.resolve(name)?;
        let policy = if order.iter().any(|task| task.persistent) {
            ErrorPolicy::SwallowBuildErrors
        } else {
            ErrorPolicy::Abort
        };

        self.execute(order, policy).await
    }

    /// Run the default task
    pub async fn run_default(&self) -> Result<RunRecord> {
        self.run(Self::DEFAULT_TASK).await
    }

    /// Run `name` with an explicit error policy
    pub async fn run_with(&self, name: &str, policy: ErrorPolicy) -> Result<RunRecord> {
        let order = self.resolve(name)?;
        self.execute(order, policy).await
    }

    async fn execute(&self, order: Vec<&Task>, policy: ErrorPolicy) -> Result<RunRecord> {
        let mut record = RunRecord::default();

        for task in order {
            if !record.mark(&task.name) {
                continue;
            }

            let start = Instant::now();
            info!("Starting '{}'...", task.name);

            match task.action.run(self).await {
                Ok(()) => {
                    info!("Finished '{}' after {}", task.name, format_duration(start.elapsed()));
                }
                Err(err)
                    if policy == ErrorPolicy::SwallowBuildErrors
                        && err.kind() == ErrorKind::Build =>
                {
                    error!("'{}' failed: {}", task.name, err);
                }
                Err(err) => {
                    return Err(Error::Task {
                        task: task.name.clone(),
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(record)
    }
}
