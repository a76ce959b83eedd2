//! Named build tasks
//!
//! [`TaskGraph`] holds tasks and runs them in prerequisite order;
//! [`builtin_graph`] registers the stock set used by the CLI.

mod builtin;
mod graph;

pub use builtin::{builtin_graph, AssetContext};
pub use graph::{action, Action, ErrorPolicy, FnAction, RunRecord, Task, TaskGraph};
