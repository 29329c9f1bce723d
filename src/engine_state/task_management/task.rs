//! # Task System Core Traits
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread (or inline
//!    on the calling thread when the pool has no workers)
//! 3. Its output travels back over the shared completion channel
//! 4. The output is collected on the main thread in `process_completed_tasks()`
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `Task::Output` must be `Send` to be transferred back to the main thread
//! - Tasks own everything they read; shared data is passed as `Arc` snapshots

/// A unit of work that can be executed asynchronously.
///
/// Tasks are the primary mechanism for offloading work from the main thread to
/// background workers. They should be designed to be self-contained and own all
/// the data they need to perform their work.
///
/// # Implementation Guidelines
/// - Should be relatively coarse-grained to amortize task scheduling overhead
/// - Should avoid holding references to data that might be modified elsewhere
/// - Report failures through `Output` instead of panicking
pub trait Task: Send + 'static {
    /// Value produced by the task and handed back to the main thread.
    type Output: Send + 'static;

    /// Processes the task and returns its output.
    ///
    /// This method contains the actual work to be performed asynchronously.
    /// It runs on a background thread and should avoid blocking operations
    /// that could starve other tasks.
    fn process(self: Box<Self>) -> Self::Output;
}

/// Identifies a published task until its output has been collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Output of a task that finished, or the panic message of one that did not.
pub type TaskOutcome<T> = Result<T, String>;
