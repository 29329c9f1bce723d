//! # Task Management System
//!
//! This module provides a small worker pool for executing work off the main
//! thread. It knows nothing about terrain: it moves boxed [`Task`]s to worker
//! threads and their outputs back.
//!
//! ## Architecture Overview
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskChannel`: Communication channel from the main thread to one worker
//!
//! All workers report into a single completion channel, drained by the main
//! thread. A worker holds at most `MAX_TASKS_IN_FLIGHT` tasks; everything else
//! waits in a FIFO queue on the main thread, where it can still be cancelled.
//!
//! ## Inline Mode
//! A manager created with zero workers runs queued tasks on the calling thread
//! inside `process_queued_tasks()`. Outputs are still only handed out by
//! `process_completed_tasks()`, so callers observe the same ordering as with
//! real workers. Tests use this mode for deterministic scheduling.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send their outputs to the completion channel
//! 4. Outputs are collected on the main thread in `process_completed_tasks()`
//!
//! ## Example Usage
//! ```
//! use voxel_terrain::engine_state::task_management::{task::Task, TaskManager};
//!
//! struct Square(u64);
//!
//! impl Task for Square {
//!     type Output = u64;
//!     fn process(self: Box<Self>) -> u64 {
//!         self.0 * self.0
//!     }
//! }
//!
//! let mut task_manager = TaskManager::new(0);
//! let id = task_manager.publish_task(Box::new(Square(7)));
//!
//! // In your main/game loop:
//! task_manager.process_queued_tasks();
//! let completed = task_manager.process_completed_tasks();
//! assert_eq!(completed, vec![(id, Ok(49))]);
//! ```

pub mod task;

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info};
use task::{Task, TaskId, TaskOutcome};

type BoxedTask<T> = Box<dyn Task<Output = T>>;

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined when the manager drops
struct TaskChannel<T> {
    task_sender: Sender<(TaskId, BoxedTask<T>)>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `result_receiver`: Completion channel shared by all workers
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `running`: Tasks handed to a worker, with the channel they went to
/// - `inline_results`: Outputs of tasks run on the calling thread
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager<T: Send + 'static> {
    channels: Vec<TaskChannel<T>>,
    result_receiver: Receiver<(TaskId, TaskOutcome<T>)>,
    queued_tasks: VecDeque<(TaskId, BoxedTask<T>)>,
    running: HashMap<TaskId, usize>,
    inline_results: VecDeque<(TaskId, TaskOutcome<T>)>,
    current_channel: usize,
    next_task_id: u64,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// Kept at 1 so that a task is only committed to a worker once that worker is
/// idle. Everything else stays in the main-thread queue, where it can still be
/// cancelled or replaced.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// Runs a task, turning a panic into an error message.
fn run_task<T: Send + 'static>(task: BoxedTask<T>) -> TaskOutcome<T> {
    panic::catch_unwind(AssertUnwindSafe(|| task.process())).map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string())
    })
}

impl<T: Send + 'static> TaskManager<T> {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. Zero runs tasks
    ///   inline in `process_queued_tasks()`.
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new(num_workers: usize) -> Self {
        let (result_tx, result_rx) = channel::<(TaskId, TaskOutcome<T>)>();
        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<(TaskId, BoxedTask<T>)>();
            let result_tx = result_tx.clone();

            let task_closure = move || {
                while let Ok((id, task)) = task_rx.recv() {
                    if result_tx.send((id, run_task(task))).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{}", index))
                .spawn(task_closure)
                .expect("failed to spawn terrain worker thread");

            channels.push(TaskChannel {
                task_sender: task_tx,
                num_tasks_in_flight: 0,
                worker: Some(worker),
            });
        }

        info!(
            "Task manager started with {} workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        TaskManager {
            channels,
            result_receiver: result_rx,
            queued_tasks: VecDeque::new(),
            running: HashMap::new(),
            inline_results: VecDeque::new(),
            current_channel: 0,
            next_task_id: 0,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of tasks handed to workers whose output has not been collected.
    pub fn in_flight_len(&self) -> usize {
        self.running.len()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the send failed (worker disconnected), so it can be requeued
    fn try_send_task(
        &mut self,
        id: TaskId,
        task: BoxedTask<T>,
        channel_idx: usize,
    ) -> Result<(), BoxedTask<T>> {
        match self.channels[channel_idx].task_sender.send((id, task)) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                self.running.insert(id, channel_idx);
                Ok(())
            }
            Err(error) => Err((error.0).1),
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// This implements a round-robin scheduling strategy starting from the last
    /// used channel to ensure even distribution of tasks across all workers.
    /// Channels that have reached their maximum number of in-flight tasks are
    /// skipped.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel;
        let mut current = start_channel;
        loop {
            if self.channels[current].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// The task is sent to an idle worker right away if there is one, and
    /// queued otherwise. With zero workers it always queues.
    ///
    /// # Returns
    /// The id under which the task's output will be reported.
    pub fn publish_task(&mut self, task: BoxedTask<T>) -> TaskId {
        let id = TaskId(self.next_task_id);
        self.next_task_id += 1;

        let Some(channel_idx) = self.find_available_channel() else {
            self.queued_tasks.push_back((id, task));
            return id;
        };

        match self.try_send_task(id, task, channel_idx) {
            Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
            Err(task) => self.queued_tasks.push_back((id, task)),
        }
        id
    }

    /// Removes a task that has not reached a worker yet.
    ///
    /// # Returns
    /// `true` if the task was still queued and is now dropped unrun.
    pub fn cancel_queued(&mut self, id: TaskId) -> bool {
        match self.queued_tasks.iter().position(|(queued, _)| *queued == id) {
            Some(index) => {
                self.queued_tasks.remove(index);
                true
            }
            None => false,
        }
    }

    /// True while the task sits in a worker and its output has not been collected.
    pub fn is_running(&self, id: TaskId) -> bool {
        self.running.contains_key(&id)
    }

    /// Moves queued tasks to idle workers, oldest first.
    ///
    /// Should be called once per frame. With zero workers this runs every
    /// queued task on the calling thread instead.
    pub fn process_queued_tasks(&mut self) {
        if self.channels.is_empty() {
            while let Some((id, task)) = self.queued_tasks.pop_front() {
                self.inline_results.push_back((id, run_task(task)));
            }
            return;
        }

        while let Some(channel_idx) = self.find_available_channel() {
            let Some((id, task)) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(id, task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // worker disconnected, put the task back and stop processing
                    self.queued_tasks.push_front((id, task));
                    break;
                }
            }
        }
    }

    /// Collects the outputs of every task that finished since the last call.
    ///
    /// Never blocks. Must be called from the thread that owns the manager.
    pub fn process_completed_tasks(&mut self) -> Vec<(TaskId, TaskOutcome<T>)> {
        let mut completed: Vec<_> = self.inline_results.drain(..).collect();

        while let Ok((id, outcome)) = self.result_receiver.try_recv() {
            if let Some(channel_idx) = self.running.remove(&id) {
                self.channels[channel_idx].num_tasks_in_flight -= 1;
            }
            completed.push((id, outcome));
        }

        completed
    }
}

impl<T: Send + 'static> Drop for TaskManager<T> {
    fn drop(&mut self) {
        self.queued_tasks.clear();
        let workers: Vec<JoinHandle<()>> = self
            .channels
            .drain(..)
            .filter_map(|mut channel| channel.worker.take())
            .collect();
        // dropping the channels closed every task sender, so workers exit
        // after their current task
        for worker in workers {
            if worker.join().is_err() {
                debug!("Terrain worker exited with a panic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use web_time::{Duration, Instant};

    struct Echo(u32);

    impl Task for Echo {
        type Output = u32;
        fn process(self: Box<Self>) -> u32 {
            self.0
        }
    }

    struct Panics;

    impl Task for Panics {
        type Output = u32;
        fn process(self: Box<Self>) -> u32 {
            panic!("boom")
        }
    }

    struct WaitFor(Arc<Barrier>, u32);

    impl Task for WaitFor {
        type Output = u32;
        fn process(self: Box<Self>) -> u32 {
            self.0.wait();
            self.1
        }
    }

    fn collect_all(manager: &mut TaskManager<u32>, expected: usize) -> Vec<(TaskId, TaskOutcome<u32>)> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut results = Vec::new();
        while results.len() < expected && Instant::now() < deadline {
            manager.process_queued_tasks();
            results.extend(manager.process_completed_tasks());
            thread::yield_now();
        }
        results
    }

    #[test]
    fn inline_mode_runs_tasks_in_fifo_order() {
        let mut manager = TaskManager::new(0);
        let ids: Vec<TaskId> = (0..5).map(|i| manager.publish_task(Box::new(Echo(i)))).collect();
        assert!(manager.process_completed_tasks().is_empty());

        manager.process_queued_tasks();
        let results = manager.process_completed_tasks();
        let expected: Vec<_> = ids.into_iter().zip((0..5).map(Ok)).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn queued_tasks_can_be_cancelled() {
        let mut manager = TaskManager::new(0);
        let keep = manager.publish_task(Box::new(Echo(1)));
        let drop = manager.publish_task(Box::new(Echo(2)));
        assert!(manager.cancel_queued(drop));
        assert!(!manager.cancel_queued(drop));

        manager.process_queued_tasks();
        assert_eq!(manager.process_completed_tasks(), vec![(keep, Ok(1))]);
    }

    #[test]
    fn workers_process_every_task() {
        let mut manager = TaskManager::new(3);
        for i in 0..20 {
            manager.publish_task(Box::new(Echo(i)));
        }
        let mut values: Vec<u32> = collect_all(&mut manager, 20)
            .into_iter()
            .map(|(_, outcome)| outcome.unwrap())
            .collect();
        values.sort();
        assert_eq!(values, (0..20).collect::<Vec<_>>());
        assert_eq!(manager.in_flight_len(), 0);
    }

    #[test]
    fn busy_workers_leave_tasks_queued() {
        let barrier = Arc::new(Barrier::new(2));
        let mut manager = TaskManager::new(1);
        let running = manager.publish_task(Box::new(WaitFor(barrier.clone(), 1)));
        let queued = manager.publish_task(Box::new(Echo(2)));

        assert!(manager.is_running(running));
        assert!(!manager.is_running(queued));
        assert!(manager.cancel_queued(queued));

        barrier.wait();
        let results = collect_all(&mut manager, 1);
        assert_eq!(results, vec![(running, Ok(1))]);
    }

    #[test]
    fn panicking_tasks_report_an_error_and_keep_the_worker_alive() {
        let mut manager = TaskManager::new(1);
        let failing = manager.publish_task(Box::new(Panics));
        let results = collect_all(&mut manager, 1);
        assert_eq!(results, vec![(failing, Err("boom".to_string()))]);

        let next = manager.publish_task(Box::new(Echo(5)));
        assert_eq!(collect_all(&mut manager, 1), vec![(next, Ok(5))]);
    }
}
