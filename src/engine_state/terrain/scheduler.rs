//! # Generation Scheduler
//!
//! Runs extraction tasks on the worker pool and keeps at most one outstanding
//! submission per block. Submitting again for a block whose previous task is
//! still queued replaces that task; if the previous task already runs, it is
//! left to finish and its result is recognised as stale by its token.

use std::collections::HashMap;

use log::trace;

use crate::{
    engine_state::{
        task_management::{
            task::{TaskId, TaskOutcome},
            TaskManager,
        },
        voxels::block_key::BlockKey,
    },
    error::TerrainError,
};

use super::tasks::extraction_task::{ExtractionOutput, ExtractionTask};

/// Receipt for a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobHandle {
    pub key: BlockKey,
    pub token: u64,
    task: TaskId,
}

/// A job result collected by [`GenerationScheduler::drain`].
pub struct Completion {
    pub key: BlockKey,
    pub token: u64,
    pub output: Result<ExtractionOutput, TerrainError>,
}

/// Per-block deduplicating front end over the worker pool.
pub struct GenerationScheduler {
    task_manager: TaskManager<ExtractionOutput>,
    /// Every task not yet drained, queued or running.
    tasks: HashMap<TaskId, (BlockKey, u64)>,
    /// The latest submission per block.
    latest: HashMap<BlockKey, TaskId>,
}

impl GenerationScheduler {
    /// # Arguments
    /// * `worker_count` - Worker threads; zero runs jobs inline in [`Self::dispatch`]
    pub fn new(worker_count: usize) -> Self {
        GenerationScheduler {
            task_manager: TaskManager::new(worker_count),
            tasks: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.task_manager.worker_count()
    }

    /// Jobs submitted and not yet drained.
    pub fn pending_len(&self) -> usize {
        self.tasks.len()
    }

    /// Submits a job, replacing a queued job for the same block.
    pub fn submit(&mut self, job: ExtractionTask) -> JobHandle {
        let (key, token) = (job.key, job.token);
        self.cancel(&key);

        let task = self.task_manager.publish_task(Box::new(job));
        self.tasks.insert(task, (key, token));
        self.latest.insert(key, task);
        JobHandle { key, token, task }
    }

    /// Drops the block's queued job, if any.
    ///
    /// # Returns
    /// `true` if a job for the block is still running afterwards.
    pub fn cancel(&mut self, key: &BlockKey) -> bool {
        if let Some(previous) = self.latest.remove(key) {
            if self.task_manager.cancel_queued(previous) {
                trace!("Replaced queued job for {}", key);
                self.tasks.remove(&previous);
            }
        }
        self.has_pending(key)
    }

    /// True while any job for the block is queued, running, or finished but
    /// not yet drained.
    pub fn has_pending(&self, key: &BlockKey) -> bool {
        self.tasks.values().any(|(pending, _)| pending == key)
    }

    /// Hands queued jobs to idle workers, or runs them inline without workers.
    pub fn dispatch(&mut self) {
        self.task_manager.process_queued_tasks();
    }

    /// Collects every finished job. Never blocks.
    pub fn drain(&mut self) -> Vec<Completion> {
        self.task_manager
            .process_completed_tasks()
            .into_iter()
            .filter_map(|(task, outcome)| self.complete(task, outcome))
            .collect()
    }

    fn complete(&mut self, task: TaskId, outcome: TaskOutcome<ExtractionOutput>) -> Option<Completion> {
        let (key, token) = self.tasks.remove(&task)?;
        if self.latest.get(&key) == Some(&task) {
            self.latest.remove(&key);
        }

        let output = outcome.map_err(|reason| TerrainError::GenerationFailure {
            key,
            reason: format!("extraction panicked: {}", reason),
        });
        Some(Completion { key, token, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cgmath::Point3;

    use crate::engine_state::voxels::{density_block::Sample, density_source::ConstantDensity};

    fn job(key: BlockKey, token: u64) -> ExtractionTask {
        ExtractionTask {
            key,
            token,
            density: None,
            source: Arc::new(ConstantDensity(Sample::new(255, 0))),
            edits: Vec::new(),
            history_len: 0,
            parent: None,
            neighbor_lod_mask: 0,
            build_mesh: true,
        }
    }

    #[test]
    fn resubmitting_replaces_the_queued_job() {
        let key = BlockKey::new(0, Point3::new(0, 0, 0));
        let mut scheduler = GenerationScheduler::new(0);
        scheduler.submit(job(key, 1));
        scheduler.submit(job(key, 2));
        assert_eq!(scheduler.pending_len(), 1);

        scheduler.dispatch();
        let completions = scheduler.drain();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].token, 2);
        assert!(!scheduler.has_pending(&key));
    }

    #[test]
    fn cancel_reports_idle_blocks() {
        let key = BlockKey::new(1, Point3::new(2, 0, -1));
        let mut scheduler = GenerationScheduler::new(0);
        scheduler.submit(job(key, 1));
        assert!(scheduler.has_pending(&key));
        assert!(!scheduler.cancel(&key));
        scheduler.dispatch();
        assert!(scheduler.drain().is_empty());
    }

    #[test]
    fn jobs_for_different_blocks_all_complete() {
        let mut scheduler = GenerationScheduler::new(2);
        let keys: Vec<BlockKey> = (0..6)
            .map(|x| BlockKey::new(0, Point3::new(x, 0, 0)))
            .collect();
        for (token, key) in keys.iter().enumerate() {
            scheduler.submit(job(*key, token as u64));
        }

        let mut completed = Vec::new();
        let deadline = web_time::Instant::now() + web_time::Duration::from_secs(10);
        while completed.len() < keys.len() && web_time::Instant::now() < deadline {
            scheduler.dispatch();
            completed.extend(scheduler.drain());
            std::thread::yield_now();
        }

        assert_eq!(completed.len(), keys.len());
        for completion in completed {
            let output = completion.output.unwrap();
            assert_eq!(output.key, completion.key);
            assert_eq!(output.token, completion.token);
        }
        assert_eq!(scheduler.pending_len(), 0);
    }
}
