//! # Terrain Streaming
//!
//! The [`BlockLifecycleManager`] owns every resident block of the LOD
//! hierarchy and drives it through its lifecycle:
//!
//! ```text
//!   Empty ──submit──▶ Generating ──matching result──▶ Ready
//!     ▲                 │    ▲                          │
//!     │            edit │    │ submit                   │ edit / LOD change
//!     │                 ▼    │                          ▼
//!     │                 Dirty ◀─────────────────────────┘
//!     │
//!   (re-required)  any state ──no longer required──▶ Evicting ──▶ destroyed
//! ```
//!
//! ## Update order
//! Once per frame, [`BlockLifecycleManager::update`]:
//! 1. drains finished jobs and applies those whose token still matches,
//! 2. polls the triggers and, if they moved far enough, rebuilds the required set,
//! 3. evicts blocks that are no longer required and no longer needed on screen,
//! 4. submits `Empty` and `Dirty` blocks, nearest first,
//! 5. hands queued jobs to the workers,
//! 6. refreshes node visibility.
//!
//! ## Ownership
//! Every record, the spatial index and all state transitions live on the
//! thread that calls `update`. Jobs only ever see `Arc` snapshots of density,
//! so a job running for several frames never observes an edit; the token
//! check discards its result instead.

pub mod block_record;
pub mod lod;
pub mod raycast;
mod scene;
pub mod scheduler;
pub mod tasks;
pub mod trigger;

use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use cgmath::{MetricSpace, Point3};
use log::{debug, info, trace, warn};
use lru::LruCache;
use web_time::Duration;

use crate::{
    config::TerrainConfig,
    engine_state::{
        rendering::{NodeHandle, Physics, Renderer},
        spatial::{Aabb, Octree},
        voxels::{
            block_key::BlockKey,
            density_block::{DensityBlock, StoredBlock, SOLID_THRESHOLD},
            density_source::DensitySource,
            edit_operation::EditOperation,
        },
    },
    error::{Result, TerrainError},
};

use block_record::{BlockRecord, BlockState, MeshHandle};
use lod::LodLayout;
use raycast::{clip_to_world, voxel_line, RayHit};
use scene::SceneBinding;
use scheduler::{Completion, GenerationScheduler};
use tasks::extraction_task::ExtractionTask;
use trigger::{PositionProvider, TriggerId, TriggerTracker};

/// What one [`BlockLifecycleManager::update`] call did.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Jobs handed to the scheduler.
    pub submitted: usize,
    /// Results installed.
    pub applied: usize,
    /// Results dropped because their token no longer matched.
    pub stale_discarded: usize,
    /// Records destroyed.
    pub evicted: usize,
    /// Jobs that failed, retried or not.
    pub failures: usize,
    /// Non-fatal problems: collaborator refusals and blocks given up on.
    pub diagnostics: Vec<TerrainError>,
}

/// Owns the resident blocks and everything needed to keep them current.
pub struct BlockLifecycleManager {
    config: TerrainConfig,
    layout: LodLayout,
    source: Arc<dyn DensitySource>,
    scene: SceneBinding,
    records: HashMap<BlockKey, BlockRecord>,
    /// Block centers, for region queries.
    tree: Octree<BlockKey>,
    scheduler: GenerationScheduler,
    triggers: TriggerTracker,
    /// Trigger positions the current required set was built for.
    trigger_positions: Vec<Point3<f64>>,
    /// Every accepted edit, in application order.
    history: Vec<EditOperation>,
    /// Density of evicted or loaded blocks, used when they become required.
    cache: Option<LruCache<BlockKey, Arc<DensityBlock>>>,
    next_token: u64,
    since_stats: Duration,
}

fn issue_token(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

impl BlockLifecycleManager {
    /// Creates a manager with no resident blocks and no triggers.
    ///
    /// # Arguments
    /// * `config` - Validated before use
    /// * `source` - Fills newly generated blocks, shared with the workers
    /// * `renderer` / `physics` - Receive meshes and LOD 0 collision geometry
    /// * `root` - Scene node every block node is parented under
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration fails validation.
    pub fn new(
        config: TerrainConfig,
        source: Arc<dyn DensitySource>,
        renderer: Box<dyn Renderer>,
        physics: Box<dyn Physics>,
        root: NodeHandle,
    ) -> Result<Self> {
        config.validate()?;

        let layout = LodLayout::new(
            config.lod_radii.clone(),
            Point3::from(config.world_min),
            Point3::from(config.world_max),
        );
        let tree = Octree::new(layout.world_bounds());
        let cache = NonZeroUsize::new(config.density_cache_capacity).map(LruCache::new);

        info!(
            "Terrain initialized: {} LODs, radii {:?}, world {:?}..{:?}",
            config.lod_radii.len(),
            config.lod_radii,
            config.world_min,
            config.world_max
        );

        Ok(BlockLifecycleManager {
            scheduler: GenerationScheduler::new(config.worker_count),
            scene: SceneBinding::new(renderer, physics, root, config.material_id),
            layout,
            source,
            records: HashMap::new(),
            tree,
            triggers: TriggerTracker::new(),
            trigger_positions: Vec::new(),
            history: Vec::new(),
            cache,
            next_token: 0,
            since_stats: Duration::ZERO,
            config,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn layout(&self) -> &LodLayout {
        &self.layout
    }

    /// Registers or replaces a trigger. Takes effect on the next update.
    pub fn register_trigger(&mut self, id: TriggerId, provider: impl PositionProvider + 'static) {
        self.triggers.register(id, Box::new(provider));
    }

    /// Returns `false` if no trigger had this id.
    pub fn unregister_trigger(&mut self, id: TriggerId) -> bool {
        self.triggers.unregister(id)
    }

    /// Trigger positions the current required set was built for.
    pub fn trigger_positions(&self) -> &[Point3<f64>] {
        &self.trigger_positions
    }

    pub fn block(&self, key: &BlockKey) -> Option<&BlockRecord> {
        self.records.get(key)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockRecord> {
        self.records.values()
    }

    pub fn resident_count(&self) -> usize {
        self.records.len()
    }

    /// Jobs submitted and not yet drained.
    pub fn pending_jobs(&self) -> usize {
        self.scheduler.pending_len()
    }

    pub fn edit_history(&self) -> &[EditOperation] {
        &self.history
    }

    /// True once nothing is left to do: no jobs outstanding, every resident
    /// block required and `Ready`, no fallback or lingering meshes.
    pub fn is_settled(&self) -> bool {
        self.scheduler.pending_len() == 0
            && self.records.values().all(|record| {
                record.required && record.state == BlockState::Ready && !record.is_fallback()
            })
    }

    /// Resident blocks whose center lies within `radius` of `center`.
    pub fn blocks_within(&self, center: Point3<f64>, radius: f64) -> Vec<BlockKey> {
        self.tree
            .query(&Aabb::around([center.x, center.y, center.z], radius))
            .into_iter()
            .filter(|key| key.center().distance(center) <= radius)
            .collect()
    }

    /// Applies an edit to every resident block it reaches and records it, so
    /// blocks generated later replay it.
    ///
    /// Density changes immediately; meshes follow once the affected blocks
    /// have been regenerated by later updates.
    ///
    /// # Returns
    /// Number of resident blocks whose data the edit reached.
    ///
    /// # Errors
    /// `OutOfBounds` if the edit lies entirely outside the world.
    pub fn apply_edit(&mut self, edit: EditOperation) -> Result<usize> {
        let bounds = edit.bounds();
        if !bounds.intersects(&self.layout.world_bounds()) {
            return Err(TerrainError::out_of_bounds(
                "world",
                Point3::from(bounds.center()),
            ));
        }

        self.history.push(edit);

        // loaded density cannot be regenerated, so cached blocks are edited in place
        if let Some(cache) = self.cache.as_mut() {
            for (key, density) in cache.iter_mut() {
                if key.bounds().intersects(&bounds) {
                    edit.apply(Arc::make_mut(density), key.origin(), key.scale());
                }
            }
        }

        let reach = BlockKey::size_at(self.layout.coarsest_lod()) as f64 * 0.5;
        let mut affected = 0;
        for key in self.tree.query(&bounds.expanded(reach)) {
            if !key.bounds().intersects(&bounds) {
                continue;
            }
            let Some(record) = self.records.get_mut(&key) else {
                continue;
            };

            let changed = match record.density.as_mut() {
                Some(density) => edit.apply(Arc::make_mut(density), key.origin(), key.scale()),
                // density still being generated; the history is replayed on adoption
                None => matches!(record.state, BlockState::Generating | BlockState::Dirty),
            };
            if !changed {
                continue;
            }

            affected += 1;
            if record.required && record.leaf && record.state != BlockState::Empty {
                record.state = BlockState::Dirty;
                record.generation_token = issue_token(&mut self.next_token);
            }
        }

        debug!(
            "Edit {:?} reached {} resident blocks ({} edits recorded)",
            edit.shape,
            affected,
            self.history.len()
        );
        Ok(affected)
    }

    /// Density of the LOD 0 sample at a world voxel. `None` if the LOD 0 block
    /// holding it is not resident or has no density yet.
    pub fn voxel_density(&self, position: Point3<i32>) -> Option<u8> {
        let key = BlockKey::containing(position, 0);
        let density = self.records.get(&key)?.density.as_ref()?;
        let origin = key.origin();
        density
            .get(
                (position.x - origin.x) as usize,
                (position.y - origin.y) as usize,
                (position.z - origin.z) as usize,
            )
            .map(|sample| sample.density)
    }

    /// Walks the LOD 0 voxels from `from` to `to` and reports the first solid
    /// one. Voxels without resident density count as empty. The walk is
    /// clipped to the world and stops at the first hit.
    pub fn cast_ray(&self, from: Point3<i32>, to: Point3<i32>) -> Option<RayHit> {
        let (from, to) = clip_to_world(from, to, &self.layout.world_bounds())?;
        let mut last_empty = None;
        for voxel in voxel_line(from, to) {
            if self
                .voxel_density(voxel)
                .is_some_and(|density| density > SOLID_THRESHOLD)
            {
                return Some(RayHit {
                    solid: voxel,
                    last_empty,
                });
            }
            last_empty = Some(voxel);
        }
        None
    }

    /// Persistable density of a resident block.
    pub fn export_block(&self, key: &BlockKey) -> Option<StoredBlock> {
        let density = self.records.get(key)?.density.as_ref()?;
        Some(StoredBlock::new(*key, density))
    }

    /// Installs previously stored density.
    ///
    /// Resident blocks take it over immediately and are remeshed. Other blocks
    /// are placed in the density cache and picked up when they become required.
    ///
    /// # Errors
    /// - `OutOfBounds` for keys outside the world or above the coarsest LOD
    /// - `GenerationFailure` for a sample array of the wrong length
    /// - `InvalidConfig` for non-resident blocks when the cache is disabled
    pub fn load_block(&mut self, stored: StoredBlock) -> Result<()> {
        let (key, density) = stored.into_density()?;
        if key.lod > self.layout.coarsest_lod() || !self.layout.contains(&key) {
            return Err(TerrainError::out_of_bounds("world", key.center()));
        }
        let density = Arc::new(density);

        match self.records.get_mut(&key) {
            Some(record) => {
                record.density = Some(density);
                if record.required && record.leaf && record.state != BlockState::Empty {
                    record.state = BlockState::Dirty;
                    record.generation_token = issue_token(&mut self.next_token);
                }
            }
            None => match self.cache.as_mut() {
                Some(cache) => {
                    cache.put(key, density);
                }
                None => {
                    return Err(TerrainError::InvalidConfig(format!(
                        "cannot load non-resident block {} with the density cache disabled",
                        key
                    )))
                }
            },
        }
        Ok(())
    }

    /// Advances the terrain by one frame. Never blocks on generation jobs.
    pub fn update(&mut self, delta_time: Duration) -> UpdateReport {
        let mut report = UpdateReport::default();

        for completion in self.scheduler.drain() {
            self.apply_completion(completion, &mut report);
        }

        if let Some(positions) = self.triggers.poll(self.config.rediscovery_distance) {
            self.trigger_positions = positions;
            self.rebuild_required();
        }

        self.sweep_unrequired(&mut report);
        self.submit_jobs(&mut report);
        self.scheduler.dispatch();
        self.refresh_visibility();

        if report.submitted + report.applied + report.evicted + report.failures > 0 {
            debug!(
                "Terrain update: {} submitted, {} applied, {} stale, {} evicted, {} failed",
                report.submitted,
                report.applied,
                report.stale_discarded,
                report.evicted,
                report.failures
            );
        }

        self.since_stats += delta_time;
        if self.since_stats.as_secs_f64() >= self.config.stats_interval_secs {
            self.since_stats = Duration::ZERO;
            self.log_stats();
        }

        report
    }

    fn apply_completion(&mut self, completion: Completion, report: &mut UpdateReport) {
        let key = completion.key;
        let Some(record) = self.records.get_mut(&key) else {
            // destroyed while the job ran
            report.stale_discarded += 1;
            return;
        };

        let (generated, history_len, mesh) = match completion.output {
            Ok(output) => {
                trace!("Extraction of {} took {:?}", key, output.elapsed);
                (output.generated, output.history_len, output.mesh)
            }
            Err(error) => (None, 0, Err(error)),
        };

        // Generated density is valid whatever the token: it covers the history
        // up to `history_len`, and the rest is replayed here.
        if let Some(mut density) = generated.filter(|_| record.density.is_none()) {
            let bounds = key.bounds();
            for edit in &self.history[history_len.min(self.history.len())..] {
                if edit.bounds().intersects(&bounds) {
                    edit.apply(Arc::make_mut(&mut density), key.origin(), key.scale());
                }
            }
            record.density = Some(density);
        }

        if completion.token != record.generation_token {
            trace!(
                "Discarded stale result for {} (token {}, current {})",
                key,
                completion.token,
                record.generation_token
            );
            report.stale_discarded += 1;
            return;
        }

        match mesh {
            Ok(mesh) => {
                record.retries = 0;
                record.state = BlockState::Ready;
                if let Some(mesh) = mesh {
                    let handle = self.scene.present(key, mesh, &mut report.diagnostics);
                    if let Some(previous) = record.mesh.replace(handle) {
                        self.scene.release(previous);
                    }
                }
                report.applied += 1;
            }
            Err(error) => {
                report.failures += 1;
                record.retries += 1;
                if record.retries > self.config.retry_cap {
                    warn!(
                        "Giving up on {} after {} failed generations: {}",
                        key, record.retries, error
                    );
                    record.state = BlockState::Ready;
                    if record.leaf && record.mesh.is_none() {
                        record.mesh = Some(MeshHandle::empty());
                    }
                    report.diagnostics.push(error);
                } else {
                    debug!(
                        "Generation of {} failed (attempt {}), retrying: {}",
                        key, record.retries, error
                    );
                    record.state = BlockState::Dirty;
                }
            }
        }
    }

    /// Recomputes the required set for the current trigger positions and
    /// brings every record's role in line with it.
    fn rebuild_required(&mut self) {
        let required = self.layout.required_blocks(&self.trigger_positions);

        for record in self.records.values_mut() {
            record.required = false;
        }

        let mut created = 0;
        for (key, role) in &required {
            match self.records.get_mut(key) {
                Some(record) => {
                    record.required = true;
                    let changed = record.leaf != role.leaf
                        || record.neighbor_lod_mask != role.neighbor_lod_mask;
                    record.leaf = role.leaf;
                    record.neighbor_lod_mask = role.neighbor_lod_mask;

                    if record.state == BlockState::Evicting {
                        // handles were released when eviction began
                        record.state = BlockState::Empty;
                    } else if changed
                        && matches!(record.state, BlockState::Generating | BlockState::Ready)
                    {
                        record.state = BlockState::Dirty;
                        record.generation_token = issue_token(&mut self.next_token);
                    }
                }
                None => {
                    let density = self.cache.as_mut().and_then(|cache| cache.pop(key));
                    let mut record = BlockRecord::new(*key, density);
                    record.leaf = role.leaf;
                    record.neighbor_lod_mask = role.neighbor_lod_mask;

                    if let Err(error) = self.tree.insert_point(*key, key.center()) {
                        warn!("Could not index block {}: {}", key, error);
                    }
                    self.records.insert(*key, record);
                    created += 1;
                }
            }
        }

        debug!(
            "Required set rebuilt for {} triggers: {} blocks, {} new",
            self.trigger_positions.len(),
            required.len(),
            created
        );
    }

    /// True if the record currently has a node in the scene.
    fn is_displayed(&self, key: &BlockKey) -> bool {
        self.records
            .get(key)
            .and_then(|record| record.mesh.as_ref())
            .is_some_and(|handle| handle.node.is_some())
    }

    /// True once the required leaf covering `key`'s region can be shown, or
    /// when nothing covers the region any more.
    fn replacement_ready(&self, key: &BlockKey) -> bool {
        let top = self.layout.coarsest_lod();
        let mut current = *key;
        while current.lod < top {
            current = current.parent();
            if let Some(record) = self.records.get(&current) {
                if record.required {
                    return record.is_resolved_leaf();
                }
            }
        }
        true
    }

    /// Starts evicting unrequired blocks that nothing waits on and destroys
    /// evicting blocks no job references any more.
    fn sweep_unrequired(&mut self, report: &mut UpdateReport) {
        let unrequired: Vec<BlockKey> = self
            .records
            .values()
            .filter(|record| record.is_lingering())
            .map(|record| record.key)
            .collect();

        for key in unrequired {
            if self.is_displayed(&key) && !self.replacement_ready(&key) {
                continue;
            }
            let Some(record) = self.records.get_mut(&key) else {
                continue;
            };
            record.state = BlockState::Evicting;
            record.generation_token = issue_token(&mut self.next_token);
            if let Some(handle) = record.mesh.take() {
                self.scene.release(handle);
            }
            self.scheduler.cancel(&key);
        }

        let finished: Vec<BlockKey> = self
            .records
            .values()
            .filter(|record| {
                record.state == BlockState::Evicting && !self.scheduler.has_pending(&record.key)
            })
            .map(|record| record.key)
            .collect();

        for key in finished {
            let Some(record) = self.records.remove(&key) else {
                continue;
            };
            self.tree.remove(&key);
            if let (Some(cache), Some(density)) = (self.cache.as_mut(), record.density) {
                cache.put(key, density);
            }
            report.evicted += 1;
        }

        if report.evicted > 0 {
            debug!("Evicted {} blocks, {} resident", report.evicted, self.records.len());
        }
    }

    /// Submits required `Empty` and `Dirty` blocks, nearest first.
    ///
    /// Blocks that are not leaves only need density and become `Ready` as soon
    /// as they have it. Leaves that border a coarser LOD wait until their
    /// parent has density to stitch against.
    fn submit_jobs(&mut self, report: &mut UpdateReport) {
        let mut candidates: Vec<(f64, BlockKey)> = self
            .records
            .values()
            .filter(|record| {
                record.required && matches!(record.state, BlockState::Empty | BlockState::Dirty)
            })
            .map(|record| {
                let distance = self
                    .layout
                    .distance_to_triggers(&record.key, &self.trigger_positions);
                (distance, record.key)
            })
            .collect();
        // coarser blocks first on ties, so parents get their density early
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(b.1.lod.cmp(&a.1.lod)));

        for (_, key) in candidates {
            let Some(record) = self.records.get(&key) else {
                continue;
            };

            if !record.leaf && record.density.is_some() {
                if let Some(record) = self.records.get_mut(&key) {
                    record.state = BlockState::Ready;
                    record.retries = 0;
                }
                continue;
            }

            let parent = if record.leaf && record.neighbor_lod_mask != 0 {
                match self.records.get(&key.parent()) {
                    Some(parent) if parent.density.is_some() => parent.density.clone(),
                    Some(parent) if parent.state != BlockState::Ready => continue,
                    _ => None,
                }
            } else {
                None
            };

            let edits = match record.density {
                Some(_) => Vec::new(),
                None => {
                    let bounds = key.bounds();
                    self.history
                        .iter()
                        .filter(|edit| edit.bounds().intersects(&bounds))
                        .copied()
                        .collect()
                }
            };

            let mut job = ExtractionTask {
                key,
                token: 0,
                density: record.density.clone(),
                source: self.source.clone(),
                edits,
                history_len: self.history.len(),
                parent,
                neighbor_lod_mask: record.neighbor_lod_mask,
                build_mesh: record.leaf,
            };

            let token = issue_token(&mut self.next_token);
            job.token = token;
            if let Some(record) = self.records.get_mut(&key) {
                record.generation_token = token;
                record.state = BlockState::Generating;
            }
            self.scheduler.submit(job);
            report.submitted += 1;
        }
    }

    /// Every block covering `key`'s region at `key`'s LOD or finer is a
    /// resolved required leaf.
    fn is_covered(&self, key: &BlockKey) -> bool {
        match self.records.get(key) {
            Some(record) if record.required && record.leaf => record.mesh.is_some(),
            Some(record) if record.required && key.lod > 0 => {
                key.children().iter().all(|child| self.is_covered(child))
            }
            _ => false,
        }
    }

    fn has_fallback_ancestor(&self, key: &BlockKey) -> bool {
        let top = self.layout.coarsest_lod();
        let mut current = *key;
        while current.lod < top {
            current = current.parent();
            if self
                .records
                .get(&current)
                .is_some_and(|record| record.is_fallback())
            {
                return true;
            }
        }
        false
    }

    /// Releases fallback meshes whose children are all shown and decides
    /// which nodes are visible.
    ///
    /// A fallback (a refined block still holding its old mesh) stays visible
    /// while any part of its region lacks a mesh, and hides everything below
    /// it meanwhile so the two LODs never overlap.
    fn refresh_visibility(&mut self) {
        let covered: Vec<BlockKey> = self
            .records
            .values()
            .filter(|record| {
                record.is_fallback()
                    && record.key.lod > 0
                    && record
                        .key
                        .children()
                        .iter()
                        .all(|child| self.is_covered(child))
            })
            .map(|record| record.key)
            .collect();

        for key in covered {
            if let Some(handle) = self
                .records
                .get_mut(&key)
                .and_then(|record| record.mesh.take())
            {
                trace!("Released fallback mesh of {}", key);
                self.scene.release(handle);
            }
        }

        let decisions: Vec<(BlockKey, bool)> = self
            .records
            .values()
            .filter(|record| record.mesh.as_ref().is_some_and(|handle| handle.node.is_some()))
            .map(|record| {
                let visible = match (record.required, record.leaf) {
                    (false, _) => {
                        record.state != BlockState::Evicting
                            && !self.has_fallback_ancestor(&record.key)
                    }
                    (true, false) => true,
                    (true, true) => !self.has_fallback_ancestor(&record.key),
                };
                (record.key, visible)
            })
            .collect();

        for (key, visible) in decisions {
            if let Some(handle) = self
                .records
                .get_mut(&key)
                .and_then(|record| record.mesh.as_mut())
            {
                self.scene.set_visible(handle, visible);
            }
        }
    }

    fn log_stats(&self) {
        let leaves = self.records.values().filter(|r| r.required && r.leaf).count();
        let ready = self
            .records
            .values()
            .filter(|r| r.state == BlockState::Ready)
            .count();
        let triangles: usize = self
            .records
            .values()
            .filter(|r| r.mesh.as_ref().is_some_and(|handle| handle.visible))
            .map(|r| r.triangle_count())
            .sum();

        info!(
            "Terrain: {} resident ({} leaves, {} ready), {} visible triangles, {} jobs pending, {} cached, {} edits",
            self.records.len(),
            leaves,
            ready,
            triangles,
            self.scheduler.pending_len(),
            self.cache.as_ref().map_or(0, |cache| cache.len()),
            self.history.len()
        );
    }
}

impl Drop for BlockLifecycleManager {
    fn drop(&mut self) {
        for record in self.records.values_mut() {
            if let Some(handle) = record.mesh.take() {
                self.scene.release(handle);
            }
        }
    }
}
