//! # Terrain Configuration
//!
//! Tunables for the lifecycle manager. Every field has a default, so a JSON
//! file only needs the values it changes:
//!
//! ```
//! use voxel_terrain::config::TerrainConfig;
//!
//! let config = TerrainConfig::from_json_str(r#"{ "lod_radii": [32.0, 128.0], "worker_count": 0 }"#).unwrap();
//! assert_eq!(config.lod_radii, vec![32.0, 128.0]);
//! assert_eq!(config.retry_cap, 3);
//! ```

use std::{fs, path::Path, thread};

use serde::{Deserialize, Serialize};

use crate::{
    engine_state::voxels::block_key::BlockKey,
    error::{Result, TerrainError},
};

/// Deepest hierarchy accepted by [`TerrainConfig::validate`].
pub const MAX_LOD_COUNT: usize = 16;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Outer radius of each LOD ring in world units, finest first.
    pub lod_radii: Vec<f64>,
    /// Lower world corner in LOD 0 voxels. Must be a multiple of the coarsest
    /// block size.
    pub world_min: [i32; 3],
    /// Upper world corner (exclusive), same alignment as `world_min`.
    pub world_max: [i32; 3],
    /// Generation worker threads. Zero runs jobs inline during `update`.
    pub worker_count: usize,
    /// Failed generations tolerated per block before it is given up on.
    pub retry_cap: u32,
    /// Distance a trigger must travel before the required set is rebuilt.
    pub rediscovery_distance: f64,
    /// Evicted blocks whose density is kept for reuse. Zero disables the cache.
    pub density_cache_capacity: usize,
    /// Seconds between residency statistics log lines.
    pub stats_interval_secs: f64,
    /// Material id handed to the renderer for every terrain node.
    pub material_id: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        let worker_count = thread::available_parallelism()
            .map(|count| count.get().saturating_sub(1).max(1))
            .unwrap_or(2);

        TerrainConfig {
            lod_radii: Self::doubling(64.0, 4),
            world_min: [-4096, -256, -4096],
            world_max: [4096, 256, 4096],
            worker_count,
            retry_cap: 3,
            rediscovery_distance: 8.0,
            density_cache_capacity: 256,
            stats_interval_secs: 5.0,
            material_id: 0,
        }
    }
}

impl TerrainConfig {
    /// Radii that double with every LOD, starting at `base_radius`.
    pub fn doubling(base_radius: f64, lod_count: usize) -> Vec<f64> {
        (0..lod_count)
            .map(|lod| base_radius * (1u64 << lod) as f64)
            .collect()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn coarsest_lod(&self) -> u8 {
        self.lod_radii.len().saturating_sub(1) as u8
    }

    /// Checks the invariants the lifecycle manager relies on.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(TerrainError::InvalidConfig(reason));

        if self.lod_radii.is_empty() || self.lod_radii.len() > MAX_LOD_COUNT {
            return invalid(format!(
                "expected between 1 and {} LOD radii, got {}",
                MAX_LOD_COUNT,
                self.lod_radii.len()
            ));
        }
        if self.lod_radii.iter().any(|radius| !radius.is_finite() || *radius <= 0.0) {
            return invalid("LOD radii must be finite and positive".to_string());
        }
        if self.lod_radii.windows(2).any(|pair| pair[1] <= pair[0]) {
            return invalid(format!(
                "LOD radii must be strictly increasing: {:?}",
                self.lod_radii
            ));
        }

        let size = BlockKey::size_at(self.coarsest_lod());
        for axis in 0..3 {
            let (low, high) = (self.world_min[axis], self.world_max[axis]);
            if low >= high {
                return invalid(format!("world bounds are inverted on axis {}", axis));
            }
            if low.rem_euclid(size) != 0 || high.rem_euclid(size) != 0 {
                return invalid(format!(
                    "world bounds on axis {} are not aligned to the coarsest block size {}",
                    axis, size
                ));
            }
        }

        if !(self.rediscovery_distance >= 0.0) {
            return invalid("rediscovery distance must not be negative".to_string());
        }
        if !(self.stats_interval_secs > 0.0) {
            return invalid("stats interval must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = TerrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lod_radii, vec![64.0, 128.0, 256.0, 512.0]);
        assert!(config.worker_count >= 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TerrainConfig::from_json_str(
            r#"{ "lod_radii": [32.0, 128.0], "world_min": [-256, -64, -256], "world_max": [256, 64, 256] }"#,
        )
        .unwrap();
        assert_eq!(config.coarsest_lod(), 1);
        assert_eq!(config.density_cache_capacity, 256);
    }

    #[test]
    fn rejects_unusable_layouts() {
        let mut config = TerrainConfig::default();
        config.lod_radii = vec![64.0, 64.0];
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig(_))));

        let mut config = TerrainConfig::default();
        config.world_min = [-100, -256, -4096];
        assert!(config.validate().is_err());

        let mut config = TerrainConfig::default();
        config.world_max[1] = config.world_min[1];
        assert!(config.validate().is_err());

        assert!(matches!(
            TerrainConfig::from_json_str("{ \"lod_radii\": 3 }"),
            Err(TerrainError::Parse(_))
        ));
    }
}
