use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cgmath::Point3;

use crate::engine_state::terrain::trigger::PositionProvider;

/// Shared value behind an `Arc<RwLock<T>>`.
///
/// The terrain uses it for values written by one system and polled by
/// another, most notably trigger positions: a camera or player controller owns
/// one clone and writes to it, the lifecycle manager holds another clone and
/// reads it once per update. The headless collaborators expose their scene
/// state the same way.
///
/// A writer that panicked while holding the lock does not take the readers
/// down with it; the last written value stays readable.
///
/// ```
/// use cgmath::Point3;
/// use voxel_terrain::core::MtResource;
///
/// let camera = MtResource::new(Point3::new(0.0, 0.0, 0.0));
/// let tracked = camera.clone();
///
/// *camera.get_mut() = Point3::new(10.0, 0.0, 0.0);
/// assert_eq!(tracked.get().x, 10.0);
/// ```
pub struct MtResource<T: Send + Sync> {
    pub resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Shared read access. Concurrent readers do not block each other.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive write access.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

impl PositionProvider for MtResource<Point3<f64>> {
    fn position(&self) -> Point3<f64> {
        *self.get()
    }
}
