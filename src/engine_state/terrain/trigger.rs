//! Trigger tracking.
//!
//! A trigger is a world position the terrain must be detailed around, usually
//! a camera or a player. Triggers are polled once per update; the required
//! block set is only recomputed when one of them has moved far enough or the
//! set of triggers changed.

use std::collections::BTreeMap;

use cgmath::{MetricSpace, Point3};

/// Caller-chosen trigger id.
pub type TriggerId = u64;

/// Supplies the current position of a trigger.
pub trait PositionProvider {
    fn position(&self) -> Point3<f64>;
}

impl<F> PositionProvider for F
where
    F: Fn() -> Point3<f64>,
{
    fn position(&self) -> Point3<f64> {
        self()
    }
}

/// Registered triggers plus the positions the current required set was built for.
#[derive(Default)]
pub struct TriggerTracker {
    providers: BTreeMap<TriggerId, Box<dyn PositionProvider>>,
    /// Positions at the last rediscovery, keyed like `providers`.
    anchors: BTreeMap<TriggerId, Point3<f64>>,
    changed: bool,
}

impl TriggerTracker {
    pub fn new() -> Self {
        TriggerTracker {
            changed: true,
            ..Default::default()
        }
    }

    /// Registers or replaces a trigger.
    pub fn register(&mut self, id: TriggerId, provider: Box<dyn PositionProvider>) {
        self.providers.insert(id, provider);
        self.changed = true;
    }

    /// Removes a trigger. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: TriggerId) -> bool {
        let removed = self.providers.remove(&id).is_some();
        self.anchors.remove(&id);
        self.changed |= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Polls every trigger.
    ///
    /// # Returns
    /// The current positions if the required set needs rebuilding: a trigger
    /// moved at least `rediscovery_distance` since the last rebuild, or
    /// triggers were registered or unregistered. `None` otherwise.
    pub fn poll(&mut self, rediscovery_distance: f64) -> Option<Vec<Point3<f64>>> {
        let current: Vec<(TriggerId, Point3<f64>)> = self
            .providers
            .iter()
            .map(|(id, provider)| (*id, provider.position()))
            .collect();

        let moved = current.iter().any(|(id, position)| {
            self.anchors
                .get(id)
                .map_or(true, |anchor| anchor.distance(*position) >= rediscovery_distance)
        });

        if !(moved || self.changed) {
            return None;
        }

        self.changed = false;
        self.anchors = current.iter().copied().collect();
        Some(current.into_iter().map(|(_, position)| position).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MtResource;

    #[test]
    fn rebuild_only_after_significant_movement() {
        let camera = MtResource::new(Point3::new(0.0, 0.0, 0.0));
        let mut tracker = TriggerTracker::new();
        tracker.register(1, Box::new(camera.clone()));

        assert_eq!(tracker.poll(4.0), Some(vec![Point3::new(0.0, 0.0, 0.0)]));
        assert_eq!(tracker.poll(4.0), None);

        *camera.get_mut() = Point3::new(3.0, 0.0, 0.0);
        assert_eq!(tracker.poll(4.0), None);

        *camera.get_mut() = Point3::new(4.5, 0.0, 0.0);
        assert_eq!(tracker.poll(4.0), Some(vec![Point3::new(4.5, 0.0, 0.0)]));
    }

    #[test]
    fn registration_changes_force_a_rebuild() {
        let mut tracker = TriggerTracker::new();
        tracker.register(1, Box::new(|| Point3::new(1.0, 2.0, 3.0)));
        assert!(tracker.poll(1.0).is_some());

        tracker.register(2, Box::new(|| Point3::new(-5.0, 0.0, 0.0)));
        assert_eq!(tracker.poll(1.0).map(|p| p.len()), Some(2));

        assert!(tracker.unregister(1));
        assert!(!tracker.unregister(1));
        assert_eq!(tracker.poll(1.0), Some(vec![Point3::new(-5.0, 0.0, 0.0)]));
        assert_eq!(tracker.len(), 1);
    }
}
