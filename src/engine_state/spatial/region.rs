//! Axis-aligned regions in two or three dimensions.
//!
//! All containment and intersection tests are closed on both ends, so a point
//! lying exactly on a shared boundary belongs to both neighbouring regions.

use cgmath::Point3;

/// An axis-aligned region: a rectangle for `D = 2`, a box for `D = 3`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

/// A 2D rectangle.
pub type Rect = Region<2>;
/// A 3D axis-aligned bounding box.
pub type Aabb = Region<3>;

impl<const D: usize> Region<D> {
    pub fn new(min: [f64; D], max: [f64; D]) -> Self {
        Region { min, max }
    }

    /// Region spanning `center - half_extent ..= center + half_extent` on every axis.
    pub fn around(center: [f64; D], half_extent: f64) -> Self {
        let mut min = center;
        let mut max = center;
        for axis in 0..D {
            min[axis] -= half_extent;
            max[axis] += half_extent;
        }
        Region { min, max }
    }

    pub fn center(&self) -> [f64; D] {
        let mut center = [0.0; D];
        for (axis, c) in center.iter_mut().enumerate() {
            *c = (self.min[axis] + self.max[axis]) * 0.5;
        }
        center
    }

    pub fn contains(&self, point: &[f64; D]) -> bool {
        (0..D).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    pub fn intersects(&self, other: &Region<D>) -> bool {
        (0..D).all(|axis| self.min[axis] <= other.max[axis] && other.min[axis] <= self.max[axis])
    }

    /// Intersection of two regions, `None` if they are disjoint.
    pub fn intersection(&self, other: &Region<D>) -> Option<Region<D>> {
        if !self.intersects(other) {
            return None;
        }
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..D {
            min[axis] = min[axis].max(other.min[axis]);
            max[axis] = max[axis].min(other.max[axis]);
        }
        Some(Region { min, max })
    }

    /// Grows the region by `amount` on every side.
    pub fn expanded(&self, amount: f64) -> Self {
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..D {
            min[axis] -= amount;
            max[axis] += amount;
        }
        Region { min, max }
    }

    /// Euclidean distance from `point` to the closest point of the region.
    /// Zero when the point lies inside.
    pub fn distance_to(&self, point: &[f64; D]) -> f64 {
        let mut sum = 0.0;
        for axis in 0..D {
            let d = if point[axis] < self.min[axis] {
                self.min[axis] - point[axis]
            } else if point[axis] > self.max[axis] {
                point[axis] - self.max[axis]
            } else {
                0.0
            };
            sum += d * d;
        }
        sum.sqrt()
    }

    /// One of the `2^D` uniform sub-regions. Bit `axis` of `index` selects the
    /// upper half on that axis.
    pub fn child(&self, index: usize) -> Region<D> {
        let center = self.center();
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..D {
            if index & (1 << axis) != 0 {
                min[axis] = center[axis];
            } else {
                max[axis] = center[axis];
            }
        }
        Region { min, max }
    }

    /// Index of the sub-region a point falls into, by comparing it to the
    /// center on every axis. Points on the center plane go to the lower half.
    pub fn child_index(&self, point: &[f64; D]) -> usize {
        let center = self.center();
        let mut index = 0;
        for axis in 0..D {
            if point[axis] > center[axis] {
                index |= 1 << axis;
            }
        }
        index
    }
}

impl Aabb {
    pub fn from_points(min: Point3<f64>, max: Point3<f64>) -> Self {
        Region {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_tile_the_parent() {
        let region = Rect::new([0.0, 0.0], [10.0, 20.0]);
        assert_eq!(region.child(0), Rect::new([0.0, 0.0], [5.0, 10.0]));
        assert_eq!(region.child(1), Rect::new([5.0, 0.0], [10.0, 10.0]));
        assert_eq!(region.child(2), Rect::new([0.0, 10.0], [5.0, 20.0]));
        assert_eq!(region.child(3), Rect::new([5.0, 10.0], [10.0, 20.0]));
    }

    #[test]
    fn child_index_matches_child_region() {
        let region = Aabb::new([-8.0, -8.0, -8.0], [8.0, 8.0, 8.0]);
        let point = [3.0, -1.0, 7.0];
        let index = region.child_index(&point);
        assert_eq!(index, 0b101);
        assert!(region.child(index).contains(&point));
    }

    #[test]
    fn distance_is_zero_inside_and_euclidean_outside() {
        let region = Aabb::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        assert_eq!(region.distance_to(&[0.5, 0.5, 0.5]), 0.0);
        assert!((region.distance_to(&[4.0, 5.0, 0.5]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn boundaries_are_closed() {
        let a = Rect::new([0.0, 0.0], [1.0, 1.0]);
        let b = Rect::new([1.0, 0.0], [2.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(a.contains(&[1.0, 1.0]));
        assert_eq!(a.intersection(&b), Some(Rect::new([1.0, 0.0], [1.0, 1.0])));
    }
}
