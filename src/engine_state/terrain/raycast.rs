//! Integer voxel traversal for ray queries against resident density.

use cgmath::Point3;

use crate::engine_state::spatial::Aabb;

/// Result of [`super::BlockLifecycleManager::cast_ray`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayHit {
    /// First solid voxel along the ray.
    pub solid: Point3<i32>,
    /// The voxel visited just before `solid`, `None` when the ray starts inside solid.
    pub last_empty: Option<Point3<i32>>,
}

/// Voxels on the 3D Bresenham line from `from` to `to`, both included,
/// produced one at a time.
///
/// Every visited voxel lies in the box spanned by the endpoints, so the
/// arithmetic runs in `i64` and never overflows for `i32` endpoints.
#[derive(Clone, Debug)]
pub struct VoxelLine {
    current: [i64; 3],
    step: [i64; 3],
    delta: [i64; 3],
    major: usize,
    minor: [usize; 2],
    error: [i64; 2],
    remaining: u64,
}

impl Iterator for VoxelLine {
    type Item = Point3<i32>;

    fn next(&mut self) -> Option<Point3<i32>> {
        if self.remaining == 0 {
            return None;
        }
        let voxel = Point3::new(
            self.current[0] as i32,
            self.current[1] as i32,
            self.current[2] as i32,
        );
        self.remaining -= 1;

        if self.remaining > 0 {
            let major = self.major;
            self.current[major] += self.step[major];
            for (slot, axis) in self.minor.iter().enumerate() {
                if self.error[slot] > 0 {
                    self.current[*axis] += self.step[*axis];
                    self.error[slot] -= 2 * self.delta[major];
                }
                self.error[slot] += 2 * self.delta[*axis];
            }
        }
        Some(voxel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(remaining) => (remaining, Some(remaining)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Walks from `from` to `to`. See [`VoxelLine`].
pub fn voxel_line(from: Point3<i32>, to: Point3<i32>) -> VoxelLine {
    let from = [from.x as i64, from.y as i64, from.z as i64];
    let to = [to.x as i64, to.y as i64, to.z as i64];
    let delta = [
        (to[0] - from[0]).abs(),
        (to[1] - from[1]).abs(),
        (to[2] - from[2]).abs(),
    ];
    let step = [
        (to[0] - from[0]).signum(),
        (to[1] - from[1]).signum(),
        (to[2] - from[2]).signum(),
    ];

    // driving axis first
    let major = if delta[0] >= delta[1] && delta[0] >= delta[2] {
        0
    } else if delta[1] >= delta[2] {
        1
    } else {
        2
    };
    let minor = [(major + 1) % 3, (major + 2) % 3];

    VoxelLine {
        current: from,
        step,
        delta,
        major,
        minor,
        error: [
            2 * delta[minor[0]] - delta[major],
            2 * delta[minor[1]] - delta[major],
        ],
        remaining: delta[major] as u64 + 1,
    }
}

/// Clips the segment `from..=to` to `bounds` grown by one voxel, so a walk
/// over the result starts on an empty voxel outside the world whenever the
/// original segment did.
///
/// # Returns
/// The clipped endpoints, or `None` if the segment misses the bounds.
pub fn clip_to_world(
    from: Point3<i32>,
    to: Point3<i32>,
    bounds: &Aabb,
) -> Option<(Point3<i32>, Point3<i32>)> {
    let start = [from.x as f64, from.y as f64, from.z as f64];
    let direction = [
        to.x as f64 - start[0],
        to.y as f64 - start[1],
        to.z as f64 - start[2],
    ];

    let (mut enter, mut exit) = (0.0f64, 1.0f64);
    for axis in 0..3 {
        let low = bounds.min[axis] - 1.0;
        let high = bounds.max[axis] + 1.0;
        if direction[axis] == 0.0 {
            if start[axis] < low || start[axis] > high {
                return None;
            }
            continue;
        }
        let a = (low - start[axis]) / direction[axis];
        let b = (high - start[axis]) / direction[axis];
        enter = enter.max(a.min(b));
        exit = exit.min(a.max(b));
        if enter > exit {
            return None;
        }
    }

    let at = |t: f64| {
        let coordinate = |axis: usize| {
            let low = (bounds.min[axis] - 1.0).max(i32::MIN as f64);
            let high = (bounds.max[axis] + 1.0).min(i32::MAX as f64);
            (start[axis] + direction[axis] * t).round().clamp(low, high) as i32
        };
        Point3::new(coordinate(0), coordinate(1), coordinate(2))
    };
    let clipped_from = if enter == 0.0 { from } else { at(enter) };
    let clipped_to = if exit == 1.0 { to } else { at(exit) };
    Some((clipped_from, clipped_to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_lines_visit_every_voxel() {
        let line: Vec<_> = voxel_line(Point3::new(0, 5, 0), Point3::new(0, -3, 0)).collect();
        assert_eq!(line.len(), 9);
        assert_eq!(line[0], Point3::new(0, 5, 0));
        assert_eq!(line[8], Point3::new(0, -3, 0));
    }

    #[test]
    fn diagonal_lines_end_at_the_target_and_stay_connected() {
        let from = Point3::new(-4, 2, 7);
        let to = Point3::new(9, -5, 1);
        let line: Vec<_> = voxel_line(from, to).collect();
        assert_eq!(*line.last().unwrap(), to);
        assert_eq!(line.len(), 14);
        for pair in line.windows(2) {
            let step = pair[1] - pair[0];
            assert!(step.x.abs() <= 1 && step.y.abs() <= 1 && step.z.abs() <= 1);
        }
    }

    #[test]
    fn single_voxel_line() {
        let p = Point3::new(3, 3, 3);
        assert_eq!(voxel_line(p, p).collect::<Vec<_>>(), vec![p]);
    }

    #[test]
    fn extreme_endpoints_are_walked_lazily() {
        let mut line = voxel_line(
            Point3::new(-2_000_000_000, 0, 0),
            Point3::new(2_000_000_000, 0, 0),
        );
        assert!(line.size_hint().0 > 1_000_000_000);
        assert_eq!(line.next(), Some(Point3::new(-2_000_000_000, 0, 0)));
        assert_eq!(line.next(), Some(Point3::new(-1_999_999_999, 0, 0)));

        let corner: Vec<_> = voxel_line(
            Point3::new(i32::MIN, i32::MIN, 0),
            Point3::new(i32::MAX, i32::MAX, 0),
        )
        .take(2)
        .collect();
        assert_eq!(
            corner,
            vec![
                Point3::new(i32::MIN, i32::MIN, 0),
                Point3::new(i32::MIN + 1, i32::MIN + 1, 0)
            ]
        );
    }

    #[test]
    fn clipping_keeps_one_voxel_of_margin() {
        let bounds = Aabb::new([-64.0, -64.0, -64.0], [64.0, 64.0, 64.0]);

        let (from, to) = clip_to_world(
            Point3::new(0, 10, 0),
            Point3::new(0, -2_000_000_000, 0),
            &bounds,
        )
        .unwrap();
        assert_eq!(from, Point3::new(0, 10, 0));
        assert_eq!(to, Point3::new(0, -65, 0));

        let (from, to) = clip_to_world(
            Point3::new(i32::MIN, 3, 3),
            Point3::new(i32::MAX, 3, 3),
            &bounds,
        )
        .unwrap();
        assert_eq!(from, Point3::new(-65, 3, 3));
        assert_eq!(to, Point3::new(65, 3, 3));

        assert!(
            clip_to_world(Point3::new(0, 100, 0), Point3::new(50, 100, 0), &bounds).is_none()
        );
    }
}
