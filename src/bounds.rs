//! Axis-aligned bounding boxes and the slab test used by the spatial index.

use crate::types::{Point, Value, Vector};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point,
    pub max: Point,
}

impl Aabb {
    /// A box containing nothing; growing it by any point yields that point.
    pub fn empty() -> Self {
        Self {
            min: Point::new(Value::INFINITY, Value::INFINITY, Value::INFINITY),
            max: Point::new(Value::NEG_INFINITY, Value::NEG_INFINITY, Value::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.grow(p);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn grow(&mut self, p: &Point) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.grow(&other.min);
        out.grow(&other.max);
        out
    }

    /// Expand by `epsilon` on every side for numerical robustness.
    pub fn expand(&self, epsilon: Value) -> Self {
        let e = Vector::repeat(epsilon);
        Self {
            min: self.min - e,
            max: self.max + e,
        }
    }

    pub fn extents(&self) -> Vector {
        self.max - self.min
    }

    pub fn center(&self) -> Point {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> Value {
        self.extents().norm()
    }

    /// Axis of largest extent.
    pub fn longest_axis(&self) -> usize {
        self.extents().imax()
    }

    /// Clips the segment `origin + t * delta`, `t ∈ [0, 1]`, against the box.
    ///
    /// Returns the entry and exit parameters when the segment touches the box.
    /// Components of `delta` that are zero are handled as slabs the segment
    /// either lies inside or misses entirely.
    pub fn clip_segment(&self, origin: &Point, delta: &Vector) -> Option<(Value, Value)> {
        let mut t_min: Value = 0.0;
        let mut t_max: Value = 1.0;
        for axis in 0..3 {
            let d = delta[axis];
            if d == 0.0 {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let t1 = (self.min[axis] - origin[axis]) * inv;
            let t2 = (self.max[axis] - origin[axis]) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
            if t_max < t_min {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}
