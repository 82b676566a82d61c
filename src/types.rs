use nalgebra::{Matrix3, Point3, Vector3};

/// Coordinate and scalar precision used by every stage.
///
/// Surface meshes handed over by segmentation carry double-precision points, and
/// the thickness probes are computed in the same precision.
pub type Value = f64;

/// A 3D point with [`Value`] components.
pub type Point = Point3<Value>;

/// A 3D vector with [`Value`] components.
pub type Vector = Vector3<Value>;

/// A 3×3 matrix with [`Value`] components.
pub type Matrix = Matrix3<Value>;

/// An RGB triple with channels in `[0, 1]`.
pub type Rgb = [f32; 3];

/// Returns the two axes orthogonal to `axis`, in ascending order.
#[inline]
pub fn plane_axes(axis: usize) -> [usize; 2] {
    match axis {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    }
}
