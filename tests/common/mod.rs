#![allow(dead_code)]

use bevy_bone_thickness::{mesh::SurfaceMesh, types::Point};

/// Pushes the six faces of an axis-aligned box. Outward-facing unless `inward`.
pub fn push_box(mesh: &mut SurfaceMesh, min: Point, max: Point, inward: bool) {
    let base = mesh.points.len();
    for z in [min.z, max.z] {
        mesh.points.extend([
            Point::new(min.x, min.y, z),
            Point::new(max.x, min.y, z),
            Point::new(max.x, max.y, z),
            Point::new(min.x, max.y, z),
        ]);
    }
    let faces = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ];
    for face in faces {
        let mut cell: Vec<usize> = face.iter().map(|i| base + i).collect();
        if inward {
            cell.reverse();
        }
        mesh.cells.push(cell);
    }
}

/// 40 × 30 plate, 2.5 thick, top face at `z = 4`.
pub fn plate() -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    push_box(&mut mesh, Point::new(0.0, 0.0, 1.5), Point::new(40.0, 30.0, 4.0), false);
    mesh
}

/// 40 × 30 plate, 2.5 thick, top face on the `z = 0` plane.
pub fn plate_at_origin() -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    push_box(&mut mesh, Point::new(0.0, 0.0, -2.5), Point::new(40.0, 30.0, 0.0), false);
    mesh
}

/// 40 × 30 plate spanning `z ∈ [2, 8]` with a closed void over `[12, 28] × [9, 21] × [4, 6.5]`.
pub fn hollow_shell() -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    push_box(&mut mesh, Point::new(0.0, 0.0, 2.0), Point::new(40.0, 30.0, 8.0), false);
    push_box(&mut mesh, Point::new(12.0, 9.0, 4.0), Point::new(28.0, 21.0, 6.5), true);
    mesh
}

pub fn inside_void(p: &Point) -> bool {
    (12.0..=28.0).contains(&p.x) && (9.0..=21.0).contains(&p.y)
}
