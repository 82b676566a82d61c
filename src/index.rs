//! Bounding volume hierarchy over the cells of a [`SurfaceMesh`].
//!
//! Built once per run and never mutated afterwards, so a single index can serve
//! every grid ray and every probe ray from any number of threads.

use std::ops::Range;

use tracing::{debug, info_span};

use crate::{
    bounds::Aabb,
    error::{Result, ThicknessError},
    mesh::SurfaceMesh,
    types::{Point, Value, Vector},
};

/// Maximum number of triangles stored in a single leaf.
const LEAF_SIZE: usize = 4;

/// Relative tolerance under which a segment counts as parallel to a triangle.
const PARALLEL_EPSILON: Value = 1e-12;

/// Padding applied to node boxes so axis-aligned rays on a box face still enter it.
const BOX_EPSILON: Value = 1e-9;

/// An intersection of a line segment with a surface cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineHit {
    /// Parametric position along the segment, in `[0, 1]`.
    pub t: Value,
    pub point: Point,
    /// Cell of the source mesh that was hit.
    pub cell: usize,
}

#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: Point,
    v1: Point,
    v2: Point,
    cell: usize,
}

impl Triangle {
    fn aabb(&self) -> Aabb {
        Aabb::from_points([&self.v0, &self.v1, &self.v2])
    }

    fn centroid(&self) -> Point {
        Point::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Möller–Trumbore intersection against the segment `origin + t * delta`, `t ∈ [0, 1]`.
    ///
    /// Degenerate triangles and segments parallel to the triangle plane never hit.
    #[allow(clippy::many_single_char_names)]
    fn intersect_segment(&self, origin: &Point, delta: &Vector) -> Option<Value> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = delta.cross(&edge2);
        let a = edge1.dot(&h);

        let scale = edge1.norm() * edge2.norm() * delta.norm();
        if !(a.abs() > PARALLEL_EPSILON * scale) {
            return None;
        }

        let f = 1.0 / a;
        let s = origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * delta.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (0.0..=1.0).contains(&t).then_some(t)
    }
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        triangles: Vec<usize>,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn build(triangles: &[Triangle], indices: &mut [usize]) -> Self {
        let aabb = indices
            .iter()
            .map(|&i| triangles[i].aabb())
            .fold(Aabb::empty(), |acc, b| acc.union(&b))
            .expand(BOX_EPSILON);

        if indices.len() <= LEAF_SIZE {
            return Self::Leaf {
                aabb,
                triangles: indices.to_vec(),
            };
        }

        // Median split along the longest axis of the centroid bounds.
        let centroid_bounds = Aabb::from_points(
            indices
                .iter()
                .map(|&i| triangles[i].centroid())
                .collect::<Vec<_>>()
                .iter(),
        );
        let axis = centroid_bounds.longest_axis();
        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            let ca = triangles[a].centroid()[axis];
            let cb = triangles[b].centroid()[axis];
            ca.total_cmp(&cb).then(a.cmp(&b))
        });

        let (left, right) = indices.split_at_mut(mid);
        Self::Internal {
            aabb,
            left: Box::new(Self::build(triangles, left)),
            right: Box::new(Self::build(triangles, right)),
        }
    }

    fn aabb(&self) -> &Aabb {
        match self {
            Self::Leaf { aabb, .. } | Self::Internal { aabb, .. } => aabb,
        }
    }
}

/// Read-only acceleration structure answering line/surface queries.
#[derive(Debug)]
pub struct SpatialIndex {
    triangles: Vec<Triangle>,
    /// Range of `triangles` produced by each source cell.
    cell_triangles: Vec<Range<usize>>,
    root: BvhNode,
    bounds: Aabb,
}

impl SpatialIndex {
    /// Builds the index over every cell of `mesh`.
    ///
    /// Cells with fewer than three points are kept addressable but can never be hit.
    pub fn build(mesh: &SurfaceMesh) -> Result<Self> {
        let _span = info_span!("spatial_index", cells = mesh.cells.len()).entered();
        mesh.validate()?;

        let mut triangles = Vec::with_capacity(mesh.cells.len());
        let mut cell_triangles = Vec::with_capacity(mesh.cells.len());
        for cell in 0..mesh.cells.len() {
            let start = triangles.len();
            triangles.extend(
                mesh.cell_triangles(cell)
                    .map(|[v0, v1, v2]| Triangle { v0, v1, v2, cell }),
            );
            cell_triangles.push(start..triangles.len());
        }
        if triangles.is_empty() {
            return Err(ThicknessError::IndexBuild);
        }

        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = BvhNode::build(&triangles, &mut indices);
        let bounds = mesh.bounds();
        debug!(triangles = triangles.len(), "built spatial index");

        Ok(Self {
            triangles,
            cell_triangles,
            root,
            bounds,
        })
    }

    /// Bounds of the indexed mesh.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn cell_count(&self) -> usize {
        self.cell_triangles.len()
    }

    /// Nearest intersection of the segment `start → end` with the surface.
    ///
    /// Ties on `t` resolve to the lowest cell id so repeated runs agree.
    pub fn intersect_line(&self, start: &Point, end: &Point) -> Option<LineHit> {
        let delta = end - start;
        let mut best: Option<(Value, usize)> = None;
        self.nearest_in(&self.root, start, &delta, &mut best);
        best.map(|(t, tri)| LineHit {
            t,
            point: start + delta * t,
            cell: self.triangles[tri].cell,
        })
    }

    /// Every cell crossed by the segment `start → end`, in no particular order.
    ///
    /// A cell contributes at most one hit.
    pub fn intersect_line_all(&self, start: &Point, end: &Point) -> Vec<LineHit> {
        self.candidate_cells(start, end)
            .into_iter()
            .filter_map(|cell| self.intersect_cell(cell, start, end))
            .collect()
    }

    /// Cells whose bounds the segment passes through, sorted and deduplicated.
    ///
    /// A superset of the cells [`intersect_line_all`](Self::intersect_line_all) reports.
    pub fn candidate_cells(&self, start: &Point, end: &Point) -> Vec<usize> {
        let delta = end - start;
        let mut cells = Vec::new();
        self.collect_in(&self.root, start, &delta, &mut cells);
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Exact intersection of the segment with a single cell.
    pub fn intersect_cell(&self, cell: usize, start: &Point, end: &Point) -> Option<LineHit> {
        let delta = end - start;
        let range = self.cell_triangles.get(cell)?.clone();
        self.triangles[range]
            .iter()
            .filter_map(|tri| tri.intersect_segment(start, &delta))
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| LineHit {
                t,
                point: start + delta * t,
                cell,
            })
    }

    fn nearest_in(
        &self,
        node: &BvhNode,
        origin: &Point,
        delta: &Vector,
        best: &mut Option<(Value, usize)>,
    ) {
        let Some((t_near, _)) = node.aabb().clip_segment(origin, delta) else {
            return;
        };
        if matches!(*best, Some((t, _)) if t_near > t) {
            return;
        }

        match node {
            BvhNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    let Some(t) = self.triangles[i].intersect_segment(origin, delta) else {
                        continue;
                    };
                    let better = match *best {
                        None => true,
                        Some((bt, bi)) => {
                            t < bt || (t == bt && self.triangles[i].cell < self.triangles[bi].cell)
                        }
                    };
                    if better {
                        *best = Some((t, i));
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                self.nearest_in(left, origin, delta, best);
                self.nearest_in(right, origin, delta, best);
            }
        }
    }

    fn collect_in(&self, node: &BvhNode, origin: &Point, delta: &Vector, cells: &mut Vec<usize>) {
        if node.aabb().clip_segment(origin, delta).is_none() {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => {
                for &i in triangles {
                    let tri = &self.triangles[i];
                    if tri.aabb().expand(BOX_EPSILON).clip_segment(origin, delta).is_some() {
                        cells.push(tri.cell);
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                self.collect_in(left, origin, delta, cells);
                self.collect_in(right, origin, delta, cells);
            }
        }
    }
}
