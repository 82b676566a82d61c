//! Rainfall cast: parallel grid rays that reconstruct the near surface.
//!
//! ```text
//! 1. SamplingGrid::new        →  rows × cols rays over the bounding box
//! 2. cast_grid  (parallel)    →  optional exact hit per grid node
//! 3. materialize              →  HitPoint ids in row-major order
//! 4. block_normals (parallel) →  one plane estimate per full 2×2 block
//! 5. assign_normals           →  per-point normals (NormalPolicy)
//! 6. form_quads               →  quads under the grazing cutoff
//! ```

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn};

use crate::{
    bounds::Aabb,
    config::{NormalPolicy, ThicknessConfig},
    error::{Result, ThicknessError},
    index::SpatialIndex,
    mesh::{HitPoint, TopLayerMesh},
    progress::{CancelToken, Progress, Stage, milestone},
    types::{Matrix, Point, Value, Vector, plane_axes},
};

/// Relative determinant magnitude under which a 3-point plane solve is rejected.
const SINGULAR_EPSILON: Value = 1e-12;

/// Regular grid of rays orthogonal to the cast axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingGrid {
    /// Cast axis index.
    pub axis: usize,
    /// `+1` when rays come from the positive side of the axis, `-1` otherwise.
    pub sign: Value,
    /// Sampling plane axes; columns run along `plane[0]`, rows along `plane[1]`.
    pub plane: [usize; 2],
    pub rows: usize,
    pub cols: usize,
    pub precision: Value,
    /// Plane coordinates of the `(0, 0)` node.
    origin: [Value; 2],
    /// Cast-axis coordinates of every ray's start and end.
    span: [Value; 2],
}

impl SamplingGrid {
    /// Lays `floor(extent / precision)` samples along each plane axis, centered on `bounds`.
    pub fn new(bounds: &Aabb, config: &ThicknessConfig) -> Self {
        let (axis, sign) = config.direction.resolve();
        let plane = plane_axes(axis);
        let precision = config.precision;
        let extents = bounds.extents();
        let center = bounds.center();

        let count = |a: usize| (extents[a] / precision).floor().max(0.0) as usize;
        let cols = count(plane[0]);
        let rows = count(plane[1]);

        let first = |a: usize, n: usize| center[a] - (n.saturating_sub(1)) as Value * precision / 2.0;
        let origin = [first(plane[0], cols), first(plane[1], rows)];

        // Rays reach past the box on both sides of the cast axis.
        let reach = extents[axis] + 1.0;
        let span = [center[axis] + sign * reach, center[axis] - sign * reach];

        Self {
            axis,
            sign,
            plane,
            rows,
            cols,
            precision,
            origin,
            span,
        }
    }

    /// Number of rays, `None` when `rows * cols` does not fit in `usize`.
    pub fn ray_count(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }

    /// Start and end of the ray through node `(row, col)`.
    pub fn ray(&self, row: usize, col: usize) -> (Point, Point) {
        let mut start = Point::origin();
        start[self.plane[0]] = self.origin[0] + col as Value * self.precision;
        start[self.plane[1]] = self.origin[1] + row as Value * self.precision;
        let mut end = start;
        start[self.axis] = self.span[0];
        end[self.axis] = self.span[1];
        (start, end)
    }
}

/// Output of the rainfall cast.
#[derive(Debug, Clone, PartialEq)]
pub struct RainfallCast {
    pub grid: SamplingGrid,
    /// Rendered near surface; point `i` is hit point `i` raised for visibility.
    pub top_layer: TopLayerMesh,
    /// Every materialized hit point in id order, with or without a normal.
    pub hit_points: Vec<HitPoint>,
    /// Full 2×2 blocks dropped for leaning past the grazing cutoff.
    pub grazing_quads: usize,
}

impl RainfallCast {
    /// Runs the cast against `index`.
    pub fn run(
        index: &SpatialIndex,
        config: &ThicknessConfig,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let _span = info_span!("rainfall_cast", direction = %config.direction).entered();
        let started = Instant::now();

        let grid = SamplingGrid::new(&index.bounds(), config);
        let Some(total) = grid.ray_count().filter(|&n| n > 0) else {
            return Err(ThicknessError::NoGridRays {
                rows: grid.rows,
                cols: grid.cols,
            });
        };

        progress.report(
            milestone::GRID_CAST_START,
            Stage::RainfallCast,
            format!("Casting {total} rays"),
        );
        let hits = cast_grid(index, &grid, total, config, progress, cancel)?;

        progress.report(
            milestone::QUAD_FORMING,
            Stage::QuadForming,
            "Forming top layer polygons",
        );
        let mut matrix = materialize(&grid, hits)?;
        let block_normals = block_normals(&matrix, &config.direction.cast_vector())?;
        assign_normals(&mut matrix, &block_normals, config.normal_policy);
        if cancel.is_cancelled() {
            return Err(ThicknessError::Cancelled);
        }

        let cast_vector = config.direction.cast_vector();
        let mut top_layer = TopLayerMesh::new_empty();
        let hit_points: Vec<HitPoint> = matrix.iter().flatten().copied().collect();
        for hit in &hit_points {
            let id = top_layer.push_point(hit.position + cast_vector * config.visibility_offset);
            top_layer.normals[id] = hit.normal;
        }
        let grazing_quads = form_quads(&matrix, &block_normals, config, &mut top_layer)?;

        info!(
            rays = total,
            hit_points = hit_points.len(),
            quads = top_layer.quads.len(),
            grazing_quads,
            seconds = format!("{:.1}", started.elapsed().as_secs_f64()),
            "Finished ray-casting"
        );
        progress.report(
            milestone::QUADS_DONE,
            Stage::QuadForming,
            format!(
                "Finished ray-casting in {:.1}s, found {} cells",
                started.elapsed().as_secs_f64(),
                top_layer.quads.len()
            ),
        );

        Ok(Self {
            grid,
            top_layer,
            hit_points,
            grazing_quads,
        })
    }
}

/// Casts every grid ray; a node holds the exact hit when it lies inside the region of interest.
fn cast_grid(
    index: &SpatialIndex,
    grid: &SamplingGrid,
    total: usize,
    config: &ThicknessConfig,
    progress: &Progress,
    cancel: &CancelToken,
) -> Result<Vec<Option<Point>>> {
    let [lo, hi] = config.region_of_interest;
    let midpoint = (total / 2).max(1);
    let done = AtomicUsize::new(0);

    (0..total)
        .into_par_iter()
        .map(|k| {
            if cancel.is_cancelled() {
                return Err(ThicknessError::Cancelled);
            }
            let (start, end) = grid.ray(k / grid.cols, k % grid.cols);
            let hit = index
                .intersect_line(&start, &end)
                .map(|hit| hit.point)
                .filter(|p| (lo..hi).contains(&p[grid.axis]));

            if done.fetch_add(1, Ordering::Relaxed) + 1 == midpoint {
                progress.report(
                    milestone::GRID_CAST_MIDPOINT,
                    Stage::RainfallCast,
                    format!("Cast {midpoint} of {total} rays"),
                );
            }
            Ok(hit)
        })
        .collect()
}

/// Places hits into the row-major matrix, numbering them in row-major order.
fn materialize(grid: &SamplingGrid, hits: Vec<Option<Point>>) -> Result<Array2<Option<HitPoint>>> {
    let len = hits.len();
    let mut next_id = 0;
    let cells: Vec<Option<HitPoint>> = hits
        .into_iter()
        .map(|hit| {
            hit.map(|position| {
                let point = HitPoint::new(next_id, position);
                next_id += 1;
                point
            })
        })
        .collect();
    Array2::from_shape_vec((grid.rows, grid.cols), cells).map_err(|_| ThicknessError::GridShape {
        rows: grid.rows,
        cols: grid.cols,
        len,
    })
}

/// The four nodes of the block anchored at `(i, j)`, counter-clockwise from the anchor.
fn block(matrix: &Array2<Option<HitPoint>>, i: usize, j: usize) -> Option<[HitPoint; 4]> {
    Some([
        matrix[(i, j)]?,
        matrix[(i + 1, j)]?,
        matrix[(i + 1, j + 1)]?,
        matrix[(i, j + 1)]?,
    ])
}

/// Plane normal through three points, from `M · n = [1, 1, 1]`.
///
/// The system is solved in block-local coordinates, with the centroid moved to
/// `cast_vector`, so planes through the world origin stay solvable. Returns
/// `None` for degenerate (collinear or coincident) points. The result is
/// flipped to lean towards `cast_vector`.
pub fn plane_normal(points: [Point; 3], cast_vector: &Vector) -> Option<Vector> {
    let centroid = (points[0].coords + points[1].coords + points[2].coords) / 3.0;
    let shift = centroid - cast_vector;
    let points = points.map(|p| p - shift);
    let rows = points.map(|p| p.coords.transpose());
    let m = Matrix::from_rows(&rows);

    let scale: Value = points.iter().map(|p| p.coords.norm()).product();
    if !(m.determinant().abs() > SINGULAR_EPSILON * scale) {
        return None;
    }
    let raw = m.lu().solve(&Vector::repeat(1.0))?;
    if !raw.iter().all(|c| c.is_finite()) {
        return None;
    }
    let normal = raw.try_normalize(Value::EPSILON)?;
    Some(if normal.dot(cast_vector) < 0.0 {
        -normal
    } else {
        normal
    })
}

/// Normal estimate of every full block, indexed by its anchor. Partial and singular blocks are `None`.
fn block_normals(
    matrix: &Array2<Option<HitPoint>>,
    cast_vector: &Vector,
) -> Result<Array2<Option<Vector>>> {
    let (rows, cols) = matrix.dim();
    let (brows, bcols) = (rows.saturating_sub(1), cols.saturating_sub(1));
    let estimates: Vec<Option<Vector>> = (0..brows * bcols)
        .into_par_iter()
        .map(|k| {
            let [a, b, c, _] = block(matrix, k / bcols, k % bcols)?;
            plane_normal([a.position, b.position, c.position], cast_vector)
        })
        .collect();

    let singular = (0..brows * bcols)
        .filter(|&k| block(matrix, k / bcols, k % bcols).is_some() && estimates[k].is_none())
        .count();
    if singular > 0 {
        warn!(singular, "Skipped singular normal estimates");
    }

    let len = estimates.len();
    Array2::from_shape_vec((brows, bcols), estimates).map_err(|_| ThicknessError::GridShape {
        rows: brows,
        cols: bcols,
        len,
    })
}

/// Writes block estimates into the hit points, visiting blocks in row-major order.
fn assign_normals(
    matrix: &mut Array2<Option<HitPoint>>,
    block_normals: &Array2<Option<Vector>>,
    policy: NormalPolicy,
) {
    match policy {
        NormalPolicy::LastWriteWins => {
            for ((i, j), normal) in block_normals.indexed_iter() {
                if let (Some(normal), Some(anchor)) = (normal, matrix[(i, j)].as_mut()) {
                    anchor.normal = *normal;
                }
            }
        }
        NormalPolicy::Average => {
            let mut sums = Array2::<Vector>::from_elem(matrix.dim(), Vector::zeros());
            for ((i, j), normal) in block_normals.indexed_iter() {
                let Some(normal) = normal else { continue };
                for node in [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)] {
                    sums[node] += normal;
                }
            }
            for (node, sum) in sums.indexed_iter() {
                if let (Some(hit), Some(normal)) =
                    (matrix[node].as_mut(), sum.try_normalize(Value::EPSILON))
                {
                    hit.normal = normal;
                }
            }
        }
    }
}

/// Emits one quad per full block whose anchor normal is within the grazing cutoff.
///
/// Returns the number of full blocks rejected for grazing.
fn form_quads(
    matrix: &Array2<Option<HitPoint>>,
    block_normals: &Array2<Option<Vector>>,
    config: &ThicknessConfig,
    top_layer: &mut TopLayerMesh,
) -> Result<usize> {
    let cast_vector = config.direction.cast_vector();
    let mut grazing = 0;
    for ((i, j), _) in block_normals.indexed_iter() {
        let Some(points) = block(matrix, i, j) else {
            continue;
        };
        let anchor = points[0];
        if !anchor.has_normal() {
            continue;
        }
        let degrees = anchor.normal.angle(&cast_vector).to_degrees();
        if degrees < config.grazing_cutoff {
            top_layer.quad_from_points(points.map(|p| p.id))?;
        } else {
            grazing += 1;
        }
    }
    debug!(grazing, "Dropped grazing quads");
    Ok(grazing)
}
