use crate::{
    bounds::Aabb,
    error::{Result, ThicknessError},
    types::{Point, Vector},
};

/// Closed surface produced by segmentation.
///
/// Cells are polygons referencing indices into `points`. Orientation is taken
/// as given; nothing here re-orients cells.
#[derive(Clone, Debug, Default)]
pub struct SurfaceMesh {
    /// Point positions: `[[x, y, z], ...]`
    pub points: Vec<Point>,

    /// Polygonal cells as point index lists: `[[p0, p1, p2, ...], ...]`
    pub cells: Vec<Vec<usize>>,
}

impl SurfaceMesh {
    pub fn new(points: Vec<Point>, cells: Vec<Vec<usize>>) -> Self {
        Self { points, cells }
    }

    /// Builds a mesh from triangles.
    pub fn from_triangles(points: Vec<Point>, triangles: &[[usize; 3]]) -> Self {
        let cells = triangles.iter().map(|t| t.to_vec()).collect();
        Self { points, cells }
    }

    /// Adds a cell defined by point indices.
    ///
    /// Returns [`ThicknessError::InvalidCell`] if any index is out of bounds.
    pub fn push_cell(&mut self, cell: &[usize]) -> Result<()> {
        let id = self.cells.len();
        if let Some(&point) = cell.iter().find(|&&p| p >= self.points.len()) {
            return Err(ThicknessError::InvalidCell { cell: id, point });
        }
        self.cells.push(cell.to_vec());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty() || self.cells.is_empty()
    }

    /// Rejects empty meshes and cells pointing past the point array.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ThicknessError::EmptyMesh);
        }
        for (id, cell) in self.cells.iter().enumerate() {
            if let Some(&point) = cell.iter().find(|&&p| p >= self.points.len()) {
                return Err(ThicknessError::InvalidCell { cell: id, point });
            }
        }
        Ok(())
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }

    /// Fan-triangulates cell `cell`, skipping cells with fewer than three points.
    pub fn cell_triangles(&self, cell: usize) -> impl Iterator<Item = [Point; 3]> + '_ {
        let ids = &self.cells[cell];
        let first = ids.first().copied();
        ids.windows(2)
            .skip(1)
            .filter_map(move |w| first.map(|f| [self.points[f], self.points[w[0]], self.points[w[1]]]))
    }
}

/// A sampled point on the near surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitPoint {
    /// Index into the top-layer mesh's point array.
    pub id: usize,
    /// Exact intersection of the grid ray with the surface.
    pub position: Point,
    /// Unit normal estimate; zero until a 2×2 block assigns one.
    pub normal: Vector,
}

impl HitPoint {
    pub fn new(id: usize, position: Point) -> Self {
        Self {
            id,
            position,
            normal: Vector::zeros(),
        }
    }

    pub fn has_normal(&self) -> bool {
        self.normal != Vector::zeros()
    }
}

/// Quad grid reconstructed from accepted grid-ray hits.
///
/// Points are the visibility-raised hit positions in insertion order, so
/// point `i` belongs to the [`HitPoint`] with `id == i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TopLayerMesh {
    pub points: Vec<Point>,

    /// Quad cells, counter-clockwise around the grid block: `[[p0, p1, p2, p3], ...]`
    pub quads: Vec<[usize; 4]>,

    /// Per-point normals, zero where none could be estimated.
    pub normals: Vec<Vector>,
}

impl TopLayerMesh {
    /// Creates an empty mesh with no points, quads, or normals.
    pub fn new_empty() -> Self {
        Self::default()
    }

    pub fn push_point(&mut self, point: Point) -> usize {
        self.points.push(point);
        self.normals.push(Vector::zeros());
        self.points.len() - 1
    }

    /// Adds a quad defined by four point indices.
    pub fn quad_from_points(&mut self, quad: [usize; 4]) -> Result<()> {
        if let Some(&point) = quad.iter().find(|&&p| p >= self.points.len()) {
            return Err(ThicknessError::InvalidCell {
                cell: self.quads.len(),
                point,
            });
        }
        self.quads.push(quad);
        Ok(())
    }

    /// Splits every quad into two triangles for triangle-list renderers.
    pub fn triangulated_indices(&self) -> Vec<u32> {
        self.quads
            .iter()
            .flat_map(|&[a, b, c, d]| [a, b, c, a, c, d])
            .map(|i| i as u32)
            .collect()
    }
}
