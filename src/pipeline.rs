use std::time::Instant;

use tracing::{error, info};

use crate::{
    color::{ColorTable, ColorTables},
    config::{ScalarKind, ThicknessConfig},
    error::Result,
    index::SpatialIndex,
    mesh::{HitPoint, SurfaceMesh, TopLayerMesh},
    normal_cast::{NormalCast, ScalarField},
    progress::{CancelToken, Progress, ProgressObserver, Stage, milestone},
    rainfall::{RainfallCast, SamplingGrid},
    types::Value,
};

/// Everything a finished run hands to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ThicknessMap {
    pub config: ThicknessConfig,
    pub grid: SamplingGrid,
    pub top_layer: TopLayerMesh,
    pub hit_points: Vec<HitPoint>,
    pub fields: NormalCast,
    pub colors: ColorTables,
    pub grazing_quads: usize,
}

impl ThicknessMap {
    pub fn field(&self, kind: ScalarKind) -> &ScalarField {
        self.fields.field(kind)
    }

    pub fn color_table(&self, kind: ScalarKind) -> &ColorTable {
        self.colors.get(kind)
    }

    /// Linear RGBA color of every top-layer point for the chosen field.
    pub fn vertex_colors(&self, kind: ScalarKind) -> Vec<[f32; 4]> {
        let table = self.color_table(kind);
        self.field(kind)
            .values
            .iter()
            .map(|&v| table.vertex_color(v))
            .collect()
    }
}

/// Runs the full thickness pipeline over `surface`.
///
/// ```text
/// validate config
///   → SpatialIndex::build                       (41%)
///   → RainfallCast::run  ─┐                     (42% → 80%)
///   → NormalCast::run     │ rayon::join         (81% → 100%)
///     ColorTables::build ─┘
/// ```
///
/// Any failure aborts the run and nothing partial is returned.
pub fn map_thickness(
    surface: &SurfaceMesh,
    config: &ThicknessConfig,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) -> Result<ThicknessMap> {
    let progress = Progress::new(observer);
    let started = Instant::now();

    let result = run_stages(surface, config, &progress, cancel);
    match &result {
        Ok(map) => {
            info!(
                hit_points = map.hit_points.len(),
                quads = map.top_layer.quads.len(),
                seconds = format!("{:.1}", started.elapsed().as_secs_f64()),
                "Thickness map finished"
            );
            progress.report(milestone::DONE, Stage::Finished, "Finished");
        }
        Err(err) => error!(stage = err.stage(), %err, "Thickness map failed"),
    }
    result
}

fn run_stages(
    surface: &SurfaceMesh,
    config: &ThicknessConfig,
    progress: &Progress,
    cancel: &CancelToken,
) -> Result<ThicknessMap> {
    progress.report(0, Stage::Validate, "Initializing execution");
    config.validate()?;

    progress.report(
        milestone::INDEX_BUILD,
        Stage::Index,
        "Building intersection object tree",
    );
    let index = SpatialIndex::build(surface)?;

    let (casts, colors) = rayon::join(
        || -> Result<(RainfallCast, NormalCast)> {
            let rainfall = RainfallCast::run(&index, config, progress, cancel)?;
            progress.report(
                milestone::NORMAL_CAST_SETUP,
                Stage::NormalCast,
                "Preparing thickness probes",
            );
            let normals = NormalCast::run(
                &index,
                &rainfall.hit_points,
                rainfall.top_layer.points.len(),
                probe_stretch(&index, config),
                config,
                progress,
                cancel,
            )?;
            Ok((rainfall, normals))
        },
        || ColorTables::build(config),
    );
    let (rainfall, fields) = casts?;

    Ok(ThicknessMap {
        config: config.clone(),
        grid: rainfall.grid,
        top_layer: rainfall.top_layer,
        hit_points: rainfall.hit_points,
        fields,
        colors,
        grazing_quads: rainfall.grazing_quads,
    })
}

/// Half-length of a probe ray: long enough to leave the structure on both sides
/// whatever the normal's direction.
fn probe_stretch(index: &SpatialIndex, config: &ThicknessConfig) -> Value {
    let bounds = index.bounds();
    let (axis, _) = config.direction.resolve();
    bounds.diagonal().max(bounds.extents()[axis]) + config.precision
}
