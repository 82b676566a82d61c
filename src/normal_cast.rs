//! Probe rays along each hit point's normal, measuring thickness and cavity depth.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use rayon::prelude::*;
use tracing::{info, info_span};

use crate::{
    config::{ScalarKind, ThicknessConfig},
    error::{Result, ThicknessError},
    index::{LineHit, SpatialIndex},
    mesh::HitPoint,
    progress::{CancelToken, Progress, Stage, milestone},
    types::Value,
};

/// Crossings closer than this along a probe count as one (shared edges and vertices).
const COINCIDENT_T: Value = 1e-9;

/// Scalar per hit point, indexed by [`HitPoint::id`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub kind: ScalarKind,
    pub values: Vec<Value>,
}

impl ScalarField {
    pub fn zeros(kind: ScalarKind, len: usize) -> Self {
        Self {
            kind,
            values: vec![0.0; len],
        }
    }

    pub fn get(&self, id: usize) -> Option<Value> {
        self.values.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest value in the field, `0.0` when empty.
    pub fn max(&self) -> Value {
        self.values.iter().copied().fold(0.0, Value::max)
    }
}

/// Scaled distances measured along one probe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Probe {
    pub thickness: Value,
    pub cavity_depth: Value,
}

/// Both fields produced by the normal cast.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalCast {
    pub thickness: ScalarField,
    pub cavity_depth: ScalarField,
}

impl NormalCast {
    /// Probes every hit point through the structure indexed by `index`.
    ///
    /// `stretch` is the probe half-length; it must exceed the structure's extent
    /// so both exits are crossed. Fields get one entry per id in `0..point_count`.
    pub fn run(
        index: &SpatialIndex,
        hit_points: &[HitPoint],
        point_count: usize,
        stretch: Value,
        config: &ThicknessConfig,
        progress: &Progress,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let _span = info_span!("normal_cast", points = hit_points.len()).entered();
        let started = Instant::now();
        let total = hit_points.len();
        let every = config.report_every.max(1);
        let done = AtomicUsize::new(0);

        progress.report(
            milestone::NORMAL_CAST_START,
            Stage::NormalCast,
            "Calculating thickness (may take long)",
        );

        let probes: Vec<(usize, Probe)> = hit_points
            .par_iter()
            .map(|hit| {
                if cancel.is_cancelled() {
                    return Err(ThicknessError::Cancelled);
                }
                let probe = probe(index, hit, stretch, config.gradient_scale);

                let i = done.fetch_add(1, Ordering::Relaxed);
                if i % every == 0 {
                    let fraction = i as Value / total as Value;
                    let percent = milestone::NORMAL_CAST_START
                        + (fraction * Value::from(milestone::DONE - milestone::NORMAL_CAST_START))
                            .round() as u8;
                    progress.report(
                        percent,
                        Stage::NormalCast,
                        format!("Calculating thickness (~{i} of {total} rays)"),
                    );
                }
                Ok((hit.id, probe))
            })
            .collect::<Result<_>>()?;

        let mut thickness = ScalarField::zeros(ScalarKind::Thickness, point_count);
        let mut cavity_depth = ScalarField::zeros(ScalarKind::CavityDepth, point_count);
        for (id, probe) in probes {
            if id < point_count {
                thickness.values[id] = probe.thickness;
                cavity_depth.values[id] = probe.cavity_depth;
            }
        }

        info!(
            points = total,
            max_thickness = thickness.max(),
            seconds = format!("{:.1}", started.elapsed().as_secs_f64()),
            "Finished thickness calculation"
        );

        Ok(Self {
            thickness,
            cavity_depth,
        })
    }

    pub fn field(&self, kind: ScalarKind) -> &ScalarField {
        match kind {
            ScalarKind::Thickness => &self.thickness,
            ScalarKind::CavityDepth => &self.cavity_depth,
        }
    }
}

/// Casts a single probe through `hit` along its normal.
///
/// Points without a normal, and probes with fewer than two distinct crossings,
/// measure zero.
pub fn probe(index: &SpatialIndex, hit: &HitPoint, stretch: Value, scale: Value) -> Probe {
    if !hit.has_normal() {
        return Probe::default();
    }
    let start = hit.position + hit.normal * stretch;
    let end = hit.position - hit.normal * stretch;

    let crossings = sorted_crossings(index.intersect_line_all(&start, &end));
    match (crossings.first(), crossings.get(1), crossings.last()) {
        (Some(first), Some(second), Some(last)) => Probe {
            thickness: (first.point - last.point).norm() * scale,
            cavity_depth: (first.point - second.point).norm() * scale,
        },
        _ => Probe::default(),
    }
}

/// Sorts hits by `t` and merges coincident crossings.
fn sorted_crossings(mut hits: Vec<LineHit>) -> Vec<LineHit> {
    hits.retain(|h| (0.0..=1.0).contains(&h.t));
    hits.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.cell.cmp(&b.cell)));
    hits.dedup_by(|later, kept| (later.t - kept.t).abs() < COINCIDENT_T);
    hits
}
