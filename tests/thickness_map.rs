mod common;

use std::sync::Mutex;

use bevy_bone_thickness::{
    config::{CastDirection, NormalPolicy, ScalarKind, ThicknessConfig},
    error::{ConfigError, ThicknessError},
    map_thickness,
    mesh::SurfaceMesh,
    progress::{CancelToken, ProgressUpdate, Silent, Stage},
    types::Vector,
};

fn superior() -> ThicknessConfig {
    ThicknessConfig::default().with_direction(CastDirection::S)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn plate_thickness_is_uniform_inside_the_anchored_grid() {
    let map = map_thickness(&common::plate(), &superior(), &Silent, &CancelToken::new()).unwrap();
    let (rows, cols) = (map.grid.rows, map.grid.cols);
    assert_eq!((rows, cols), (30, 40));
    assert_eq!(map.hit_points.len(), rows * cols);

    let thickness = map.field(ScalarKind::Thickness);
    let cavity = map.field(ScalarKind::CavityDepth);
    for hit in &map.hit_points {
        let (row, col) = (hit.id / cols, hit.id % cols);
        assert!(close(hit.position.z, 4.0));
        if row + 1 < rows && col + 1 < cols {
            assert!(close(thickness.values[hit.id], 25.0), "point {}", hit.id);
            assert!(close(cavity.values[hit.id], 25.0));
        } else {
            // The last row and column never anchor a block.
            assert_eq!(thickness.values[hit.id], 0.0);
            assert_eq!(cavity.values[hit.id], 0.0);
        }
    }
}

#[test]
fn plate_on_the_origin_plane_is_measured() {
    let map = map_thickness(&common::plate_at_origin(), &superior(), &Silent, &CancelToken::new()).unwrap();
    let (rows, cols) = (map.grid.rows, map.grid.cols);
    assert_eq!(map.top_layer.quads.len(), (rows - 1) * (cols - 1));

    let thickness = map.field(ScalarKind::Thickness);
    for hit in &map.hit_points {
        assert!(close(hit.position.z, 0.0));
        if hit.id / cols + 1 < rows && hit.id % cols + 1 < cols {
            assert!((hit.normal - Vector::z()).norm() < 1e-9);
            assert!(close(thickness.values[hit.id], 25.0), "point {}", hit.id);
        }
    }
}

#[test]
fn hit_points_are_numbered_in_row_major_order() {
    let map = map_thickness(&common::plate(), &superior(), &Silent, &CancelToken::new()).unwrap();
    let cols = map.grid.cols;
    for hit in &map.hit_points {
        let (start, _) = map.grid.ray(hit.id / cols, hit.id % cols);
        assert!(close(hit.position.x, start.x) && close(hit.position.y, start.y));
    }
}

#[test]
fn top_layer_is_raised_towards_the_source() {
    let map = map_thickness(&common::plate(), &superior(), &Silent, &CancelToken::new()).unwrap();
    assert_eq!(map.top_layer.points.len(), map.hit_points.len());
    for (hit, shown) in map.hit_points.iter().zip(&map.top_layer.points) {
        assert!(close(shown.z - hit.position.z, 0.3));
    }
    assert_eq!(map.top_layer.quads.len(), 29 * 39);
    assert_eq!(map.top_layer.triangulated_indices().len(), 29 * 39 * 6);
}

#[test]
fn hollow_shell_measures_the_void_separately() {
    let map = map_thickness(&common::hollow_shell(), &superior(), &Silent, &CancelToken::new()).unwrap();
    let thickness = map.field(ScalarKind::Thickness);
    let cavity = map.field(ScalarKind::CavityDepth);

    let mut over_void = 0;
    for hit in map.hit_points.iter().filter(|h| h.has_normal()) {
        let t = thickness.values[hit.id];
        let c = cavity.values[hit.id];
        assert!(close(t, 60.0), "point {} thickness {t}", hit.id);
        if common::inside_void(&hit.position) {
            over_void += 1;
            assert!(close(c, 15.0), "point {} cavity {c}", hit.id);
        } else {
            assert!(close(c, t));
        }
    }
    assert_eq!(over_void, 16 * 12);
}

#[test]
fn cavity_depth_never_exceeds_thickness() {
    for policy in [NormalPolicy::LastWriteWins, NormalPolicy::Average] {
        let config = superior().with_normal_policy(policy);
        let map = map_thickness(&common::hollow_shell(), &config, &Silent, &CancelToken::new()).unwrap();
        let thickness = &map.field(ScalarKind::Thickness).values;
        let cavity = &map.field(ScalarKind::CavityDepth).values;
        assert_eq!(thickness.len(), cavity.len());
        for (t, c) in thickness.iter().zip(cavity) {
            assert!(*c >= 0.0 && c <= t);
        }
    }
}

#[test]
fn rendered_quads_stay_under_the_grazing_cutoff() {
    let config = superior().with_grazing_cutoff(30.0);
    let map = map_thickness(&common::hollow_shell(), &config, &Silent, &CancelToken::new()).unwrap();
    let cast = config.direction.cast_vector();
    for quad in &map.top_layer.quads {
        let normal = map.top_layer.normals[quad[0]];
        assert_ne!(normal, Vector::zeros());
        assert!(normal.angle(&cast).to_degrees() < 30.0);
    }
}

#[test]
fn repeated_runs_are_identical() {
    let config = superior().with_normal_policy(NormalPolicy::Average);
    let first = map_thickness(&common::hollow_shell(), &config, &Silent, &CancelToken::new()).unwrap();
    let second = map_thickness(&common::hollow_shell(), &config, &Silent, &CancelToken::new()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn color_tables_follow_the_display_ranges() {
    let map = map_thickness(&common::plate(), &superior(), &Silent, &CancelToken::new()).unwrap();
    assert_eq!(map.color_table(ScalarKind::Thickness).len(), 88);
    assert_eq!(map.color_table(ScalarKind::CavityDepth).len(), 41);
    assert_eq!(map.color_table(ScalarKind::CavityDepth).name, "AirCellColorMap");

    let colors = map.vertex_colors(ScalarKind::Thickness);
    assert_eq!(colors.len(), map.top_layer.points.len());
    assert!(colors.iter().all(|c| c[3] == 1.0));
}

#[test]
fn invalid_configuration_is_rejected_before_casting() {
    let reports = Mutex::new(Vec::new());
    let observer = |u: ProgressUpdate| reports.lock().unwrap().push(u.percent);
    let config = superior().with_precision(0.0);

    let err = map_thickness(&common::plate(), &config, &observer, &CancelToken::new()).unwrap_err();
    assert_eq!(err, ThicknessError::Config(ConfigError::InvalidPrecision(0.0)));
    assert_eq!(err.stage(), "validating configuration");
    // Only the initial report went out.
    assert_eq!(reports.into_inner().unwrap(), vec![0]);
}

#[test]
fn empty_surface_fails_the_index_stage() {
    let err = map_thickness(&SurfaceMesh::default(), &superior(), &Silent, &CancelToken::new()).unwrap_err();
    assert_eq!(err, ThicknessError::EmptyMesh);
    assert_eq!(err.stage(), "building spatial index");
}

#[test]
fn cancelled_runs_return_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = map_thickness(&common::plate(), &superior(), &Silent, &cancel).unwrap_err();
    assert_eq!(err, ThicknessError::Cancelled);
}

#[test]
fn progress_climbs_through_the_milestones() {
    let reports = Mutex::new(Vec::new());
    let observer = |u: ProgressUpdate| reports.lock().unwrap().push(u.percent);
    map_thickness(&common::plate(), &superior(), &observer, &CancelToken::new()).unwrap();

    let reports = reports.into_inner().unwrap();
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    for milestone in [0, 41, 42, 53, 64, 80, 81, 82, 100] {
        assert!(reports.contains(&milestone), "missing {milestone}");
    }
    assert_eq!(reports.last(), Some(&100));
}

#[test]
fn cancelling_during_the_normal_cast_discards_the_scores() {
    let cancel = CancelToken::new();
    let observer = |u: ProgressUpdate| {
        if u.stage == Stage::NormalCast {
            cancel.cancel();
        }
    };
    let err = map_thickness(&common::hollow_shell(), &superior(), &observer, &cancel).unwrap_err();
    assert_eq!(err, ThicknessError::Cancelled);
}

#[test]
fn cancelling_during_the_grid_cast_stops_the_run() {
    let cancel = CancelToken::new();
    let reports = Mutex::new(Vec::new());
    let observer = |u: ProgressUpdate| {
        if u.stage == Stage::RainfallCast {
            cancel.cancel();
        }
        reports.lock().unwrap().push(u.stage);
    };
    let err = map_thickness(&common::plate(), &superior(), &observer, &cancel).unwrap_err();
    assert_eq!(err, ThicknessError::Cancelled);
    assert!(!reports.into_inner().unwrap().contains(&Stage::NormalCast));
}

#[test]
fn single_ray_runs_report_the_grid_midpoint() {
    let mut mesh = SurfaceMesh::default();
    common::push_box(
        &mut mesh,
        bevy_bone_thickness::types::Point::new(0.0, 0.0, 2.0),
        bevy_bone_thickness::types::Point::new(1.5, 1.5, 4.0),
        false,
    );
    let reports = Mutex::new(Vec::new());
    let observer = |u: ProgressUpdate| reports.lock().unwrap().push(u.percent);
    let map = map_thickness(&mesh, &superior(), &observer, &CancelToken::new()).unwrap();
    assert_eq!(map.hit_points.len(), 1);
    assert!(reports.into_inner().unwrap().contains(&53));
}
