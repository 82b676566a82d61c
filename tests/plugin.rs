mod common;

use std::time::{Duration, Instant};

use bevy::{asset::AssetPlugin, prelude::*};
use bevy_bone_thickness::{
    BoneThicknessPlugin,
    config::{CastDirection, SamplingQuality, ScalarKind, ThicknessConfig},
    plugin::{ThicknessJob, ThicknessPluginConfig, ThicknessResult, ThicknessRun, ThicknessStatus},
    progress::RunStatus,
};

fn app() -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, AssetPlugin::default(), BoneThicknessPlugin::default()))
        .init_asset::<Mesh>();
    app
}

/// Updates `app` until `entity` reaches a terminal status.
fn run_until_done(app: &mut App, entity: Entity) -> RunStatus {
    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        app.update();
        let status = app.world().get::<ThicknessStatus>(entity).unwrap().0.clone();
        if status.is_terminal() || Instant::now() > deadline {
            // One more frame for the upload set to see the result.
            app.update();
            return status;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn finished_jobs_get_a_colored_top_layer() {
    let mut app = app();
    let config = ThicknessConfig::default().with_direction(CastDirection::S);
    let entity = app
        .world_mut()
        .spawn(ThicknessJob::new(common::plate()).with_config(config))
        .id();

    assert_eq!(run_until_done(&mut app, entity), RunStatus::Finished);

    let world = app.world();
    let result = world.get::<ThicknessResult>(entity).unwrap();
    assert_eq!(result.top_layer.quads.len(), 29 * 39);

    let handle = world.get::<Mesh3d>(entity).unwrap();
    let mesh = world.resource::<Assets<Mesh>>().get(&handle.0).unwrap();
    assert_eq!(mesh.count_vertices(), result.top_layer.points.len());
    assert!(mesh.attribute(Mesh::ATTRIBUTE_COLOR).is_some());
}

#[test]
fn failed_jobs_report_their_stage() {
    let mut app = app();
    let config = ThicknessConfig::default().with_gradient_scale(-1.0);
    let entity = app
        .world_mut()
        .spawn(ThicknessJob::new(common::plate()).with_config(config))
        .id();

    match run_until_done(&mut app, entity) {
        RunStatus::Failed { stage, message } => {
            assert_eq!(stage, "validating configuration");
            assert!(message.contains("gradient scale"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert!(app.world().get::<ThicknessResult>(entity).is_none());
    assert!(app.world().get::<Mesh3d>(entity).is_none());
}

#[test]
fn switching_the_displayed_field_recolors_the_mesh() {
    let mut app = app();
    let config = ThicknessConfig::default().with_direction(CastDirection::S);
    let entity = app
        .world_mut()
        .spawn(ThicknessJob::new(common::hollow_shell()).with_config(config))
        .id();
    run_until_done(&mut app, entity);
    let before = app.world().get::<Mesh3d>(entity).unwrap().0.clone();

    app.world_mut().resource_mut::<ThicknessPluginConfig>().display = ScalarKind::CavityDepth;
    app.update();

    let after = app.world().get::<Mesh3d>(entity).unwrap().0.clone();
    assert_ne!(before.id(), after.id());
}

#[test]
fn despawning_a_running_job_cancels_it() {
    let mut app = app();
    let config = ThicknessConfig::default()
        .with_direction(CastDirection::S)
        .with_quality(SamplingQuality::VeryHigh);
    let entity = app
        .world_mut()
        .spawn(ThicknessJob::new(common::hollow_shell()).with_config(config))
        .id();
    app.update();

    let token = app
        .world()
        .get::<ThicknessRun>(entity)
        .map(ThicknessRun::cancel_token)
        .unwrap();
    assert!(!token.is_cancelled());

    app.world_mut().despawn(entity);
    assert!(token.is_cancelled());
}
