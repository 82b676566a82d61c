use bevy::prelude::*;
use bevy_bone_thickness::{
    BoneThicknessPlugin,
    config::{CastDirection, ScalarKind, SamplingQuality, ThicknessConfig},
    mesh::SurfaceMesh,
    plugin::{ThicknessJob, ThicknessPluginConfig, ThicknessResult},
    types::Point,
};
use bevy_infinite_grid::{InfiniteGridBundle, InfiniteGridPlugin};
use bevy_panorbit_camera::{PanOrbitCamera, PanOrbitCameraPlugin};

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            BoneThicknessPlugin::default(),
            PanOrbitCameraPlugin,
            InfiniteGridPlugin,
        ))
        .add_systems(Startup, setup)
        .add_systems(Update, (toggle_field, report_legend))
        .run();
}

/// Pushes the six faces of an axis-aligned box. Outward-facing unless `inward`.
fn push_box(mesh: &mut SurfaceMesh, min: Point, max: Point, inward: bool) {
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

/// A 6 mm thick plate with a closed air cell under its center.
fn hollow_shell() -> SurfaceMesh {
    let mut mesh = SurfaceMesh::default();
    push_box(&mut mesh, Point::new(0.0, 0.0, 2.0), Point::new(40.0, 40.0, 8.0), false);
    push_box(&mut mesh, Point::new(12.0, 12.0, 4.0), Point::new(28.0, 28.0, 6.5), true);
    mesh
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    bevy::log::info!("Hollow Shell Example: press Space to switch fields");

    commands.spawn(InfiniteGridBundle::default());

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera {
            button_orbit: MouseButton::Right,
            button_pan: MouseButton::Middle,
            ..default()
        },
        Transform::from_xyz(20.0, 60.0, 70.0).looking_at(Vec3::new(20.0, 0.0, 20.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight::default(),
        Transform::default().with_rotation(Quat::from_rotation_x(-60.0_f32.to_radians())),
    ));

    let config = ThicknessConfig::default()
        .with_direction(CastDirection::S)
        .with_quality(SamplingQuality::High);

    commands.spawn((
        ThicknessJob::new(hollow_shell()).with_config(config),
        MeshMaterial3d(materials.add(StandardMaterial::default())),
        Transform::from_rotation(Quat::from_rotation_x(-90.0_f32.to_radians())),
    ));
}

fn toggle_field(keyboard: Res<ButtonInput<KeyCode>>, mut config: ResMut<ThicknessPluginConfig>) {
    if keyboard.just_pressed(KeyCode::Space) {
        config.display = match config.display {
            ScalarKind::Thickness => ScalarKind::CavityDepth,
            ScalarKind::CavityDepth => ScalarKind::Thickness,
        };
        bevy::log::info!("Showing {}", config.display);
    }
}

fn report_legend(query: Query<&ThicknessResult, Added<ThicknessResult>>) {
    for result in query.iter() {
        for kind in [ScalarKind::Thickness, ScalarKind::CavityDepth] {
            let table = result.color_table(kind);
            let max = result.field(kind).max() / table.scale;
            bevy::log::info!("{kind}: {} bins, deepest {max:.1} mm", table.len());
        }
    }
}
