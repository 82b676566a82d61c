use bevy::prelude::*;
use bevy_bone_thickness::{
    BoneThicknessPlugin,
    config::{CastDirection, ThicknessConfig},
    mesh::SurfaceMesh,
    plugin::{ThicknessJob, ThicknessStatus},
    types::Point,
};
use bevy_infinite_grid::{InfiniteGridBundle, InfiniteGridPlugin, InfiniteGridSettings};
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
        .add_systems(Update, log_status)
        .run();
}

/// Closed box, `width × depth × height` millimetres, with its top face at `z = top`.
fn slab(width: f64, depth: f64, height: f64, top: f64) -> SurfaceMesh {
    let bottom = top - height;
    let points = vec![
        Point::new(0.0, 0.0, bottom),
        Point::new(width, 0.0, bottom),
        Point::new(width, depth, bottom),
        Point::new(0.0, depth, bottom),
        Point::new(0.0, 0.0, top),
        Point::new(width, 0.0, top),
        Point::new(width, depth, top),
        Point::new(0.0, depth, top),
    ];
    let cells = vec![
        vec![0, 3, 2, 1],
        vec![4, 5, 6, 7],
        vec![0, 1, 5, 4],
        vec![1, 2, 6, 5],
        vec![2, 3, 7, 6],
        vec![3, 0, 4, 7],
    ];
    SurfaceMesh::new(points, cells)
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<StandardMaterial>>) {
    bevy::log::info!("Plate Example");

    commands.spawn(InfiniteGridBundle {
        settings: InfiniteGridSettings {
            fadeout_distance: 400.0,
            ..Default::default()
        },
        ..Default::default()
    });

    commands.spawn((
        Camera3d::default(),
        PanOrbitCamera::default(),
        Transform::from_xyz(20.0, 40.0, 60.0).looking_at(Vec3::new(20.0, 2.0, 15.0), Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::OVERCAST_DAY,
            ..Default::default()
        },
        Transform::default().with_rotation(Quat::from_rotation_x(-45.0_f32.to_radians())),
    ));

    // Tissue lies along +Z of the scan, so rays fall from the superior side.
    let config = ThicknessConfig::default().with_direction(CastDirection::S);

    commands.spawn((
        ThicknessJob::new(slab(40.0, 30.0, 2.5, 4.0)).with_config(config),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::WHITE,
            ..Default::default()
        })),
        // Scan coordinates are Z-up.
        Transform::from_rotation(Quat::from_rotation_x(-90.0_f32.to_radians())),
    ));
}

fn log_status(query: Query<&ThicknessStatus, Changed<ThicknessStatus>>) {
    for status in query.iter() {
        bevy::log::info!("{:?}", status.0);
    }
}
