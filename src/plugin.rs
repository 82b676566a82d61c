use std::sync::{Arc, Mutex};

use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};

use crate::{
    config::{ScalarKind, ThicknessConfig},
    error::Result,
    mesh::SurfaceMesh,
    pipeline::{ThicknessMap, map_thickness},
    progress::{CancelToken, ProgressUpdate, RunStatus, Stage},
    types::Vector,
};

/// System sets for the thickness pipeline.
///
/// ```text
/// ThicknessSet::Spawn  →  [async compute]  →  ThicknessSet::Poll  →  [your systems]  →  ThicknessSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThicknessSet {
    /// Spawns an async compute task for each queued job.
    Spawn,
    /// Mirrors progress into [`ThicknessStatus`] and inserts [`ThicknessResult`] on completion.
    Poll,
    /// Builds the colored top-layer [`Mesh3d`] for finished jobs.
    Upload,
}

/// A surface to map, together with the parameters of the run.
///
/// The surface sits behind an [`Arc`] so the async task can read it without a copy.
#[derive(Component, Clone)]
#[require(Transform, ThicknessStatus)]
pub struct ThicknessJob {
    pub surface: Arc<SurfaceMesh>,
    pub config: ThicknessConfig,
}

impl ThicknessJob {
    pub fn new(surface: SurfaceMesh) -> Self {
        Self {
            surface: Arc::new(surface),
            config: ThicknessConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ThicknessConfig) -> Self {
        self.config = config;
        self
    }
}

/// Marker component added to [`ThicknessJob`] entities that are waiting to be processed.
#[derive(Component)]
pub struct QueuedJob;

/// Latest status of a job, updated every frame while it runs.
#[derive(Component, Debug, Clone, Default, PartialEq, Deref)]
pub struct ThicknessStatus(pub RunStatus);

/// Finished thickness map of a job.
#[derive(Component, Clone, Deref)]
pub struct ThicknessResult(pub Arc<ThicknessMap>);

/// In-flight computation of a [`ThicknessJob`].
#[derive(Component)]
pub struct ThicknessRun {
    task: Task<Result<ThicknessMap>>,
    latest: Arc<Mutex<Option<ProgressUpdate>>>,
    cancel: CancelToken,
}

impl ThicknessRun {
    /// Asks the running task to stop at its next ray. The job ends as failed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token shared with the running task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

// Dropping the task cannot interrupt the synchronous ray casts, so the token
// stops them when the run is removed or its entity despawned.
impl Drop for ThicknessRun {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runtime configuration for the thickness pipeline.
///
/// ```rust,ignore
/// fn show_cavities(mut config: ResMut<ThicknessPluginConfig>) {
///     config.display = ScalarKind::CavityDepth; // recolors every finished top layer
/// }
/// ```
#[derive(Resource)]
pub struct ThicknessPluginConfig {
    /// Maximum number of jobs started per frame. Default: `1`.
    pub max_tasks_per_frame: usize,
    /// Field shown on the uploaded top-layer meshes.
    pub display: ScalarKind,
}

impl Default for ThicknessPluginConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 1,
            display: ScalarKind::Thickness,
        }
    }
}

/// Bevy plugin that drives thickness mapping.
///
/// ```text
/// ThicknessJob added
///   → QueuedJob inserted               (on_job_add)
///   → ThicknessRun spawned             (ThicknessSet::Spawn)
///   → [async compute, status mirrored] (ThicknessSet::Poll)
///   → ThicknessResult inserted         (ThicknessSet::Poll, once the task completes)
///   → Mesh3d inserted, QueuedJob removed (ThicknessSet::Upload)
/// ```
#[derive(Default)]
pub struct BoneThicknessPlugin {
    pub max_tasks_per_frame: Option<usize>,
    pub display: ScalarKind,
}

impl Plugin for BoneThicknessPlugin {
    fn build(&self, app: &mut App) {
        let defaults = ThicknessPluginConfig::default();
        app.insert_resource(ThicknessPluginConfig {
            max_tasks_per_frame: self
                .max_tasks_per_frame
                .unwrap_or(defaults.max_tasks_per_frame),
            display: self.display,
        });

        app.configure_sets(
            Update,
            (ThicknessSet::Spawn, ThicknessSet::Poll, ThicknessSet::Upload).chain(),
        )
        .add_systems(
            Update,
            (
                spawn_thickness_tasks.in_set(ThicknessSet::Spawn),
                poll_thickness_tasks.in_set(ThicknessSet::Poll),
                upload_top_layer.in_set(ThicknessSet::Upload),
            ),
        );

        #[cfg(feature = "auto_queue")]
        app.add_systems(Update, on_job_add.before(ThicknessSet::Spawn));
    }
}

/// Inserts [`QueuedJob`] on every newly added [`ThicknessJob`].
#[cfg(feature = "auto_queue")]
fn on_job_add(mut commands: Commands, query: Query<Entity, (Added<ThicknessJob>, Without<QueuedJob>)>) {
    for entity in query.iter() {
        commands.entity(entity).insert(QueuedJob);
    }
}

/// Starts queued jobs on the `AsyncComputeTaskPool`, up to [`ThicknessPluginConfig::max_tasks_per_frame`] per frame.
fn spawn_thickness_tasks(
    mut commands: Commands,
    config: Res<ThicknessPluginConfig>,
    query: Query<(Entity, &ThicknessJob), (With<QueuedJob>, Without<ThicknessRun>, Without<ThicknessResult>)>,
) {
    let task_pool = AsyncComputeTaskPool::get();

    for (entity, job) in query.iter().take(config.max_tasks_per_frame) {
        let surface = Arc::clone(&job.surface);
        let run_config = job.config.clone();
        let latest: Arc<Mutex<Option<ProgressUpdate>>> = Arc::default();
        let cancel = CancelToken::new();

        let sink = Arc::clone(&latest);
        let token = cancel.clone();
        let task = task_pool.spawn(async move {
            let observer = move |update: ProgressUpdate| {
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(update);
                }
            };
            map_thickness(&surface, &run_config, &observer, &token)
        });

        commands.entity(entity).insert((
            ThicknessRun {
                task,
                latest,
                cancel,
            },
            ThicknessStatus(RunStatus::Running {
                percent: 0,
                stage: Stage::Validate,
            }),
        ));
    }
}

/// Mirrors progress of in-flight runs and collects finished ones.
///
/// Non-blocking: runs that haven't finished are skipped and polled again next frame.
fn poll_thickness_tasks(
    mut commands: Commands,
    mut query: Query<(Entity, &mut ThicknessRun, &mut ThicknessStatus)>,
) {
    for (entity, mut run, mut status) in query.iter_mut() {
        if let Some(result) = block_on(future::poll_once(&mut run.task)) {
            let mut entity = commands.entity(entity);
            entity.remove::<ThicknessRun>();
            match result {
                Ok(map) => {
                    status.0 = RunStatus::Finished;
                    entity.insert(ThicknessResult(Arc::new(map)));
                }
                Err(err) => {
                    warn!("thickness job failed while {}: {}", err.stage(), err);
                    status.0 = RunStatus::Failed {
                        stage: err.stage(),
                        message: err.to_string(),
                    };
                    entity.remove::<QueuedJob>();
                }
            }
            continue;
        }

        let latest = run.latest.lock().ok().and_then(|mut slot| slot.take());
        if let Some(update) = latest {
            status.0 = RunStatus::Running {
                percent: update.percent,
                stage: update.stage,
            };
        }
    }
}

/// Builds the top-layer [`Mesh3d`] of finished jobs, colored by [`ThicknessPluginConfig::display`].
///
/// Runs for newly finished jobs, and for every finished job when the displayed field changes.
fn upload_top_layer(
    mut commands: Commands,
    config: Res<ThicknessPluginConfig>,
    query: Query<(Entity, Ref<ThicknessResult>)>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, result) in query.iter() {
        if !result.is_added() && !config.is_changed() {
            continue;
        }
        let mesh = top_layer_mesh(&result, config.display);
        commands
            .entity(entity)
            .insert(Mesh3d(meshes.add(mesh)))
            .remove::<QueuedJob>();
    }
}

/// Converts a thickness map into a Bevy triangle mesh with per-vertex colors.
pub fn top_layer_mesh(map: &ThicknessMap, kind: ScalarKind) -> Mesh {
    let top = &map.top_layer;
    let fallback = map.config.direction.cast_vector();

    let positions: Vec<[f32; 3]> = top
        .points
        .iter()
        .map(|p| [p.x as f32, p.y as f32, p.z as f32])
        .collect();
    let normals: Vec<[f32; 3]> = top
        .normals
        .iter()
        .map(|n| if *n == Vector::zeros() { fallback } else { *n })
        .map(|n| [n.x as f32, n.y as f32, n.z as f32])
        .collect();

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD,
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, map.vertex_colors(kind));
    mesh.insert_indices(Indices::U32(top.triangulated_indices()));
    mesh
}
