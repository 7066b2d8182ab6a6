//! glTF model loading, framing and animation autoplay

use archiview_core::{EventEmitter, ViewerConfig, ViewerEvent};
use bevy::asset::LoadState;
use bevy::camera::primitives::Aabb;
use bevy::prelude::*;
use tracing::{debug, error, info, warn};

use crate::scene::{CameraSettings, ShadowGround};

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelRequest>()
            .add_systems(
                Update,
                (
                    start_model_load,
                    track_model_load,
                    frame_model,
                    autoplay_animation,
                )
                    .chain()
                    .after(crate::viewer::dispatch_viewer_commands),
            );
    }
}

/// Root entity of the spawned model scene
#[derive(Component)]
pub struct ModelRoot;

/// Frames to wait for mesh bounds before framing with defaults
const MAX_FRAMING_FRAMES: u32 = 120;

/// How far one asset has come, in emitted progress order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetStage {
    Requested,
    Parsed,
    DependenciesLoaded,
    Spawned,
    Framed,
}

impl AssetStage {
    /// Progress reported when the asset reaches this stage
    pub fn fraction(self) -> f32 {
        match self {
            Self::Requested => 0.05,
            Self::Parsed => 0.4,
            Self::DependenciesLoaded => 0.85,
            Self::Spawned => 0.95,
            Self::Framed => 1.0,
        }
    }
}

/// Asset the viewer is currently showing or loading
pub struct ActiveAsset {
    pub handle: Handle<Gltf>,
    pub emitter: EventEmitter,
    pub config: ViewerConfig,
    pub stage: AssetStage,
    framing_frames: u32,
}

impl ActiveAsset {
    fn advance(&mut self, stage: AssetStage) {
        if stage > self.stage {
            self.stage = stage;
            self.emitter.emit(ViewerEvent::Progress(stage.fraction()));
        }
    }
}

/// Load requests from the viewer surface plus the asset they produced
#[derive(Resource, Default)]
pub struct ModelRequest {
    pending: Option<(ViewerConfig, EventEmitter)>,
    clear: bool,
    pub active: Option<ActiveAsset>,
}

impl ModelRequest {
    pub fn load(&mut self, config: ViewerConfig, emitter: EventEmitter) {
        self.pending = Some((config, emitter));
    }

    pub fn apply_config(&mut self, config: ViewerConfig) {
        if let Some((pending, _)) = self.pending.as_mut() {
            *pending = config;
        } else if let Some(active) = self.active.as_mut() {
            active.config = config;
        }
    }

    pub fn unload(&mut self) {
        self.pending = None;
        self.active = None;
        self.clear = true;
    }

    pub fn is_framed(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.stage == AssetStage::Framed)
    }
}

fn despawn_models(commands: &mut Commands, roots: &Query<Entity, With<ModelRoot>>) {
    for entity in roots.iter() {
        commands.entity(entity).despawn();
    }
}

fn start_model_load(
    mut commands: Commands,
    mut request: ResMut<ModelRequest>,
    asset_server: Res<AssetServer>,
    roots: Query<Entity, With<ModelRoot>>,
) {
    if std::mem::take(&mut request.clear) {
        despawn_models(&mut commands, &roots);
    }

    let Some((config, emitter)) = request.pending.take() else {
        return;
    };

    info!(src = %config.src, token = %emitter.token(), "Loading model");
    let handle: Handle<Gltf> = asset_server.load(config.src.clone());
    emitter.emit(ViewerEvent::Progress(AssetStage::Requested.fraction()));
    request.active = Some(ActiveAsset {
        handle,
        emitter,
        config,
        stage: AssetStage::Requested,
        framing_frames: 0,
    });
}

/// Step progress through the asset server states and spawn the scene
fn track_model_load(
    mut commands: Commands,
    mut request: ResMut<ModelRequest>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
    roots: Query<Entity, With<ModelRoot>>,
) {
    let Some(active) = request.active.as_mut() else {
        return;
    };
    if active.stage >= AssetStage::Spawned {
        return;
    }
    if !active.emitter.is_live() {
        debug!(token = %active.emitter.token(), "Dropping load for a closed session");
        request.active = None;
        return;
    }

    match asset_server.get_load_state(active.handle.id()) {
        Some(LoadState::Failed(err)) => {
            error!(src = %active.config.src, error = %err, "Failed to load model");
            despawn_models(&mut commands, &roots);
            active.emitter.emit(ViewerEvent::Error(Some(format!(
                "Failed to load 3D model: {}",
                err
            ))));
            request.active = None;
            return;
        }
        Some(LoadState::Loaded) => active.advance(AssetStage::Parsed),
        _ => return,
    }

    match asset_server.get_recursive_dependency_load_state(active.handle.id()) {
        Some(bevy::asset::RecursiveDependencyLoadState::Loaded) => {
            active.advance(AssetStage::DependenciesLoaded)
        }
        Some(bevy::asset::RecursiveDependencyLoadState::Failed(err)) => {
            error!(src = %active.config.src, error = %err, "Failed to load model dependencies");
            despawn_models(&mut commands, &roots);
            active.emitter.emit(ViewerEvent::Error(Some(format!(
                "Failed to load 3D model: {}",
                err
            ))));
            request.active = None;
            return;
        }
        _ => return,
    }

    let Some(gltf) = gltf_assets.get(&active.handle) else {
        return;
    };
    let Some(scene) = gltf
        .default_scene
        .clone()
        .or_else(|| gltf.scenes.first().cloned())
    else {
        warn!(src = %active.config.src, "Model has no scenes");
        active
            .emitter
            .emit(ViewerEvent::Error(Some("Model contains no scene".to_string())));
        request.active = None;
        return;
    };

    despawn_models(&mut commands, &roots);
    commands.spawn((SceneRoot(scene), Transform::default(), ModelRoot));
    debug!(src = %active.config.src, "Model scene spawned");
    active.advance(AssetStage::Spawned);
}

/// Camera distance that fits a bounding sphere into the vertical field of view
pub fn framing_distance(half_extents: Vec3, fov: f32) -> f32 {
    let radius = half_extents.length().max(0.01);
    radius / (fov * 0.5).sin()
}

/// Frame the camera on the spawned model once mesh bounds exist, then report load
fn frame_model(
    mut request: ResMut<ModelRequest>,
    mut camera: ResMut<CameraSettings>,
    roots: Query<Entity, With<ModelRoot>>,
    children_query: Query<&Children>,
    bounds_query: Query<(&Aabb, &GlobalTransform)>,
    projection_query: Query<&Projection, With<crate::scene::MainCamera>>,
    mut ground_query: Query<&mut Transform, With<ShadowGround>>,
) {
    let Some(active) = request.active.as_mut() else {
        return;
    };
    if active.stage != AssetStage::Spawned {
        return;
    }
    let Ok(root) = roots.single() else {
        return;
    };

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut found = false;
    for entity in children_query.iter_descendants(root) {
        if let Ok((aabb, transform)) = bounds_query.get(entity) {
            let center = Vec3::from(aabb.center);
            let half = Vec3::from(aabb.half_extents);
            for corner in [
                Vec3::new(-1.0, -1.0, -1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(1.0, 1.0, -1.0),
                Vec3::new(-1.0, -1.0, 1.0),
                Vec3::new(1.0, -1.0, 1.0),
                Vec3::new(-1.0, 1.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
            ] {
                let world = transform.transform_point(center + half * corner);
                min = min.min(world);
                max = max.max(world);
            }
            found = true;
        }
    }

    if !found {
        active.framing_frames += 1;
        if active.framing_frames < MAX_FRAMING_FRAMES {
            return;
        }
        warn!(src = %active.config.src, "Model has no mesh bounds, using default framing");
        min = Vec3::splat(-1.0);
        max = Vec3::splat(1.0);
    }

    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    let fov = match projection_query.single() {
        Ok(Projection::Perspective(p)) => p.fov,
        _ => std::f32::consts::FRAC_PI_4,
    };
    camera.set_framing(center, framing_distance(half, fov));
    camera.jump_to_goal();

    if let Ok(mut ground) = ground_query.single_mut() {
        let radius = half.xz().length().max(0.01) * 1.5;
        ground.translation = Vec3::new(center.x, min.y, center.z);
        ground.scale = Vec3::splat(radius);
    }

    info!(src = %active.config.src, ?center, "Model framed");
    active.advance(AssetStage::Framed);
    active.emitter.emit(ViewerEvent::Load);
}

/// Start the configured (or first) embedded animation on new players
fn autoplay_animation(
    mut commands: Commands,
    request: Res<ModelRequest>,
    gltf_assets: Res<Assets<Gltf>>,
    mut graphs: ResMut<Assets<AnimationGraph>>,
    mut players: Query<(Entity, &mut AnimationPlayer), Added<AnimationPlayer>>,
) {
    let Some(active) = request.active.as_ref() else {
        return;
    };
    if !active.config.autoplay {
        return;
    }
    let Some(gltf) = gltf_assets.get(&active.handle) else {
        return;
    };

    let clip = active
        .config
        .animation_name
        .as_deref()
        .and_then(|name| gltf.named_animations.get(name).cloned())
        .or_else(|| gltf.animations.first().cloned());
    let Some(clip) = clip else {
        return;
    };

    for (entity, mut player) in &mut players {
        let (graph, index) = AnimationGraph::from_clip(clip.clone());
        let graph_handle = graphs.add(graph);
        player.play(index).repeat();
        commands
            .entity(entity)
            .insert(AnimationGraphHandle(graph_handle));
        debug!(animation = ?active.config.animation_name, "Autoplaying model animation");
    }
}
