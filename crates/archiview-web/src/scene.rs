//! Camera rig, lights and the shadow ground

use archiview_core::{CameraOrbit, CameraTarget, ViewerConfig};
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::prelude::*;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraSettings>()
            .init_resource::<LightingSettings>()
            .add_systems(Startup, setup_scene)
            .add_systems(Update, (update_camera, update_lights));
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Key light, casts the model shadow
#[derive(Component)]
pub struct KeyLight;

/// Fill light from the opposite side
#[derive(Component)]
pub struct FillLight;

/// Ground disc that receives the model shadow
#[derive(Component)]
pub struct ShadowGround;

const KEY_ILLUMINANCE: f32 = 8000.0;
const FILL_ILLUMINANCE: f32 = 2500.0;
/// Seconds without interaction before auto-rotate resumes
const AUTO_ROTATE_DELAY_SECS: f32 = 3.0;
const MIN_RADIUS_PERCENT: f32 = 20.0;
const MAX_RADIUS_PERCENT: f32 = 300.0;
const MIN_POLAR: f32 = 0.05;
const MAX_POLAR: f32 = std::f32::consts::PI - 0.05;

/// Orbit camera state
///
/// Every orbit value has a goal (`target_*`) the rig eases toward;
/// `jump_to_goal` skips the easing.
#[derive(Debug, Clone, Resource)]
pub struct CameraSettings {
    /// Azimuth around the up axis, radians
    pub azimuth: f32,
    pub target_azimuth: f32,
    /// Angle from the up axis, radians
    pub polar: f32,
    pub target_polar: f32,
    /// Distance as a percentage of the framing distance
    pub radius_percent: f32,
    pub target_radius_percent: f32,
    pub focus: Vec3,
    pub target_focus: Vec3,
    pub target_mode: CameraTarget,
    /// Distance at which the whole model fits the view
    pub framing_distance: f32,
    /// Center of the loaded model's bounds
    pub model_center: Vec3,
    pub controls_enabled: bool,
    pub pan_enabled: bool,
    pub auto_rotate: bool,
    /// Auto-rotate speed, radians per second
    pub rotation_speed: f32,
    idle_secs: f32,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        let orbit = CameraOrbit::DEFAULT;
        Self {
            azimuth: orbit.theta_deg.to_radians(),
            target_azimuth: orbit.theta_deg.to_radians(),
            polar: orbit.phi_deg.to_radians(),
            target_polar: orbit.phi_deg.to_radians(),
            radius_percent: orbit.radius_percent,
            target_radius_percent: orbit.radius_percent,
            focus: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            target_mode: CameraTarget::Auto,
            framing_distance: 5.0,
            model_center: Vec3::ZERO,
            controls_enabled: true,
            pan_enabled: true,
            auto_rotate: true,
            rotation_speed: 30f32.to_radians(),
            idle_secs: 0.0,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
        }
    }
}

impl CameraSettings {
    pub fn apply_config(&mut self, config: &ViewerConfig) {
        self.controls_enabled = config.camera_controls;
        self.pan_enabled = !config.disable_pan;
        self.auto_rotate = config.auto_rotate;
        self.rotation_speed = config.rotation_per_second_deg.to_radians();
    }

    pub fn set_orbit(&mut self, orbit: CameraOrbit) {
        self.target_azimuth = orbit.theta_deg.to_radians();
        self.target_polar = orbit.phi_deg.to_radians().clamp(MIN_POLAR, MAX_POLAR);
        self.target_radius_percent = orbit
            .radius_percent
            .clamp(MIN_RADIUS_PERCENT, MAX_RADIUS_PERCENT);
        self.idle_secs = 0.0;
    }

    pub fn set_target(&mut self, target: CameraTarget) {
        self.target_mode = target;
        self.target_focus = self.resolve_target();
    }

    pub fn jump_to_goal(&mut self) {
        self.azimuth = self.target_azimuth;
        self.polar = self.target_polar;
        self.radius_percent = self.target_radius_percent;
        self.focus = self.target_focus;
    }

    /// Record the bounds of a newly loaded model
    pub fn set_framing(&mut self, center: Vec3, framing_distance: f32) {
        self.model_center = center;
        self.framing_distance = framing_distance.max(0.01);
        if self.target_mode == CameraTarget::Auto {
            self.target_focus = center;
            self.focus = center;
        }
    }

    pub fn resolve_target(&self) -> Vec3 {
        match self.target_mode {
            CameraTarget::Auto => self.model_center,
            CameraTarget::Point(p) => to_world(p),
        }
    }

    pub fn distance(&self) -> f32 {
        self.framing_distance * self.radius_percent / 100.0
    }

    /// Camera position for the current (eased) orbit, Y up
    pub fn eye(&self) -> Vec3 {
        let d = self.distance();
        self.focus
            + Vec3::new(
                d * self.polar.sin() * self.azimuth.sin(),
                d * self.polar.cos(),
                d * self.polar.sin() * self.azimuth.cos(),
            )
    }
}

pub fn to_world(p: archiview_core::Vec3) -> Vec3 {
    let [x, y, z] = p.to_array();
    Vec3::new(x as f32, y as f32, z as f32)
}

pub fn to_model(v: Vec3) -> archiview_core::Vec3 {
    archiview_core::Vec3::new(v.x as f64, v.y as f64, v.z as f64)
}

/// Light rig parameters taken from the viewer configuration
#[derive(Debug, Clone, Resource)]
pub struct LightingSettings {
    pub exposure: f32,
    pub shadow_intensity: f32,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            shadow_intensity: 1.0,
        }
    }
}

impl LightingSettings {
    pub fn apply_config(&mut self, config: &ViewerConfig) {
        self.exposure = config.exposure;
        self.shadow_intensity = config.shadow_intensity;
    }
}

fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<CameraSettings>,
) {
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            near: 0.01,
            far: 1000.0,
            ..default()
        }),
        Transform::from_translation(settings.eye()).looking_at(settings.focus, Vec3::Y),
        MainCamera,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: KEY_ILLUMINANCE,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
        KeyLight,
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: FILL_ILLUMINANCE,
            shadows_enabled: false,
            color: Color::srgb(0.9, 0.95, 1.0),
            ..default()
        },
        Transform::from_xyz(-4.0, 3.0, -2.0).looking_at(Vec3::ZERO, Vec3::Y),
        FillLight,
    ));

    commands.spawn((
        Mesh3d(meshes.add(Circle::new(1.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.96, 0.96, 0.97),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_rotation(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2)),
        Visibility::Hidden,
        ShadowGround,
    ));
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut settings: ResMut<CameraSettings>,
    mouse_motion: Res<AccumulatedMouseMotion>,
    mouse_scroll: Res<AccumulatedMouseScroll>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    time: Res<Time>,
    mut contexts: bevy_egui::EguiContexts,
) {
    // UI panels keep the pointer
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);
    let controls = settings.controls_enabled && !egui_wants_pointer;
    let mut interacted = false;
    let motion = mouse_motion.delta;

    if controls && mouse_button.pressed(MouseButton::Left) && motion != Vec2::ZERO {
        orbit_by(&mut settings, motion);
        interacted = true;
    }

    if controls
        && settings.pan_enabled
        && mouse_button.pressed(MouseButton::Right)
        && motion != Vec2::ZERO
    {
        pan_by(&mut settings, motion);
        interacted = true;
    }

    if controls && mouse_scroll.delta.y != 0.0 {
        let zoom_factor = 1.0 - mouse_scroll.delta.y.signum() * settings.zoom_speed;
        settings.target_radius_percent = (settings.target_radius_percent * zoom_factor)
            .clamp(MIN_RADIUS_PERCENT, MAX_RADIUS_PERCENT);
        interacted = true;
    }

    let touches: Vec<_> = touch_input.iter().collect();
    if controls && touches.len() == 1 {
        let delta = touches[0].delta();
        if delta != Vec2::ZERO {
            orbit_by(&mut settings, delta);
            interacted = true;
        }
    }

    // Pinch to zoom, two-finger drag to pan
    if controls && touches.len() == 2 {
        let (t1, t2) = (touches[0], touches[1]);
        let curr_dist = t1.position().distance(t2.position());
        let prev_dist = (t1.position() - t1.delta()).distance(t2.position() - t2.delta());
        let zoom_factor = prev_dist / curr_dist.max(1.0);
        settings.target_radius_percent = (settings.target_radius_percent * zoom_factor)
            .clamp(MIN_RADIUS_PERCENT, MAX_RADIUS_PERCENT);
        if settings.pan_enabled {
            pan_by(&mut settings, (t1.delta() + t2.delta()) * 0.5);
        }
        interacted = true;
    }

    let dt = time.delta_secs();
    if interacted {
        settings.idle_secs = 0.0;
    } else {
        settings.idle_secs += dt;
    }

    if settings.auto_rotate && settings.idle_secs > AUTO_ROTATE_DELAY_SECS {
        let step = settings.rotation_speed * dt;
        settings.target_azimuth += step;
        settings.azimuth += step;
    }

    let lerp_factor = 1.0 - (-settings.smooth_factor * 60.0 * dt).exp();
    settings.azimuth += (settings.target_azimuth - settings.azimuth) * lerp_factor;
    settings.polar += (settings.target_polar - settings.polar) * lerp_factor;
    settings.radius_percent +=
        (settings.target_radius_percent - settings.radius_percent) * lerp_factor;
    settings.focus = settings.focus + (settings.target_focus - settings.focus) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = settings.eye();
        transform.look_at(settings.focus, Vec3::Y);
    }
}

fn orbit_by(settings: &mut CameraSettings, delta: Vec2) {
    settings.target_azimuth -= delta.x * settings.sensitivity;
    settings.target_polar =
        (settings.target_polar - delta.y * settings.sensitivity).clamp(MIN_POLAR, MAX_POLAR);
}

/// Move the focus in the camera's screen plane
fn pan_by(settings: &mut CameraSettings, delta: Vec2) {
    let right = Vec3::new(settings.azimuth.cos(), 0.0, -settings.azimuth.sin());
    let up = Vec3::Y;
    let pan_speed = settings.distance() * 0.002;
    settings.target_focus -= right * delta.x * pan_speed;
    settings.target_focus += up * delta.y * pan_speed;
}

fn update_lights(
    lighting: Res<LightingSettings>,
    mut key_query: Query<&mut DirectionalLight, (With<KeyLight>, Without<FillLight>)>,
    mut fill_query: Query<&mut DirectionalLight, (With<FillLight>, Without<KeyLight>)>,
    mut ground_query: Query<&mut Visibility, With<ShadowGround>>,
) {
    if !lighting.is_changed() {
        return;
    }

    let cast_shadows = lighting.shadow_intensity > 0.0;
    if let Ok(mut key) = key_query.single_mut() {
        key.illuminance = KEY_ILLUMINANCE * lighting.exposure;
        key.shadows_enabled = cast_shadows;
    }
    if let Ok(mut fill) = fill_query.single_mut() {
        fill.illuminance = FILL_ILLUMINANCE * lighting.exposure;
    }
    if let Ok(mut visibility) = ground_query.single_mut() {
        *visibility = if cast_shadows {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orbit_matches_reset() {
        let settings = CameraSettings::default();
        assert!((settings.azimuth - 45f32.to_radians()).abs() < 1e-6);
        assert!((settings.polar - 55f32.to_radians()).abs() < 1e-6);
        assert_eq!(settings.radius_percent, 105.0);
    }

    #[test]
    fn test_eye_distance_follows_radius() {
        let mut settings = CameraSettings::default();
        settings.set_framing(Vec3::new(0.0, 1.0, 0.0), 10.0);
        settings.set_orbit(CameraOrbit {
            theta_deg: 0.0,
            phi_deg: 90.0,
            radius_percent: 100.0,
        });
        settings.jump_to_goal();

        let eye = settings.eye();
        assert!((eye - Vec3::new(0.0, 1.0, 10.0)).length() < 1e-4);
    }

    #[test]
    fn test_point_target_ignores_model_center() {
        let mut settings = CameraSettings::default();
        settings.set_target(CameraTarget::Point(archiview_core::Vec3::new(0.0, 1.6, 0.0)));
        settings.set_framing(Vec3::new(5.0, 5.0, 5.0), 4.0);
        assert_eq!(settings.target_focus, Vec3::new(0.0, 1.6, 0.0));

        settings.set_target(CameraTarget::Auto);
        assert_eq!(settings.target_focus, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_orbit_is_clamped() {
        let mut settings = CameraSettings::default();
        settings.set_orbit(CameraOrbit {
            theta_deg: 0.0,
            phi_deg: 270.0,
            radius_percent: 5000.0,
        });
        assert_eq!(settings.target_polar, MAX_POLAR);
        assert_eq!(settings.target_radius_percent, MAX_RADIUS_PERCENT);
    }

    #[test]
    fn test_placement_lock_disables_pan() {
        let catalog = archiview_core::Catalog::builtin().unwrap();
        let config = ViewerConfig::for_model(
            catalog.default_record(),
            &archiview_core::ViewerSettings::default(),
        )
        .with_placement_lock(true);

        let mut settings = CameraSettings::default();
        settings.apply_config(&config);
        assert!(!settings.pan_enabled);
        assert!(settings.controls_enabled);
    }
}
