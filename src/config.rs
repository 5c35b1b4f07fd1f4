//! Scene configuration.
//!
//! Every tunable of the scene lives here with its default value. A TOML file
//! (`assets/scene.toml`) may override any subset of it:
//!
//! ```toml
//! [bloom]
//! intensity = 1.5
//!
//! [camera]
//! fov_degrees = 60.0
//! ```

use anyhow::Context as _;
use serde::Deserialize;

use crate::resources::load_string;

/// Default location of the optional scene configuration file.
pub const CONFIG_FILE: &str = "scene.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct SceneConfig {
    pub camera: CameraConfig,
    pub sphere: SphereConfig,
    pub plane: PlaneConfig,
    pub bloom: BloomConfig,
    pub animation: AnimationConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    /// Background colour of the scene target (linear RGBA).
    pub clear_colour: [f64; 4],
}

impl CameraConfig {
    pub fn background(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_colour;
        wgpu::Color { r, g, b, a }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 0.0, 5.0],
            clear_colour: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SphereConfig {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
    pub position: [f32; 3],
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            radius: 2.6,
            width_segments: 64,
            height_segments: 64,
            position: [0.27, -0.37, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub width: f32,
    pub height: f32,
    pub position: [f32; 3],
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            width: 15.86,
            height: 8.92,
            position: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    pub enabled: bool,
    pub intensity: f32,
    /// Blend factor between neighbouring mip levels while upsampling (0..=1).
    pub radius: f32,
    pub luminance_threshold: f32,
    pub luminance_smoothing: f32,
    pub mipmap_blur: bool,
    /// Upper bound for the number of mip levels in the blur chain.
    pub levels: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 2.0,
            radius: 0.8,
            luminance_threshold: 0.1,
            luminance_smoothing: 0.89,
            mipmap_blur: true,
            levels: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Added to the shader `time` uniform once per frame.
    pub time_step: f32,
    /// Sphere Y rotation (radians) reached at the end of the video.
    pub spin: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            time_step: 0.01,
            spin: -0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Asset played on the plane when running natively.
    pub file: String,
    /// Id of the `<video>` element used when running in the browser.
    pub element_id: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            file: "video.gif".to_string(),
            element_id: "video".to_string(),
        }
    }
}

impl SceneConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: SceneConfig = toml::from_str(text).context("invalid scene configuration")?;
        Ok(config.sanitized())
    }

    /// Load the configuration file, falling back to the defaults when it is
    /// missing or malformed.
    pub async fn load(file_name: &str) -> Self {
        let text = match load_string(file_name).await {
            Ok(text) => text,
            Err(e) => {
                log::info!("No scene configuration loaded from {file_name} ({e}), using defaults");
                return Self::default();
            }
        };
        match Self::from_toml_str(&text) {
            Ok(config) => {
                log::info!("Scene configuration loaded from {file_name}");
                config
            }
            Err(e) => {
                log::warn!("Ignoring {file_name}: {e:#}");
                Self::default()
            }
        }
    }

    /// Clamp values the renderer cannot work with.
    ///
    /// Non-finite numbers (TOML accepts `nan` and `inf`) fall back to their
    /// defaults before clamping.
    pub fn sanitized(mut self) -> Self {
        let defaults = SceneConfig::default();

        let camera = &mut self.camera;
        finite_or(&mut camera.fov_degrees, defaults.camera.fov_degrees);
        finite_or(&mut camera.near, defaults.camera.near);
        finite_or(&mut camera.far, defaults.camera.far);
        finite_each(&mut camera.position, defaults.camera.position);
        for (channel, default) in camera.clear_colour.iter_mut().zip(defaults.camera.clear_colour) {
            if !channel.is_finite() {
                *channel = default;
            }
        }
        camera.fov_degrees = camera.fov_degrees.clamp(1.0, 179.0);
        camera.near = camera.near.max(f32::EPSILON);
        if camera.far <= camera.near {
            camera.far = camera.near * 10.0;
        }

        let sphere = &mut self.sphere;
        finite_or(&mut sphere.radius, defaults.sphere.radius);
        finite_each(&mut sphere.position, defaults.sphere.position);
        sphere.radius = sphere.radius.max(0.0);
        sphere.width_segments = sphere.width_segments.clamp(3, MAX_SPHERE_SEGMENTS);
        sphere.height_segments = sphere.height_segments.clamp(2, MAX_SPHERE_SEGMENTS);

        let plane = &mut self.plane;
        finite_or(&mut plane.width, defaults.plane.width);
        finite_or(&mut plane.height, defaults.plane.height);
        finite_each(&mut plane.position, defaults.plane.position);
        plane.width = plane.width.max(0.0);
        plane.height = plane.height.max(0.0);

        let bloom = &mut self.bloom;
        finite_or(&mut bloom.intensity, defaults.bloom.intensity);
        finite_or(&mut bloom.radius, defaults.bloom.radius);
        finite_or(&mut bloom.luminance_threshold, defaults.bloom.luminance_threshold);
        finite_or(&mut bloom.luminance_smoothing, defaults.bloom.luminance_smoothing);
        bloom.intensity = bloom.intensity.max(0.0);
        bloom.radius = bloom.radius.clamp(0.0, 1.0);
        bloom.luminance_threshold = bloom.luminance_threshold.clamp(0.0, 1.0);
        bloom.luminance_smoothing = bloom.luminance_smoothing.max(0.0);
        bloom.levels = bloom.levels.clamp(1, 16);

        let animation = &mut self.animation;
        finite_or(&mut animation.time_step, defaults.animation.time_step);
        finite_or(&mut animation.spin, defaults.animation.spin);
        self
    }
}

/// Upper bound for either sphere segment count; the vertex grid stays far below `u32::MAX`.
pub const MAX_SPHERE_SEGMENTS: u32 = 1024;

fn finite_or(value: &mut f32, default: f32) {
    if !value.is_finite() {
        *value = default;
    }
}

fn finite_each(values: &mut [f32; 3], defaults: [f32; 3]) {
    for (value, default) in values.iter_mut().zip(defaults) {
        finite_or(value, default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_scene() {
        let config = SceneConfig::default();
        assert_eq!(config.camera.fov_degrees, 75.0);
        assert_eq!(config.camera.near, 0.1);
        assert_eq!(config.camera.far, 1000.0);
        assert_eq!(config.sphere.radius, 2.6);
        assert_eq!(config.sphere.width_segments, 64);
        assert_eq!(config.sphere.height_segments, 64);
        assert_eq!(config.plane.width, 15.86);
        assert_eq!(config.plane.height, 8.92);
        assert_eq!(config.bloom.intensity, 2.0);
        assert_eq!(config.bloom.radius, 0.8);
        assert_eq!(config.bloom.luminance_threshold, 0.1);
        assert_eq!(config.bloom.luminance_smoothing, 0.89);
        assert!(config.bloom.mipmap_blur);
        assert_eq!(config.animation.time_step, 0.01);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = SceneConfig::from_toml_str("").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SceneConfig::from_toml_str(
            r#"
            [bloom]
            intensity = 1.25

            [sphere]
            position = [1.0, 2.0, 3.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.bloom.intensity, 1.25);
        assert_eq!(config.bloom.radius, 0.8);
        assert_eq!(config.sphere.position, [1.0, 2.0, 3.0]);
        assert_eq!(config.sphere.radius, 2.6);
        assert_eq!(config.camera, CameraConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(SceneConfig::from_toml_str("[bloom]\nintensity = \"bright\"").is_err());
    }

    #[test]
    fn unusable_values_are_clamped() {
        let config = SceneConfig::from_toml_str(
            r#"
            [camera]
            fov_degrees = 400.0
            near = 5.0
            far = 1.0

            [sphere]
            width_segments = 1
            height_segments = 0

            [bloom]
            radius = 3.0
            levels = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.fov_degrees, 179.0);
        assert!(config.camera.far > config.camera.near);
        assert_eq!(config.sphere.width_segments, 3);
        assert_eq!(config.sphere.height_segments, 2);
        assert_eq!(config.bloom.radius, 1.0);
        assert_eq!(config.bloom.levels, 1);
    }

    #[test]
    fn non_finite_values_fall_back_to_defaults() {
        let config = SceneConfig::from_toml_str(
            r#"
            [camera]
            fov_degrees = nan
            far = nan
            position = [0.0, inf, 5.0]

            [bloom]
            radius = nan
            luminance_threshold = -inf

            [animation]
            spin = nan
            "#,
        )
        .unwrap();
        let defaults = SceneConfig::default();
        assert_eq!(config.camera.fov_degrees, defaults.camera.fov_degrees);
        assert_eq!(config.camera.far, defaults.camera.far);
        assert_eq!(config.camera.position, defaults.camera.position);
        assert_eq!(config.bloom.radius, defaults.bloom.radius);
        assert_eq!(config.bloom.luminance_threshold, defaults.bloom.luminance_threshold);
        assert_eq!(config.animation.spin, defaults.animation.spin);
    }

    #[test]
    fn nan_camera_still_builds_a_projection() {
        use crate::camera::Projection;

        let config = SceneConfig::from_toml_str("[camera]\nfar = nan\nfov_degrees = nan").unwrap();
        let matrix = Projection::from_config(800, 600, &config.camera).calc_matrix();
        let columns: [[f32; 4]; 4] = matrix.into();
        assert!(columns.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn sphere_segments_are_capped() {
        let config = SceneConfig::from_toml_str("[sphere]\nwidth_segments = 70000\nheight_segments = 70000").unwrap();
        assert_eq!(config.sphere.width_segments, MAX_SPHERE_SEGMENTS);
        assert_eq!(config.sphere.height_segments, MAX_SPHERE_SEGMENTS);
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let config = SceneConfig::load("no-such-scene.toml").await;
        assert_eq!(config, SceneConfig::default());
    }

    #[tokio::test]
    async fn malformed_file_loads_defaults() {
        // asset names resolve below ./assets
        let config = SceneConfig::load("../tests/fixtures/malformed-scene.toml").await;
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn shipped_file_spells_out_the_defaults() {
        let config = SceneConfig::from_toml_str(include_str!("../assets/scene.toml")).unwrap();
        assert_eq!(config, SceneConfig::default());
    }
}
