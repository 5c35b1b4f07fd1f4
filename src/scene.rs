//! The video orb scene.
//!
//! An iridescent sphere hovers in front of a plane showing a video. Each frame
//! the shader clock moves on by a fixed step and the sphere turns around its
//! vertical axis in step with the video's playback position.

use instant::Duration;
use winit::event::WindowEvent;

use crate::{
    camera::{Camera, Projection},
    config::{CONFIG_FILE, SceneConfig},
    context::{Context, InitContext},
    data_structures::{
        mesh::{Geometry, Mesh},
        transform::{ObjectResources, Transform},
    },
    flow::{GraphicsFlow, Out},
    pipelines::bloom::BloomSettings,
    render::{Drawable, Render, Textured},
    resources::video::{FrameSequence, VideoSource, VideoTexture, playback_progress},
};

/// Y rotation of the sphere for a playback position.
///
/// `factor * current_time / duration`, or no rotation while the duration is
/// unknown (NaN before the metadata arrived, zero for a still image).
pub fn sphere_spin(current_time: f64, duration: f64, factor: f32) -> f32 {
    (factor as f64 * playback_progress(current_time, duration)) as f32
}

pub struct VideoOrb {
    config: SceneConfig,
    sphere_mesh: Mesh,
    sphere: ObjectResources,
    plane_mesh: Mesh,
    plane: ObjectResources,
    video: Box<dyn VideoSource>,
    video_texture: VideoTexture,
    colour_map_layout: wgpu::BindGroupLayout,
    time: f32,
}

impl VideoOrb {
    /// Load the configuration and the video, then build the scene.
    ///
    /// Neither a missing configuration nor a missing video stops the scene:
    /// defaults and a black frame are used instead.
    pub async fn new(ctx: InitContext) -> Self {
        let config = SceneConfig::load(CONFIG_FILE).await;
        let mut video = open_video(&config).await;
        video.play();
        Self::with_source(&ctx, config, video)
    }

    pub fn with_source(ctx: &InitContext, config: SceneConfig, video: Box<dyn VideoSource>) -> Self {
        let sphere_config = &config.sphere;
        let sphere_mesh = Mesh::new(
            &ctx.device,
            &Geometry::sphere(
                sphere_config.radius,
                sphere_config.width_segments,
                sphere_config.height_segments,
            ),
            "sphere",
        );
        let sphere = ObjectResources::new(
            &ctx.device,
            &ctx.object_layout,
            Transform::from(sphere_config.position),
            "sphere",
        );

        let plane_mesh = Mesh::new(
            &ctx.device,
            &Geometry::plane(config.plane.width, config.plane.height),
            "plane",
        );
        let plane = ObjectResources::new(
            &ctx.device,
            &ctx.object_layout,
            Transform::from(config.plane.position),
            "plane",
        );

        let video_texture = VideoTexture::new(&ctx.device, &ctx.queue, &ctx.colour_map_layout);

        Self {
            config,
            sphere_mesh,
            sphere,
            plane_mesh,
            plane,
            video,
            video_texture,
            colour_map_layout: ctx.colour_map_layout.clone(),
            time: 0.0,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The shader clock.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn sphere_transform(&self) -> &Transform {
        &self.sphere.transform
    }

    /// One animation step: advance the clocks, turn the sphere, upload uniforms
    /// and the current video frame.
    pub fn advance(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, dt: Duration) {
        self.video.advance(dt);
        self.time += self.config.animation.time_step;

        let spin = sphere_spin(
            self.video.current_time(),
            self.video.duration(),
            self.config.animation.spin,
        );
        self.sphere.transform.set_rotation_y(spin);
        self.sphere.write_to_buffer(queue, self.time);
        self.plane.write_to_buffer(queue, self.time);

        self.video_texture
            .update(device, queue, &self.colour_map_layout, self.video.as_mut());
    }

    /// The context changes the scene needs: camera, clear colour and bloom parameters.
    pub fn configure(&self) -> Out {
        let config = self.config.clone();
        Out::Configure(Box::new(move |ctx: &mut Context| {
            let camera = &config.camera;
            ctx.camera.camera = Camera::from(camera);
            ctx.projection = Projection::from_config(ctx.config.width, ctx.config.height, camera);
            ctx.camera.write(&ctx.queue, &ctx.projection);
            ctx.clear_colour = camera.background();
            ctx.composer
                .configure_bloom(&ctx.device, BloomSettings::from(&config.bloom));
        }))
    }
}

async fn open_video(config: &SceneConfig) -> Box<dyn VideoSource> {
    #[cfg(target_arch = "wasm32")]
    {
        match crate::resources::video::DomVideo::from_element_id(&config.video.element_id) {
            Ok(video) => return Box::new(video),
            Err(e) => log::warn!("Showing a black video plane: {e:#}"),
        }
        Box::new(FrameSequence::blank())
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        match FrameSequence::load(&config.video.file).await {
            Ok(video) => {
                log::info!(
                    "Playing {} ({} frames, {:.2}s)",
                    config.video.file,
                    video.frame_count(),
                    video.duration()
                );
                Box::new(video)
            }
            Err(e) => {
                log::warn!("Showing a black video plane: {e:#}");
                Box::new(FrameSequence::blank())
            }
        }
    }
}

impl GraphicsFlow<()> for VideoOrb {
    fn on_init(&mut self, _: &mut Context, _: &mut ()) -> Out {
        self.configure()
    }

    fn on_update(&mut self, ctx: &Context, _: &mut (), dt: Duration) -> Out {
        self.advance(&ctx.device, &ctx.queue, dt);
        Out::Empty
    }

    fn on_window_events(&mut self, _: &Context, _: &mut (), _: &WindowEvent) -> Out {
        Out::Empty
    }

    fn on_render(&self) -> Render<'_> {
        Render::Composed(vec![
            Render::Textured(Textured {
                drawable: Drawable {
                    mesh: &self.plane_mesh,
                    object: &self.plane.bind_group,
                },
                colour_map: &self.video_texture.bind_group,
            }),
            Render::Shaded(Drawable {
                mesh: &self.sphere_mesh,
                object: &self.sphere.bind_group,
            }),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_follows_playback_progress() {
        assert_eq!(sphere_spin(0.0, 10.0, -0.3), 0.0);
        assert!((sphere_spin(5.0, 10.0, -0.3) + 0.15).abs() < 1e-6);
        assert!((sphere_spin(10.0, 10.0, -0.3) + 0.3).abs() < 1e-6);
    }

    #[test]
    fn spin_is_zero_without_a_duration() {
        assert_eq!(sphere_spin(3.0, f64::NAN, -0.3), 0.0);
        assert_eq!(sphere_spin(3.0, 0.0, -0.3), 0.0);
        assert_eq!(sphere_spin(3.0, f64::INFINITY, -0.3), 0.0);
        assert_eq!(sphere_spin(f64::NAN, 10.0, -0.3), 0.0);
    }

    #[test]
    fn spin_scales_with_factor() {
        assert!((sphere_spin(2.0, 4.0, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(sphere_spin(2.0, 4.0, 0.0), 0.0);
    }
}
