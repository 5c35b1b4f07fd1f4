//! GPU and window context.
//!
//! [`Context`] owns everything a frame needs: the surface, device and queue,
//! the camera, the scene pipelines and the post-processing composer.
//! [`InitContext`] is the subset handed to asynchronous flow constructors.

use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, Projection},
    composer::Composer,
    config::CameraConfig,
    pipelines::{Pipelines, bloom::BloomSettings},
};

#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub pipelines: Pipelines,
    pub composer: Composer,
    pub clear_colour: wgpu::Color,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("the window does not provide a drawable surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no graphics adapter can present to this window")?;

        log::info!("Device and queue on {}", adapter.get_info().name);
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("the graphics device could not be opened")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // Video frames and the bloom chain are linear; the surface does the sRGB encoding.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no texture format")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let camera_config = CameraConfig::default();
        let projection = Projection::from_config(config.width, config.height, &camera_config);
        let camera = CameraResources::new(&device, Camera::from(&camera_config), &projection);
        let pipelines = Pipelines::new(&device, Composer::SCENE_FORMAT, &camera.bind_group_layout);
        let composer = Composer::new(
            &device,
            config.width,
            config.height,
            config.format,
            BloomSettings::default(),
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            pipelines,
            composer,
            clear_colour: wgpu::Color::BLACK,
        })
    }

    /// Size the surface is currently configured with.
    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure the surface and every size dependent resource.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.composer.resize(&self.device, width, height);
    }
}

/// What a flow constructor gets to build its GPU resources with.
///
/// `wgpu` handles are reference counted, so cloning this is cheap.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub object_layout: wgpu::BindGroupLayout,
    pub colour_map_layout: wgpu::BindGroupLayout,
}

impl InitContext {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, pipelines: &Pipelines) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            object_layout: pipelines.object_layout.clone(),
            colour_map_layout: pipelines.colour_map_layout.clone(),
        }
    }
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        Self::new(&ctx.device, &ctx.queue, &ctx.pipelines)
    }
}

/// Whether a surface configured at `configured` has to follow a display of size `display`.
///
/// A minimised window reports a zero size; the surface keeps its size then.
pub fn needs_resize(configured: (u32, u32), display: (u32, u32)) -> bool {
    display.0 > 0 && display.1 > 0 && display != configured
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_size_needs_no_resize() {
        assert!(!needs_resize((800, 600), (800, 600)));
    }

    #[test]
    fn any_changed_dimension_needs_resize() {
        assert!(needs_resize((800, 600), (1024, 600)));
        assert!(needs_resize((800, 600), (800, 768)));
    }

    #[test]
    fn minimised_window_keeps_surface() {
        assert!(!needs_resize((800, 600), (0, 0)));
        assert!(!needs_resize((800, 600), (0, 600)));
        assert!(!needs_resize((800, 600), (800, 0)));
    }
}
