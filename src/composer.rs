//! Post-processing composer.
//!
//! The scene is never drawn to the screen directly: it goes into an offscreen
//! colour target (plus depth) first, and the bloom effect then composites
//! that target into whatever view the frame should end up in.

use crate::{
    data_structures::texture::Texture,
    pipelines::bloom::{BloomEffect, BloomSettings},
};

#[derive(Debug)]
pub struct Composer {
    pub scene: Texture,
    pub depth: Texture,
    pub bloom: BloomEffect,
}

impl Composer {
    /// Format of the offscreen scene target and the bloom levels.
    #[cfg(not(target_arch = "wasm32"))]
    pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    // WebGL2 can't render to float targets without extensions
    #[cfg(target_arch = "wasm32")]
    pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    /// `output_format` is the format of the views passed to [`Composer::render`].
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        output_format: wgpu::TextureFormat,
        settings: BloomSettings,
    ) -> Self {
        let (scene, depth) = Self::targets(device, width, height);
        let bloom = BloomEffect::new(device, &scene, Self::SCENE_FORMAT, output_format, settings);
        Self {
            scene,
            depth,
            bloom,
        }
    }

    fn targets(device: &wgpu::Device, width: u32, height: u32) -> (Texture, Texture) {
        let scene = Texture::create_render_target(device, [width, height], Self::SCENE_FORMAT, "scene_target");
        let depth = Texture::create_depth_texture(device, [width, height], "depth_texture");
        (scene, depth)
    }

    pub fn size(&self) -> (u32, u32) {
        self.scene.size()
    }

    /// Re-create every size dependent target. Zero sizes are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == self.size() {
            return;
        }
        let (scene, depth) = Self::targets(device, width, height);
        self.scene = scene;
        self.depth = depth;
        self.bloom.resize(device, &self.scene);
    }

    pub fn configure_bloom(&mut self, device: &wgpu::Device, settings: BloomSettings) {
        self.bloom.configure(device, settings);
    }

    /// Record a full frame: `draw` fills the scene pass, bloom composites it into `output`.
    pub fn render<F>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        clear_colour: wgpu::Color,
        draw: F,
    ) where
        F: FnOnce(&mut wgpu::RenderPass<'_>),
    {
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.scene.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            draw(&mut render_pass);
        }
        self.bloom.render(encoder, output);
    }
}
