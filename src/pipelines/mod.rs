//! Render pipelines.
//!
//! - `basic`: shared pipeline builders
//! - `shader`: the animated sphere material
//! - `unlit`: textured material without lighting (video plane)
//! - `bloom`: the post-processing bloom chain

pub mod basic;
pub mod bloom;
pub mod shader;
pub mod unlit;

use crate::data_structures::{texture::colour_map_layout, transform::object_bind_group_layout};

/// The scene pipelines and the layouts objects need to bind against them.
#[derive(Debug)]
pub struct Pipelines {
    pub shaded: wgpu::RenderPipeline,
    pub textured: wgpu::RenderPipeline,
    pub object_layout: wgpu::BindGroupLayout,
    pub colour_map_layout: wgpu::BindGroupLayout,
}

impl Pipelines {
    /// `format` is the format of the target the scene is drawn into.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        camera_bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let object_layout = object_bind_group_layout(device);
        let colour_map_layout = colour_map_layout(device);
        let shaded = shader::mk_shader_pipeline(device, format, camera_bind_group_layout, &object_layout);
        let textured = unlit::mk_unlit_pipeline(
            device,
            format,
            camera_bind_group_layout,
            &object_layout,
            &colour_map_layout,
        );
        Self {
            shaded,
            textured,
            object_layout,
            colour_map_layout,
        }
    }
}
