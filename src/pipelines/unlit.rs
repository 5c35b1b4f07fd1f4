//! Unlit, textured material. Used for the video plane.

use crate::{
    data_structures::{mesh::MeshVertex, texture::Texture},
    pipelines::basic::{REPLACE, mk_render_pipeline},
};

pub fn mk_unlit_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    object_bind_group_layout: &wgpu::BindGroupLayout,
    colour_map_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Unlit Pipeline Layout"),
        bind_group_layouts: &[
            camera_bind_group_layout,
            object_bind_group_layout,
            colour_map_layout,
        ],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Unlit Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("unlit.wgsl").into()),
    };
    mk_render_pipeline(
        device,
        &layout,
        format,
        Some(REPLACE),
        Some(Texture::DEPTH_FORMAT),
        &[MeshVertex::desc()],
        shader,
    )
}
