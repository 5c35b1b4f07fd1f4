//! The sphere's custom material.
//!
//! Lit by nothing but the view direction: a fresnel rim over bands of colour
//! that drift with the object's `time` uniform.

use crate::{
    data_structures::{mesh::MeshVertex, texture::Texture},
    pipelines::basic::{REPLACE, mk_render_pipeline},
};

pub fn mk_shader_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
    object_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Sphere Pipeline Layout"),
        bind_group_layouts: &[camera_bind_group_layout, object_bind_group_layout],
        push_constant_ranges: &[],
    });
    let shader = wgpu::ShaderModuleDescriptor {
        label: Some("Sphere Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("sphere.wgsl").into()),
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
