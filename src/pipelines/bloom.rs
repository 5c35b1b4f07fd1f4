//! Mipmap bloom.
//!
//! The chain runs entirely in screen space on fullscreen triangles:
//!
//! 1. luminance: bright parts of the scene into the first (half size) level
//! 2. downsample: 13-tap filter into each successively halved level
//! 3. upsample: tent filter back up, mixed with the level of the same size by `radius`
//! 4. composite: screen blend of the scene and `bloom * intensity` into the output view
//!
//! Every pass owns a small uniform buffer so the whole chain can be recorded
//! into one encoder without intermediate writes.

use wgpu::util::DeviceExt;

use crate::{
    config::BloomConfig,
    data_structures::texture::{Texture, create_clamp_sampler},
    pipelines::basic::mk_fullscreen_pipeline,
};

/// Per-pass uniforms shared by every bloom entry point.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BloomUniforms {
    /// 1.0 / source_width, 1.0 / source_height.
    pub texel_size: [f32; 2],
    pub threshold: f32,
    pub smoothing: f32,
    pub radius: f32,
    pub intensity: f32,
    pub _padding: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    pub intensity: f32,
    /// How much of the blurred lower level survives each upsample step.
    pub radius: f32,
    pub luminance_threshold: f32,
    pub luminance_smoothing: f32,
    pub mipmap_blur: bool,
    pub levels: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self::from(&BloomConfig::default())
    }
}

impl From<&BloomConfig> for BloomSettings {
    fn from(config: &BloomConfig) -> Self {
        Self {
            enabled: config.enabled,
            intensity: config.intensity,
            radius: config.radius,
            luminance_threshold: config.luminance_threshold,
            luminance_smoothing: config.luminance_smoothing,
            mipmap_blur: config.mipmap_blur,
            levels: config.levels.clamp(1, 16),
        }
    }
}

impl BloomSettings {
    /// Number of mip levels the chain should use. Without mipmap blur only the
    /// luminance level exists.
    pub fn level_count(&self) -> u32 {
        if self.mipmap_blur { self.levels.max(1) } else { 1 }
    }

    /// Bloom strength used by the composite pass. Zero when bloom is off.
    pub fn composite_intensity(&self) -> f32 {
        if self.enabled { self.intensity } else { 0.0 }
    }

    fn uniforms(&self, source: (u32, u32)) -> BloomUniforms {
        BloomUniforms {
            texel_size: [1.0 / source.0.max(1) as f32, 1.0 / source.1.max(1) as f32],
            threshold: self.luminance_threshold,
            smoothing: self.luminance_smoothing,
            radius: self.radius,
            intensity: self.composite_intensity(),
            _padding: [0.0; 2],
        }
    }
}

/// Sizes of the bloom levels for a `width` x `height` scene.
///
/// The first level is half the scene size, every further level halves again
/// until `levels` entries exist or a side would drop below one pixel.
pub fn mip_chain(width: u32, height: u32, levels: u32) -> Vec<(u32, u32)> {
    let mut size = ((width / 2).max(1), (height / 2).max(1));
    let mut chain = vec![size];
    while (chain.len() as u32) < levels && size.0 > 1 && size.1 > 1 {
        size = ((size.0 / 2).max(1), (size.1 / 2).max(1));
        chain.push(size);
    }
    chain
}

#[derive(Debug)]
struct Binding {
    #[allow(unused)]
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Luminance,
    Downsample,
    Upsample,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Down(usize),
    Up(usize),
}

#[derive(Debug)]
struct BloomPass {
    stage: Stage,
    target: Target,
    binding: Binding,
}

#[derive(Debug)]
pub struct BloomEffect {
    settings: BloomSettings,
    format: wgpu::TextureFormat,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    luminance: wgpu::RenderPipeline,
    downsample: wgpu::RenderPipeline,
    upsample: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
    scene: wgpu::TextureView,
    scene_size: (u32, u32),
    down: Vec<Texture>,
    up: Vec<Texture>,
    passes: Vec<BloomPass>,
    composite_binding: Binding,
}

impl BloomEffect {
    /// Build the pipelines and the level chain for `scene`.
    ///
    /// `format` is used for every intermediate level, `output_format` for the
    /// view handed to [`BloomEffect::render`].
    pub fn new(
        device: &wgpu::Device,
        scene: &Texture,
        format: wgpu::TextureFormat,
        output_format: wgpu::TextureFormat,
        settings: BloomSettings,
    ) -> Self {
        let layout = bloom_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bloom Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("bloom.wgsl").into()),
        });
        let luminance =
            mk_fullscreen_pipeline(device, &pipeline_layout, &shader, "fs_luminance", format, "Bloom Luminance");
        let downsample =
            mk_fullscreen_pipeline(device, &pipeline_layout, &shader, "fs_downsample", format, "Bloom Downsample");
        let upsample =
            mk_fullscreen_pipeline(device, &pipeline_layout, &shader, "fs_upsample", format, "Bloom Upsample");
        let composite = mk_fullscreen_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "fs_composite",
            output_format,
            "Bloom Composite",
        );
        let sampler = create_clamp_sampler(device);

        let scene_view = scene.view.clone();
        let composite_binding = mk_binding(
            device,
            &layout,
            &sampler,
            "bloom composite",
            &scene_view,
            &scene_view,
            settings.uniforms(scene.size()),
        );

        let mut effect = Self {
            settings,
            format,
            layout,
            sampler,
            luminance,
            downsample,
            upsample,
            composite,
            scene: scene_view,
            scene_size: scene.size(),
            down: Vec::new(),
            up: Vec::new(),
            passes: Vec::new(),
            composite_binding,
        };
        effect.rebuild(device);
        effect
    }

    pub fn settings(&self) -> &BloomSettings {
        &self.settings
    }

    /// Sizes of the levels currently allocated.
    pub fn levels(&self) -> Vec<(u32, u32)> {
        self.down.iter().map(Texture::size).collect()
    }

    /// Point the chain at a new scene target (after a resize).
    pub fn resize(&mut self, device: &wgpu::Device, scene: &Texture) {
        self.scene = scene.view.clone();
        self.scene_size = scene.size();
        self.rebuild(device);
    }

    pub fn configure(&mut self, device: &wgpu::Device, settings: BloomSettings) {
        self.settings = settings;
        self.rebuild(device);
    }

    fn rebuild(&mut self, device: &wgpu::Device) {
        let (width, height) = self.scene_size;
        let sizes = mip_chain(width, height, self.settings.level_count());
        let last = sizes.len() - 1;

        self.down = sizes
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| Texture::create_render_target(device, [w, h], self.format, &format!("bloom down {i}")))
            .collect();
        self.up = sizes[..last]
            .iter()
            .enumerate()
            .map(|(i, &(w, h))| Texture::create_render_target(device, [w, h], self.format, &format!("bloom up {i}")))
            .collect();

        let mut passes = Vec::with_capacity(2 * sizes.len());
        passes.push(BloomPass {
            stage: Stage::Luminance,
            target: Target::Down(0),
            binding: self.binding(device, "bloom luminance", &self.scene, &self.scene, self.scene_size),
        });
        for i in 1..sizes.len() {
            passes.push(BloomPass {
                stage: Stage::Downsample,
                target: Target::Down(i),
                binding: self.binding(
                    device,
                    &format!("bloom downsample {i}"),
                    &self.down[i - 1].view,
                    &self.down[i - 1].view,
                    sizes[i - 1],
                ),
            });
        }
        for i in (0..last).rev() {
            let source = if i + 1 == last { &self.down[last] } else { &self.up[i + 1] };
            passes.push(BloomPass {
                stage: Stage::Upsample,
                target: Target::Up(i),
                binding: self.binding(
                    device,
                    &format!("bloom upsample {i}"),
                    &source.view,
                    &self.down[i].view,
                    source.size(),
                ),
            });
        }
        self.passes = passes;

        let bloom = self.up.first().unwrap_or(&self.down[0]);
        self.composite_binding = self.binding(device, "bloom composite", &self.scene, &bloom.view, self.scene_size);
        log::debug!("Bloom chain rebuilt with {} level(s) for {width}x{height}", sizes.len());
    }

    fn binding(
        &self,
        device: &wgpu::Device,
        label: &str,
        source: &wgpu::TextureView,
        support: &wgpu::TextureView,
        source_size: (u32, u32),
    ) -> Binding {
        mk_binding(
            device,
            &self.layout,
            &self.sampler,
            label,
            source,
            support,
            self.settings.uniforms(source_size),
        )
    }

    /// Record the bloom chain and the composite into `output`.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        if self.settings.enabled {
            for pass in &self.passes {
                let (pipeline, label) = match pass.stage {
                    Stage::Luminance => (&self.luminance, "Bloom Luminance Pass"),
                    Stage::Downsample => (&self.downsample, "Bloom Downsample Pass"),
                    Stage::Upsample => (&self.upsample, "Bloom Upsample Pass"),
                };
                let target = match pass.target {
                    Target::Down(i) => &self.down[i].view,
                    Target::Up(i) => &self.up[i].view,
                };
                run_pass(encoder, label, pipeline, &pass.binding.bind_group, target);
            }
        }
        run_pass(
            encoder,
            "Bloom Composite Pass",
            &self.composite,
            &self.composite_binding.bind_group,
            output,
        );
    }
}

fn run_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

fn mk_binding(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    label: &str,
    source: &wgpu::TextureView,
    support: &wgpu::TextureView,
    uniforms: BloomUniforms,
) -> Binding {
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(&uniforms),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(source),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(support),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Binding { buffer, bind_group }
}

fn bloom_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("bloom_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(std::mem::size_of::<BloomUniforms>() as u64),
                },
                count: None,
            },
            texture(1),
            texture(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<BloomUniforms>(), 32);
    }

    #[test]
    fn default_settings_match_scene_defaults() {
        let s = BloomSettings::default();
        assert!(s.enabled);
        assert!(s.mipmap_blur);
        assert!((s.intensity - 2.0).abs() < f32::EPSILON);
        assert!((s.radius - 0.8).abs() < f32::EPSILON);
        assert!((s.luminance_threshold - 0.1).abs() < f32::EPSILON);
        assert!((s.luminance_smoothing - 0.89).abs() < f32::EPSILON);
    }

    #[test]
    fn chain_halves_from_half_resolution() {
        let chain = mip_chain(1920, 1080, 8);
        assert_eq!(chain.len(), 8);
        assert_eq!(chain[0], (960, 540));
        assert_eq!(chain[1], (480, 270));
        assert_eq!(chain[7], (7, 4));
    }

    #[test]
    fn chain_stops_at_one_pixel() {
        let chain = mip_chain(16, 4, 16);
        assert_eq!(chain, vec![(8, 2), (4, 1)]);
        assert_eq!(mip_chain(1, 1, 8), vec![(1, 1)]);
        assert_eq!(mip_chain(0, 0, 8), vec![(1, 1)]);
    }

    #[test]
    fn without_mipmap_blur_there_is_one_level() {
        let settings = BloomSettings {
            mipmap_blur: false,
            ..Default::default()
        };
        assert_eq!(settings.level_count(), 1);
        assert_eq!(mip_chain(1920, 1080, settings.level_count()).len(), 1);
    }

    #[test]
    fn levels_are_clamped_from_config() {
        let config = BloomConfig {
            levels: 99,
            ..Default::default()
        };
        assert_eq!(BloomSettings::from(&config).levels, 16);
        let config = BloomConfig {
            levels: 0,
            ..Default::default()
        };
        assert_eq!(BloomSettings::from(&config).level_count(), 1);
    }

    #[test]
    fn disabled_bloom_composites_nothing() {
        let settings = BloomSettings {
            enabled: false,
            ..Default::default()
        };
        assert_eq!(settings.composite_intensity(), 0.0);
        assert_eq!(settings.uniforms((4, 4)).intensity, 0.0);
    }

    #[test]
    fn uniforms_carry_source_texel_size() {
        let u = BloomSettings::default().uniforms((200, 100));
        assert_eq!(u.texel_size, [0.005, 0.01]);
        assert!((u.intensity - 2.0).abs() < f32::EPSILON);
    }
}
