use video_orb::{
    camera::{Camera, CameraResources, Projection},
    composer::Composer,
    config::SceneConfig,
    context::InitContext,
    pipelines::{Pipelines, bloom::BloomSettings},
    render::{self, Render},
};

/// Format of the texture frames are read back from.
pub(crate) const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Everything a window would normally provide, without the window.
pub(crate) struct Harness {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) pipelines: Pipelines,
    pub(crate) camera: CameraResources,
    pub(crate) composer: Composer,
    pub(crate) clear_colour: wgpu::Color,
    pub(crate) size: u32,
}

impl Harness {
    /// `size` must be a multiple of 64 so rows of the readback stay 256 byte aligned.
    pub(crate) fn new(size: u32, config: &SceneConfig) -> Self {
        futures::executor::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::default(),
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .expect("No adapter for headless rendering");
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor::default())
                .await
                .expect("No device for headless rendering");

            let projection = Projection::from_config(size, size, &config.camera);
            let camera = CameraResources::new(&device, Camera::from(&config.camera), &projection);
            let pipelines = Pipelines::new(&device, Composer::SCENE_FORMAT, &camera.bind_group_layout);
            let composer = Composer::new(
                &device,
                size,
                size,
                OUTPUT_FORMAT,
                BloomSettings::from(&config.bloom),
            );
            Self {
                device,
                queue,
                pipelines,
                camera,
                composer,
                clear_colour: config.camera.background(),
                size,
            }
        })
    }

    pub(crate) fn init_context(&self) -> InitContext {
        InitContext::new(&self.device, &self.queue, &self.pipelines)
    }

    /// Follow a viewport of `size` x `size`, the way a window resize does.
    pub(crate) fn resize(&mut self, size: u32) {
        self.composer.resize(&self.device, size, size);
        self.size = size;
    }

    /// Render one frame and read it back.
    pub(crate) fn render(&self, frame: Render<'_>) -> image::RgbaImage {
        let extent = wgpu::Extent3d {
            width: self.size,
            height: self.size,
            depth_or_array_layers: 1,
        };
        let target = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Output Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let u32_size = std::mem::size_of::<u32>() as u32;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            size: (u32_size * self.size * self.size) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            label: None,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Test Encoder"),
            });
        self.composer
            .render(&mut encoder, &view, self.clear_colour, |render_pass| {
                render::draw(frame, &self.pipelines, &self.camera.bind_group, render_pass);
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(u32_size * self.size),
                    rows_per_image: Some(self.size),
                },
            },
            extent,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        futures::executor::block_on(async {
            let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
            let buffer_slice = output_buffer.slice(..);
            buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
                tx.send(result).unwrap();
            });
            self.device.poll(wgpu::PollType::Wait).unwrap();
            rx.receive().await.unwrap().unwrap();
            let data = buffer_slice.get_mapped_range().to_vec();
            image::RgbaImage::from_raw(self.size, self.size, data).unwrap()
        })
    }
}

/// Sum of all colour channels, a crude measure of how bright a frame is.
pub(crate) fn brightness(img: &image::RgbaImage) -> u64 {
    img.pixels()
        .map(|p| p[0] as u64 + p[1] as u64 + p[2] as u64)
        .sum()
}

/// Scene defaults with bloom switched off, so colours reach the output untouched.
pub(crate) fn without_bloom() -> SceneConfig {
    let mut config = SceneConfig::default();
    config.bloom.enabled = false;
    config
}
