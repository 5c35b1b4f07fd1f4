//! Video playback sources and the texture their frames land in.
//!
//! A [`VideoSource`] owns a playback clock and knows how to put its current
//! frame into a GPU texture. Natively the frames come from an animated GIF
//! decoded up front ([`FrameSequence`]); in the browser the page's `<video>`
//! element is sampled directly ([`DomVideo`]).

use std::io::Cursor;

use anyhow::{Context as _, bail};
use image::{AnimationDecoder, ImageFormat, RgbaImage, codecs::gif::GifDecoder};
use instant::Duration;

use crate::{
    data_structures::texture::{Texture, colour_map_bind_group},
    resources::load_binary,
};

/// GIFs routinely store a zero delay; browsers play those at 10 fps.
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

pub trait VideoSource {
    /// Start (or resume) playback.
    fn play(&mut self);

    /// Move the playback clock forward. Sources with their own clock ignore this.
    fn advance(&mut self, dt: Duration);

    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    /// Length of the video in seconds. May be NaN or zero while nothing is loaded.
    fn duration(&self) -> f64;

    /// Size of a frame, `None` until the first frame is known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Copy the current frame into `texture`.
    ///
    /// Returns whether anything was written. Unless `force` is set, a frame that
    /// was already uploaded is skipped.
    fn write_frame(&mut self, queue: &wgpu::Queue, texture: &Texture, force: bool) -> bool;
}

/// Fraction of a video played at `current_time`.
///
/// `0.0` unless both values are finite and the duration is positive.
pub fn playback_progress(current_time: f64, duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 && current_time.is_finite() {
        current_time / duration
    } else {
        0.0
    }
}

/// A decoded clip played on an internal looping clock.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<RgbaImage>,
    /// End time (seconds) of each frame.
    ends: Vec<f64>,
    clock: f64,
    playing: bool,
    uploaded: Option<usize>,
}

impl FrameSequence {
    pub fn new(frames: Vec<(RgbaImage, Duration)>) -> anyhow::Result<Self> {
        let Some((first, _)) = frames.first() else {
            bail!("a video needs at least one frame");
        };
        let dimensions = first.dimensions();
        if frames.iter().any(|(frame, _)| frame.dimensions() != dimensions) {
            bail!("all frames of a video must share the same size");
        }

        let mut end = 0.0;
        let mut ends = Vec::with_capacity(frames.len());
        let mut images = Vec::with_capacity(frames.len());
        for (frame, delay) in frames {
            let delay = if delay.is_zero() { DEFAULT_FRAME_DELAY } else { delay };
            end += delay.as_secs_f64();
            ends.push(end);
            images.push(frame);
        }

        Ok(Self {
            frames: images,
            ends,
            clock: 0.0,
            playing: false,
            uploaded: None,
        })
    }

    /// A single image that never changes. Its duration is zero.
    pub fn still(image: RgbaImage) -> Self {
        Self {
            frames: vec![image],
            ends: vec![0.0],
            clock: 0.0,
            playing: false,
            uploaded: None,
        }
    }

    /// One black pixel, used when no video could be loaded.
    pub fn blank() -> Self {
        Self::still(RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255])))
    }

    /// Decode an animated GIF, or any other supported image as a still.
    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        let format = image::guess_format(bytes)?;
        match format {
            ImageFormat::Gif => {
                let decoder = GifDecoder::new(Cursor::new(bytes))?;
                let frames = decoder
                    .into_frames()
                    .collect_frames()?
                    .into_iter()
                    .map(|frame| {
                        let (numer, denom) = frame.delay().numer_denom_ms();
                        let millis = numer as f64 / denom.max(1) as f64;
                        (frame.into_buffer(), Duration::from_secs_f64(millis / 1000.0))
                    })
                    .collect();
                Self::new(frames)
            }
            _ => Ok(Self::still(
                image::load_from_memory_with_format(bytes, format)?.to_rgba8(),
            )),
        }
    }

    pub async fn load(file_name: &str) -> anyhow::Result<Self> {
        let bytes = load_binary(file_name)
            .await
            .with_context(|| format!("video {file_name} could not be read"))?;
        Self::decode(&bytes).with_context(|| format!("video {file_name} could not be decoded"))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Index of the frame shown at `time` seconds.
    pub fn frame_index_at(&self, time: f64) -> usize {
        self.ends
            .partition_point(|&end| end <= time)
            .min(self.frames.len() - 1)
    }
}

impl VideoSource for FrameSequence {
    fn play(&mut self) {
        self.playing = true;
    }

    fn advance(&mut self, dt: Duration) {
        let duration = self.duration();
        if self.playing && duration > 0.0 {
            self.clock = (self.clock + dt.as_secs_f64()) % duration;
        }
    }

    fn current_time(&self) -> f64 {
        self.clock
    }

    fn duration(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(RgbaImage::dimensions)
    }

    fn write_frame(&mut self, queue: &wgpu::Queue, texture: &Texture, force: bool) -> bool {
        let index = self.frame_index_at(self.clock);
        if !force && self.uploaded == Some(index) {
            return false;
        }
        let frame = &self.frames[index];
        texture.write_rgba(queue, frame.as_raw(), frame.width(), frame.height());
        self.uploaded = Some(index);
        true
    }
}

/// The page's `<video>` element. Playback is driven by the browser.
#[cfg(target_arch = "wasm32")]
pub struct DomVideo {
    element: web_sys::HtmlVideoElement,
    uploaded_at: Option<f64>,
}

#[cfg(target_arch = "wasm32")]
impl DomVideo {
    /// `HTMLMediaElement.HAVE_CURRENT_DATA`
    const HAVE_CURRENT_DATA: u16 = 2;

    pub fn from_element_id(id: &str) -> anyhow::Result<Self> {
        use wasm_bindgen::JsCast;

        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| anyhow::anyhow!("no document to look up #{id} in"))?;
        let element = document
            .get_element_by_id(id)
            .ok_or_else(|| anyhow::anyhow!("no element with id {id}"))?
            .dyn_into::<web_sys::HtmlVideoElement>()
            .map_err(|_| anyhow::anyhow!("#{id} is not a <video> element"))?;
        Ok(Self {
            element,
            uploaded_at: None,
        })
    }
}

#[cfg(target_arch = "wasm32")]
impl VideoSource for DomVideo {
    fn play(&mut self) {
        // Autoplay policies may reject this; the element's own autoplay attribute still applies
        match self.element.play() {
            Ok(started) => wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = wasm_bindgen_futures::JsFuture::from(started).await {
                    log::warn!("Video playback was rejected: {:?}", e);
                }
            }),
            Err(e) => log::warn!("Video playback could not be started: {:?}", e),
        }
    }

    fn advance(&mut self, _: Duration) {}

    fn current_time(&self) -> f64 {
        self.element.current_time()
    }

    fn duration(&self) -> f64 {
        self.element.duration()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        let (width, height) = (self.element.video_width(), self.element.video_height());
        (width > 0 && height > 0).then_some((width, height))
    }

    fn write_frame(&mut self, queue: &wgpu::Queue, texture: &Texture, force: bool) -> bool {
        if self.element.ready_state() < Self::HAVE_CURRENT_DATA {
            return false;
        }
        let time = self.element.current_time();
        if !force && self.uploaded_at == Some(time) {
            return false;
        }
        let (width, height) = texture.size();
        queue.copy_external_image_to_texture(
            &wgpu::CopyExternalImageSourceInfo {
                source: wgpu::ExternalImageSource::HTMLVideoElement(self.element.clone()),
                origin: wgpu::Origin2d::ZERO,
                flip_y: false,
            },
            wgpu::CopyExternalImageDestInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
                color_space: wgpu::PredefinedColorSpace::Srgb,
                premultiplied_alpha: false,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.uploaded_at = Some(time);
        true
    }
}

/// The colour map of the video plane.
///
/// Starts as a black pixel and is re-created whenever the source reports a new
/// frame size (e.g. once the browser has read the video's metadata).
#[derive(Debug)]
pub struct VideoTexture {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

impl VideoTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let texture = Texture::create_placeholder(device, queue, [0, 0, 0, 255], "video placeholder");
        let bind_group = colour_map_bind_group(device, layout, &texture, "video_bind_group");
        Self {
            texture,
            bind_group,
        }
    }

    /// Pull the current frame from `source`. Returns whether the texture changed.
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        source: &mut dyn VideoSource,
    ) -> bool {
        let Some((width, height)) = source.dimensions() else {
            return false;
        };
        let resized = (width, height) != self.texture.size();
        if resized {
            log::info!("Video frames are {width}x{height}");
            self.texture = Texture::create_video_texture(device, width, height, "video frame");
            self.bind_group = colour_map_bind_group(device, layout, &self.texture, "video_bind_group");
        }
        source.write_frame(queue, &self.texture, resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(shade: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 2, image::Rgba([shade, shade, shade, 255]))
    }

    fn clip() -> FrameSequence {
        FrameSequence::new(vec![
            (frame(0), Duration::from_millis(500)),
            (frame(1), Duration::from_millis(250)),
            (frame(2), Duration::from_millis(250)),
        ])
        .unwrap()
    }

    #[test]
    fn duration_is_sum_of_delays() {
        let clip = clip();
        assert_eq!(clip.frame_count(), 3);
        assert!((clip.duration() - 1.0).abs() < 1e-9);
        assert_eq!(clip.dimensions(), Some((4, 2)));
    }

    #[test]
    fn frame_lookup_follows_delays() {
        let clip = clip();
        assert_eq!(clip.frame_index_at(0.0), 0);
        assert_eq!(clip.frame_index_at(0.49), 0);
        assert_eq!(clip.frame_index_at(0.5), 1);
        assert_eq!(clip.frame_index_at(0.8), 2);
        assert_eq!(clip.frame_index_at(5.0), 2);
    }

    #[test]
    fn clock_only_runs_while_playing_and_loops() {
        let mut clip = clip();
        clip.advance(Duration::from_millis(300));
        assert_eq!(clip.current_time(), 0.0);

        clip.play();
        assert!(clip.is_playing());
        clip.advance(Duration::from_millis(600));
        assert!((clip.current_time() - 0.6).abs() < 1e-9);
        clip.advance(Duration::from_millis(600));
        assert!((clip.current_time() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn zero_delays_fall_back_to_default() {
        let clip = FrameSequence::new(vec![(frame(0), Duration::ZERO), (frame(1), Duration::ZERO)]).unwrap();
        assert!((clip.duration() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn still_image_never_advances() {
        let mut still = FrameSequence::blank();
        still.play();
        still.advance(Duration::from_secs(3));
        assert_eq!(still.current_time(), 0.0);
        assert_eq!(still.duration(), 0.0);
        assert_eq!(playback_progress(still.current_time(), still.duration()), 0.0);
        assert_eq!(still.dimensions(), Some((1, 1)));
    }

    #[test]
    fn empty_or_mismatched_frames_are_rejected() {
        assert!(FrameSequence::new(Vec::new()).is_err());
        let mismatched = vec![
            (frame(0), Duration::from_millis(40)),
            (RgbaImage::new(2, 2), Duration::from_millis(40)),
        ];
        assert!(FrameSequence::new(mismatched).is_err());
    }

    #[test]
    fn progress_guards_unknown_duration() {
        assert!((playback_progress(5.0, 10.0) - 0.5).abs() < 1e-12);
        assert_eq!(playback_progress(5.0, f64::NAN), 0.0);
        assert_eq!(playback_progress(5.0, f64::INFINITY), 0.0);
        assert_eq!(playback_progress(5.0, 0.0), 0.0);
        assert_eq!(playback_progress(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn shipped_clip_decodes() {
        let clip = FrameSequence::decode(include_bytes!("../../assets/video.gif")).unwrap();
        assert_eq!(clip.frame_count(), 12);
        assert_eq!(clip.dimensions(), Some((64, 36)));
        assert!((clip.duration() - 0.96).abs() < 1e-9);
    }

    #[test]
    fn decodes_a_still_png() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(frame(9))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let clip = FrameSequence::decode(&bytes).unwrap();
        assert_eq!(clip.frame_count(), 1);
        assert_eq!(clip.dimensions(), Some((4, 2)));
    }

    #[test]
    fn decodes_an_animated_gif() {
        use image::{Delay, Frame, codecs::gif::GifEncoder};

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frames = (0..3u8).map(|i| {
                Frame::from_parts(frame(i * 80), 0, 0, Delay::from_numer_denom_ms(200, 1))
            });
            encoder.encode_frames(frames).unwrap();
        }
        let clip = FrameSequence::decode(&bytes).unwrap();
        assert_eq!(clip.frame_count(), 3);
        assert!((clip.duration() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn garbage_is_not_a_video() {
        assert!(FrameSequence::decode(b"definitely not a video").is_err());
    }
}
