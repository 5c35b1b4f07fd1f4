//! video-orb
//!
//! A shader-lit sphere hovering in front of a video wall, rendered with `wgpu`
//! through a bloom post-processing chain. The same crate runs natively in a
//! winit window and in the browser on a WebGL2 canvas.
//!
//! High-level modules
//! - `camera`: perspective camera, projection and their uniform
//! - `composer`: offscreen scene target followed by the bloom effect
//! - `config`: scene parameters and their optional TOML override
//! - `context`: central GPU and window context that owns device/queue/pipelines
//! - `data_structures`: meshes, transforms and textures
//! - `flow`: event loop and the flow (scene) abstraction
//! - `pipelines`: sphere, unlit and bloom pipelines
//! - `resources`: asset loading and video sources
//! - `render`: render composition for pipeline batching
//! - `scene`: the video orb scene itself
//!

pub mod camera;
pub mod composer;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;

use crate::{
    flow::{FlowConstructor, GraphicsFlow},
    scene::VideoOrb,
};

/// Open the window (or canvas) and play the scene until it is closed.
pub fn start() -> anyhow::Result<()> {
    let orb: FlowConstructor<()> = Box::new(|ctx| {
        Box::pin(async move { Box::new(VideoOrb::new(ctx).await) as Box<dyn GraphicsFlow<()>> })
    });
    flow::run(vec![orb])
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    start().map_err(|e| wasm_bindgen::JsValue::from_str(&format!("{e:#}")))
}
