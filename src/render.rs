//! Render composition and pipeline batching.
//!
//! Flows describe what they want drawn with a [`Render`]. The engine collects
//! the renders of all flows, sorts them into one batch per pipeline and
//! records each batch with a single pipeline switch.

use crate::{data_structures::mesh::Mesh, pipelines::Pipelines};

/// A mesh together with the bind group of its object uniform.
#[derive(Debug, Clone, Copy)]
pub struct Drawable<'a> {
    pub mesh: &'a Mesh,
    pub object: &'a wgpu::BindGroup,
}

/// A drawable with a colour map.
#[derive(Debug, Clone, Copy)]
pub struct Textured<'a> {
    pub drawable: Drawable<'a>,
    pub colour_map: &'a wgpu::BindGroup,
}

/// Specifies how a scene object should be rendered.
///
/// - `None` renders nothing
/// - `Shaded(Drawable)` renders with the animated sphere material
/// - `Textured(Textured)` renders unlit with a colour map
/// - `Composed(Vec<Render>)` renders all contained renders
pub enum Render<'a> {
    None,
    Shaded(Drawable<'a>),
    Textured(Textured<'a>),
    Composed(Vec<Render<'a>>),
}

impl<'a> Render<'a> {
    pub(crate) fn collect(self, shaded: &mut Vec<Drawable<'a>>, textured: &mut Vec<Textured<'a>>) {
        match self {
            Render::Shaded(drawable) => shaded.push(drawable),
            Render::Textured(t) => textured.push(t),
            Render::Composed(renders) => renders
                .into_iter()
                .for_each(|render| render.collect(shaded, textured)),
            Render::None => (),
        }
    }
}

impl<'a> From<Vec<Render<'a>>> for Render<'a> {
    fn from(renders: Vec<Render<'a>>) -> Self {
        Render::Composed(renders)
    }
}

/// Record `render` into `render_pass`: textured objects first, then shaded ones.
pub fn draw<'a>(
    render: Render<'a>,
    pipelines: &Pipelines,
    camera: &wgpu::BindGroup,
    render_pass: &mut wgpu::RenderPass<'_>,
) {
    let mut shaded = Vec::new();
    let mut textured = Vec::new();
    render.collect(&mut shaded, &mut textured);

    if !textured.is_empty() {
        render_pass.set_pipeline(&pipelines.textured);
        render_pass.set_bind_group(0, camera, &[]);
        for t in textured {
            render_pass.set_bind_group(2, t.colour_map, &[]);
            draw_mesh(render_pass, t.drawable);
        }
    }

    if !shaded.is_empty() {
        render_pass.set_pipeline(&pipelines.shaded);
        render_pass.set_bind_group(0, camera, &[]);
        for drawable in shaded {
            draw_mesh(render_pass, drawable);
        }
    }
}

fn draw_mesh(render_pass: &mut wgpu::RenderPass<'_>, drawable: Drawable<'_>) {
    if drawable.mesh.num_elements == 0 {
        log::warn!("Skipping mesh {} without indices", drawable.mesh.name);
        return;
    }
    render_pass.set_bind_group(1, drawable.object, &[]);
    render_pass.set_vertex_buffer(0, drawable.mesh.vertex_buffer.slice(..));
    render_pass.set_index_buffer(drawable.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    render_pass.draw_indexed(0..drawable.mesh.num_elements, 0, 0..1);
}
