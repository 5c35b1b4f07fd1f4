//! Flow control and application event loop.
//!
//! A "flow" is a self-contained part of the application that reacts to window
//! events, updates its state and describes what it wants rendered every
//! frame. The event loop owns the GPU [`Context`] and drives all flows.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S>`] is the trait for scenes that handle events and rendering
//! - [`Out`] is the output type for context configuration
//!
//! # Lifecycle
//!
//! Every redraw runs, in this order:
//! 1. resize the surface if the window's size differs from the configured one
//! 2. `on_update` on every flow
//! 3. upload the camera
//! 4. render all flows' `on_render` through the composer into the surface
//! 5. present and request the next redraw

use std::{fmt::Debug, iter, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext, needs_resize},
    render::{self, Render},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

///
/// This is the Output Type for every lifecycle hook.
///
/// `Out::Configure` can be used to modify the Context during runtime, for instance to change the
/// camera, the clear colour or the bloom parameters. It runs right after the hook returned.
///
/// `Empty` is the default output used when nothing needs to be handled.
///
pub enum Out {
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

/// Trait for implementing a renderable scene.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; configure the context (camera, clear colour, effects)
/// 2. `on_window_events()` is called for each winit window event
/// 3. `on_update()` is called every frame before rendering
/// 4. `on_render()` is called each frame and specifies how to render `self`
///
pub trait GraphicsFlow<S> {
    /// Initialize the flow and configure the context.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S) -> Out;

    /// Update state every frame.
    ///
    /// `dt` is the time since the previous frame.
    fn on_update(&mut self, ctx: &Context, state: &mut S, dt: Duration) -> Out;

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, ctx: &Context, state: &mut S, event: &WindowEvent) -> Out;

    /// Return renderable objects for this flow.
    fn on_render(&self) -> Render<'_>;
}

impl<State> Debug for dyn GraphicsFlow<State> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor.
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`. This allows resources to be loaded before the first frame.
pub type FlowConstructor<S> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S>>>>>>;

/// Application state bundle: GPU context, app state, and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    is_surface_configured: bool,
}

impl<State: 'static + Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let ctx = Context::new(window).await?;
        Ok(Self {
            ctx,
            state: State::default(),
            is_surface_configured: false,
        })
    }
}

impl<State: 'static> AppState<State> {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            self.is_surface_configured = true;
        }
    }

    /// Resize to the window if it changed since the surface was configured.
    fn follow_window_size(&mut self) {
        let size = self.ctx.window.inner_size();
        if !self.is_surface_configured || needs_resize(self.ctx.surface_size(), (size.width, size.height)) {
            self.resize(size.width, size.height);
        }
    }

    fn render(&mut self, graphics_flows: &[Box<dyn GraphicsFlow<State>>]) -> Result<(), wgpu::SurfaceError> {
        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let ctx = &self.ctx;
        ctx.composer
            .render(&mut encoder, &view, ctx.clear_colour, |render_pass| {
                let renders: Vec<Render> = graphics_flows.iter().map(|flow| flow.on_render()).collect();
                render::draw(renders.into(), &ctx.pipelines, &ctx.camera.bind_group, render_pass);
            });

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

pub struct App<State: 'static> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    // Carries the finished initialization back from `spawn_local`.
    #[cfg(target_arch = "wasm32")]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent<State>>,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State>>>,
    // This holds the constructors at the start.
    // We use Option to `take()` it after use.
    constructors: Option<Vec<FlowConstructor<State>>>,
    last_time: Instant,
}

impl<State: 'static> App<State> {
    fn new(
        #[allow(unused_variables)] event_loop: &EventLoop<FlowEvent<State>>,
        constructors: Vec<FlowConstructor<State>>,
    ) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            #[cfg(target_arch = "wasm32")]
            proxy: event_loop.create_proxy(),
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
        })
    }

    fn initialize(&mut self, mut app_state: AppState<State>, flows: Vec<Box<dyn GraphicsFlow<State>>>) {
        self.graphics_flows = flows;
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        self.graphics_flows.iter_mut().for_each(|flow| {
            let out = flow.on_init(&mut app_state.ctx, &mut app_state.state);
            handle_flow_output(&mut app_state.ctx, out);
        });
        log::info!("{} flow(s) initialized", self.graphics_flows.len());
        app_state.ctx.window.request_redraw();
        self.last_time = Instant::now();
        self.state = Some(app_state);
    }
}

pub(crate) enum FlowEvent<State: 'static> {
    #[allow(dead_code)]
    Initialized {
        state: AppState<State>,
        flows: Vec<Box<dyn GraphicsFlow<State>>>,
    },
    #[allow(dead_code)]
    Failed(anyhow::Error),
}

impl<State> Debug for FlowEvent<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized { state: _, flows } => {
                f.debug_struct("Initialized").field("flows", flows).finish()
            }
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

impl<State: 'static + Default> ApplicationHandler<FlowEvent<State>> for App<State> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // Resumed is sent again on some platforms; the context only gets built once
        let Some(constructors) = self.constructors.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("video orb");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Cannot create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::new(window).await?;

            let flow_futures: Vec<_> = constructors
                .into_iter()
                // The clone in into() leverages the internal Arcs of Device and Queue and thus only clones the ref
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok((app_state, flows)) => self.initialize(app_state, flows),
                Err(e) => {
                    log::error!("App initialization failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok((state, flows)) => FlowEvent::Initialized { state, flows },
                    Err(e) => FlowEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("The event loop closed before the app was initialized");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent<State>) {
        match event {
            FlowEvent::Initialized { state, flows } => {
                // This is the message from our wasm `spawn_local`
                self.initialize(state, flows);
            }
            FlowEvent::Failed(e) => {
                log::error!("App initialization failed: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        self.graphics_flows.iter_mut().for_each(|f| {
            let out = f.on_window_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(&mut state.ctx, out);
        });

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                state.follow_window_size();

                self.graphics_flows.iter_mut().for_each(|f| {
                    let out = f.on_update(&state.ctx, &mut state.state, dt);
                    handle_flow_output(&mut state.ctx, out);
                });

                // Update the camera
                let ctx = &mut state.ctx;
                ctx.camera.write(&ctx.queue, &ctx.projection);

                match state.render(&self.graphics_flows) {
                    Ok(_) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Unable to render {}", e);
                    }
                }

                // invoke main render loop
                state.ctx.window.request_redraw();
            }
            _ => {}
        }
    }
}

fn handle_flow_output(ctx: &mut Context, out: Out) {
    match out {
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

pub fn run<State: 'static + Default>(constructors: Vec<FlowConstructor<State>>) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<FlowEvent<State>> = EventLoop::with_user_event().build()?;

    let mut app: App<State> = App::new(&event_loop, constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
