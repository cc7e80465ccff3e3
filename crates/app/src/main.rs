//! vkframe - textured quad demo for the frame orchestration engine.
//!
//! Usage: `vkframe [config.toml]`. Without an argument `vkframe.toml` is read
//! from the working directory if present, otherwise defaults are used.

mod quad;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use vkframe_core::Config;
use vkframe_platform::Window;
use vkframe_renderer::{FrameStatus, GpuContext, Renderer};
use vkframe_rhi::RhiError;
use vkframe_rhi::pipeline::PipelineDesc;
use vkframe_rhi::vertex::Vertex;

use crate::quad::Quad;

/// GPU objects that live as long as the window.
struct GpuState {
    // Drop order: the renderer drains the GPU before anything else goes.
    renderer: Renderer,
    quad: Quad,
    _context: GpuContext,
}

impl GpuState {
    fn new(window: &Window, config: &Config) -> Result<Self> {
        let context = GpuContext::new(window, &config.renderer)
            .context("Failed to create GPU context")?;
        let quad = Quad::new(context.device().clone(), context.transfer())
            .context("Failed to upload quad resources")?;

        let desc = PipelineDesc::new(
            read_shader(&config.shaders.vertex)?,
            read_shader(&config.shaders.fragment)?,
        )
        .vertex_input(
            vec![Vertex::binding_description()],
            Vertex::attribute_descriptions().to_vec(),
        )
        .set_layouts(vec![quad.descriptor_layout()]);

        let renderer = Renderer::new(&context, window, desc, config.renderer.clear_color)
            .context("Failed to create renderer")?;

        Ok(Self {
            renderer,
            quad,
            _context: context,
        })
    }
}

fn read_shader(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read shader {}", path.display()))
}

/// How a fatal error is reported when the app gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    /// No usable Vulkan, device or surface; retrying cannot help.
    Setup,
    Runtime,
}

fn failure_kind(err: &anyhow::Error) -> FailureKind {
    let setup = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<RhiError>())
        .any(RhiError::is_fatal_setup);
    if setup {
        FailureKind::Setup
    } else {
        FailureKind::Runtime
    }
}

/// A window together with the GPU state built on its surface.
///
/// The GPU state is declared first so it is dropped before the window.
struct Session<G = GpuState, W = Window> {
    gpu: Option<G>,
    window: W,
}

impl<G, W> Session<G, W> {
    fn new(gpu: G, window: W) -> Self {
        Self {
            gpu: Some(gpu),
            window,
        }
    }
}

struct App {
    config: Config,
    session: Option<Session>,
    failed: bool,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            session: None,
            failed: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        match failure_kind(&err) {
            FailureKind::Setup => error!("Fatal setup error: {:#}", err),
            FailureKind::Runtime => error!("{:#}", err),
        }
        self.failed = true;
        if let Some(session) = self.session.as_mut() {
            session.gpu = None;
        }
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        let Some(gpu) = self.session.as_mut().and_then(|session| session.gpu.take()) else {
            return;
        };
        if let Err(e) = gpu.renderer.shutdown() {
            error!("Failed to drain frames on shutdown: {}", e);
        }
        let timer = gpu.quad.timer();
        info!(
            "Rendered {} frame(s), {:.1} fps average, {} swapchain recreation(s)",
            timer.frame_count(),
            timer.average_fps(),
            gpu.renderer.recreations()
        );
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(Session {
            gpu: Some(gpu),
            window,
        }) = self.session.as_mut()
        else {
            return Ok(());
        };

        gpu.quad.set_extent(gpu.renderer.extent());
        match gpu.renderer.draw_frame(window, &mut gpu.quad)? {
            FrameStatus::Presented => {}
            FrameStatus::SwapchainRecreated => {
                let extent = gpu.renderer.extent();
                debug!("Swapchain now {}x{}", extent.width, extent.height);
            }
            FrameStatus::Deferred => debug!("Frame deferred until the window has an area"),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }

        let window = match Window::new(event_loop, &self.config.window) {
            Ok(window) => window,
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        match GpuState::new(&window, &self.config) {
            Ok(gpu) => {
                info!("Initialization complete, entering main loop");
                self.session = Some(Session::new(gpu, window));
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(session) = self.session.as_mut() {
                    session.window.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("Frame failed"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        // A minimized window sleeps until the next event instead of spinning.
        if session.window.is_minimized() {
            event_loop.set_control_flow(ControlFlow::Wait);
        } else {
            event_loop.set_control_flow(ControlFlow::Poll);
            session.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    vkframe_core::init_logging();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load_or_default(config_path.as_deref())?;
    info!(
        "Starting vkframe: {}x{} \"{}\"",
        config.window.width, config.window.height, config.window.title
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    if app.failed {
        bail!("vkframe exited after a fatal error");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct Dropped(&'static str, Rc<RefCell<Vec<&'static str>>>);

    impl Drop for Dropped {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn test_session_drops_gpu_before_window() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let session = Session::new(
            Dropped("gpu", order.clone()),
            Dropped("window", order.clone()),
        );
        drop(session);
        assert_eq!(*order.borrow(), vec!["gpu", "window"]);
    }

    #[test]
    fn test_failure_kind_finds_setup_error_in_chain() {
        let err = anyhow::Error::new(RhiError::NoSuitableDevice).context("Failed to create GPU context");
        assert_eq!(failure_kind(&err), FailureKind::Setup);

        let err = anyhow::Error::new(RhiError::InvalidResource("empty".into())).context("Frame failed");
        assert_eq!(failure_kind(&err), FailureKind::Runtime);

        let err = anyhow::anyhow!("Failed to read shader");
        assert_eq!(failure_kind(&err), FailureKind::Runtime);
    }
}
