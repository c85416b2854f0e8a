//! Egui integration layer.
//!
//! Owns the egui context, the winit input state and the wgpu renderer, and
//! runs one UI pass per frame into an existing render pass.

use egui::{ClippedPrimitive, Context, FullOutput, ViewportId};
use winit::window::Window;

/// Egui integration for wgpu and winit.
pub struct EguiIntegration {
    /// The egui context.
    context: Context,
    /// Egui-winit state for event handling.
    state: egui_winit::State,
    /// Egui-wgpu renderer.
    renderer: egui_wgpu::Renderer,
}

impl std::fmt::Debug for EguiIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EguiIntegration")
            .field("pixels_per_point", &self.context.pixels_per_point())
            .finish_non_exhaustive()
    }
}

/// Tessellated UI ready for a render pass.
pub struct PreparedUi {
    /// Paint jobs for [`EguiIntegration::render`].
    pub paint_jobs: Vec<ClippedPrimitive>,
    /// Screen size and scale the jobs were built for.
    pub screen: egui_wgpu::ScreenDescriptor,
}

impl std::fmt::Debug for PreparedUi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedUi")
            .field("paint_jobs", &self.paint_jobs)
            .finish_non_exhaustive()
    }
}

impl EguiIntegration {
    /// Create a new egui integration.
    #[must_use]
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, window: &Window) -> Self {
        let context = Context::default();
        context.set_pixels_per_point(window.scale_factor() as f32);

        let state = egui_winit::State::new(
            context.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let renderer = egui_wgpu::Renderer::new(device, output_format, None, 1, false);

        Self {
            context,
            state,
            renderer,
        }
    }

    /// Handle a winit window event.
    ///
    /// Returns `true` if egui consumed the event.
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Runs `ui` for one frame and returns egui's output.
    pub fn run(&mut self, window: &Window, ui: impl FnMut(&Context)) -> FullOutput {
        let raw_input = self.state.take_egui_input(window);
        let output = self.context.run(raw_input, ui);
        self.state
            .handle_platform_output(window, output.platform_output.clone());
        output
    }

    /// Uploads textures and buffers for `output`.
    ///
    /// Call before beginning the render pass that [`Self::render`] draws into.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        size_in_pixels: [u32; 2],
        output: FullOutput,
    ) -> PreparedUi {
        for (id, image_delta) in &output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let paint_jobs = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);
        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: output.pixels_per_point,
        };

        self.renderer
            .update_buffers(device, queue, encoder, &paint_jobs, &screen);

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        PreparedUi { paint_jobs, screen }
    }

    /// Render egui to an existing render pass.
    ///
    /// The pass must be `'static`; use `RenderPass::forget_lifetime` and do not
    /// touch the encoder until the pass is dropped.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'static>, prepared: &PreparedUi) {
        self.renderer
            .render(render_pass, &prepared.paint_jobs, &prepared.screen);
    }

    /// Set pixels per point (scale factor).
    pub fn set_pixels_per_point(&mut self, pixels_per_point: f32) {
        self.context.set_pixels_per_point(pixels_per_point);
    }
}
