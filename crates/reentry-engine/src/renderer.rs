//! GPU renderer using wgpu.
//!
//! The atmosphere color is the clear color; everything else is egui shapes
//! drawn in a single pass on top.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, trace, warn};
use winit::{dpi::PhysicalSize, window::Window};

use reentry_kernel::Rgb;

use crate::egui_integration::EguiIntegration;

/// Main renderer that manages GPU resources and rendering.
pub struct Renderer {
    /// wgpu surface for presenting to the window
    surface: wgpu::Surface<'static>,
    /// wgpu device for GPU operations
    device: wgpu::Device,
    /// wgpu queue for submitting commands
    queue: wgpu::Queue,
    /// Surface configuration
    config: wgpu::SurfaceConfiguration,
    /// Current surface size
    size: PhysicalSize<u32>,
    /// UI layer
    egui: EguiIntegration,
    /// Frame counter
    frame_count: u64,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("size", &self.size)
            .field("format", &self.config.format)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a new renderer for the given window.
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find a suitable GPU adapter")?;

        info!("Using GPU adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Reentry Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("Surface reports no formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui = EguiIntegration::new(&device, surface_format, &window);

        info!("Renderer initialized ({surface_format:?})");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            egui,
            frame_count: 0,
        })
    }

    /// Resizes the renderer to match the new window size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Updates the UI scale after a DPI change.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.egui.set_pixels_per_point(scale_factor as f32);
    }

    /// Forwards a window event to egui. Returns true if egui consumed it.
    pub fn handle_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> bool {
        self.egui.handle_event(window, event)
    }

    /// Clears to `background` and draws `ui` on top.
    pub fn render_with_ui(
        &mut self,
        window: &Window,
        background: Rgb,
        ui: impl FnMut(&egui::Context),
    ) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                trace!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to get surface texture"),
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let full_output = self.egui.run(window, ui);
        let prepared = self.egui.prepare(
            &self.device,
            &self.queue,
            &mut encoder,
            [self.config.width, self.config.height],
            full_output,
        );

        let clear = clear_color(background, self.config.format.is_srgb());
        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.egui.render(&mut render_pass.forget_lifetime(), &prepared);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        window.pre_present_notify();
        output.present();

        self.frame_count += 1;
        Ok(())
    }

    /// Returns the current frame count.
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Converts an sRGB-encoded palette color to the clear color for the surface.
fn clear_color(color: Rgb, linear_target: bool) -> wgpu::Color {
    let channel = |c: f32| {
        let c = f64::from(c.clamp(0.0, 1.0));
        if !linear_target {
            c
        } else if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    wgpu::Color {
        r: channel(color.r),
        g: channel(color.g),
        b: channel(color.b),
        a: 1.0,
    }
}
