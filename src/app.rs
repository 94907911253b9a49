use std::sync::Arc;

use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::Window;

use crate::controller::{ControllerError, RunConfig, RunController};
use crate::sampler::SAMPLE_BUDGET;
use crate::scene::Scene;
use crate::settings::Color;
use crate::ui::{self, UiState};

pub struct App {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    controller: RunController,
    scene: Arc<Scene>,
    scene_texture: egui::TextureHandle,
    scene_revision: u64,
    ui_state: UiState,
    modifiers: ModifiersState,
    egui_ctx: egui::Context,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    window: Arc<Window>,
}

impl App {
    /// Sets up the GPU surface and egui, then starts the first run.
    pub fn new(window: Arc<Window>, radius: u32) -> Result<Self, ControllerError> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("Failed to find a suitable GPU adapter");

        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("GPU Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("Failed to create device");

        // egui expects to blend in gamma space, so prefer a non-sRGB target.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_ctx = egui::Context::default();
        let egui_winit = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        let side = radius + 1;
        let scene = Arc::new(Scene::new(side, side));
        let scene_texture = egui_ctx.load_texture(
            "scene",
            egui::ColorImage::new([side as usize, side as usize], egui::Color32::TRANSPARENT),
            egui::TextureOptions::NEAREST,
        );

        let controller = RunController::new(
            RunConfig {
                radius,
                budget: SAMPLE_BUDGET,
                seed: None,
            },
            scene.clone(),
            scene.clone(),
        );
        controller.start()?;

        Ok(Self {
            surface,
            device,
            queue,
            config,
            controller,
            scene,
            scene_texture,
            scene_revision: 0,
            ui_state: UiState::default(),
            modifiers: ModifiersState::empty(),
            egui_ctx,
            egui_winit,
            egui_renderer,
            window,
        })
    }

    pub fn quit_requested(&self) -> bool {
        self.ui_state.quit_requested
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        let egui_response = self.egui_winit.on_window_event(&self.window, event);
        if egui_response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(size) => {
                self.resize(size.width, size.height);
                true
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.modifiers = modifiers.state();
                false
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return false;
                }
                let ctrl = self.modifiers.control_key();
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Tab) => {
                        self.ui_state.show_ui = !self.ui_state.show_ui;
                    }
                    PhysicalKey::Code(KeyCode::KeyH) if ctrl => self.ui_state.show_help = true,
                    PhysicalKey::Code(KeyCode::KeyE) if ctrl => {
                        self.controller.stop();
                        self.ui_state.quit_requested = true;
                    }
                    _ => return false,
                }
                true
            }
            _ => false,
        }
    }

    /// Re-uploads the scene texture if the sampling thread drew since last frame.
    fn sync_scene_texture(&mut self) {
        if self.scene.revision() == self.scene_revision {
            return;
        }
        let (width, height) = self.scene.size();
        let (revision, pixels) = self.scene.pixels();
        let image =
            egui::ColorImage::from_rgba_unmultiplied([width as usize, height as usize], &pixels);
        self.scene_texture.set(image, egui::TextureOptions::NEAREST);
        self.scene_revision = revision;
    }

    pub fn render(&mut self) {
        self.sync_scene_texture();

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.resize(self.config.width, self.config.height);
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let estimate = self.scene.label();
        let raw_input = self.egui_winit.take_egui_input(&self.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui::draw_ui(
                ctx,
                &mut self.ui_state,
                &self.controller,
                &self.scene_texture,
                &estimate,
            );
        });

        self.egui_winit
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, delta);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui Encoder"),
            });
        let callback_buffers = self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        let background = clear_color(self.controller.settings().background_color());
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            })
            .forget_lifetime();
        self.egui_renderer
            .render(&mut pass, &paint_jobs, &screen_descriptor);
        drop(pass);

        self.queue.submit(
            callback_buffers
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        output.present();

        self.device.poll(wgpu::Maintain::Poll);

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn clear_color(color: Color) -> wgpu::Color {
    wgpu::Color {
        r: f64::from(color.r) / 255.0,
        g: f64::from(color.g) / 255.0,
        b: f64::from(color.b) / 255.0,
        a: 1.0,
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.controller.finish();
        // Wait for all GPU work to finish before the surface is destroyed.
        self.device.poll(wgpu::Maintain::Wait);
    }
}
