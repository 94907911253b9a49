mod app;
mod controller;
mod sampler;
mod scene;
mod settings;
mod snapshot;
mod ui;

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{WindowAttributes, WindowId};

/// Arc radius and side of the sampling square, in pixels.
pub const DEFAULT_RADIUS: u32 = 500;

/// Room for the menu bar and the control strip below the scene.
const CHROME_HEIGHT: u32 = 80;

/// Only request a redraw when this much time has passed (~60 FPS).
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

struct PiEstimatorApp {
    app: Option<app::App>,
    last_redraw_request: Instant,
}

impl ApplicationHandler for PiEstimatorApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        let side = DEFAULT_RADIUS + 1;
        let attrs = WindowAttributes::default()
            .with_title("PI estimator")
            .with_resizable(false)
            .with_inner_size(winit::dpi::LogicalSize::new(side, side + CHROME_HEIGHT));

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .expect("Failed to create window"),
        );
        match app::App::new(window, DEFAULT_RADIUS) {
            Ok(app) => self.app = Some(app),
            Err(e) => {
                log::error!("{e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Dropping the app joins the sampling thread while the window is still alive.
        if matches!(&event, WindowEvent::CloseRequested) {
            self.app = None;
            event_loop.exit();
            return;
        }

        let Some(app) = &mut self.app else { return };

        if matches!(&event, WindowEvent::RedrawRequested) {
            app.render();
        } else {
            app.handle_window_event(&event);
        }

        if app.quit_requested() {
            self.app = None;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = &self.app {
            if Instant::now().duration_since(self.last_redraw_request) >= FRAME_INTERVAL {
                self.last_redraw_request = Instant::now();
                app.request_redraw();
            }
        }
    }
}

fn print_usage() {
    use snapshot::MAX_RADIUS;

    eprintln!("Usage: pi-estimator [--snapshot [options]]");
    eprintln!("  --radius <px>        arc radius, 1..={MAX_RADIUS} (default {DEFAULT_RADIUS})");
    eprintln!("  --samples <n>        sample budget");
    eprintln!("  --delay <ms>         delay between samples (default 0)");
    eprintln!("  --seed <n>           fixed random seed");
    eprintln!("  --arc-color <name>   black, red, green");
    eprintln!("  --point-color <name> yellow, red, green");
    eprintln!("  --background <name>  gray, black, white");
    eprintln!("  --output <file>      PNG to write (default snapshot.png)");
}

fn main() {
    env_logger::init();

    match snapshot::parse_args() {
        Ok(Some(config)) => {
            match snapshot::render_snapshot(&config) {
                Ok(estimate) => {
                    match estimate {
                        Some(pi) => println!("{}", sampler::format_estimate(pi)),
                        None => println!("No samples taken"),
                    }
                    println!("Snapshot saved to {}", config.output.display());
                }
                Err(e) => {
                    log::error!("{e}");
                    std::process::exit(1);
                }
            }
            return;
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            std::process::exit(1);
        }
    }

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PiEstimatorApp {
        app: None,
        last_redraw_request: Instant::now(),
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {e}");
    }
}
