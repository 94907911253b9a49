use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::sampler::{ArcShape, DrawCommand, DrawSink, EstimateSink};
use crate::settings::Color;

pub const INITIAL_LABEL: &str = "PI ESTIMATION";

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

struct SceneData {
    pixels: RgbaImage,
    label: String,
    revision: u64,
}

/// Raster surface the sampling thread draws into.
///
/// Pixels start transparent; the background color is composited by whoever
/// displays or exports the scene, so it can change without a redraw.
pub struct Scene {
    data: Mutex<SceneData>,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: Mutex::new(SceneData {
                pixels: RgbaImage::from_pixel(width, height, TRANSPARENT),
                label: INITIAL_LABEL.to_owned(),
                revision: 0,
            }),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.data.lock().pixels.dimensions()
    }

    /// Bumped on every pixel change.
    pub fn revision(&self) -> u64 {
        self.data.lock().revision
    }

    pub fn label(&self) -> String {
        self.data.lock().label.clone()
    }

    /// Copies the raw RGBA bytes together with the revision they belong to.
    pub fn pixels(&self) -> (u64, Vec<u8>) {
        let data = self.data.lock();
        (data.revision, data.pixels.as_raw().clone())
    }

    /// Scene flattened onto an opaque background.
    pub fn composite(&self, background: Color) -> RgbaImage {
        let data = self.data.lock();
        let mut out = RgbaImage::from_pixel(
            data.pixels.width(),
            data.pixels.height(),
            background.to_rgba(),
        );
        for (x, y, px) in data.pixels.enumerate_pixels() {
            if px[3] != 0 {
                out.put_pixel(x, y, *px);
            }
        }
        out
    }
}

impl DrawSink for Scene {
    fn draw(&self, command: DrawCommand) {
        let mut data = self.data.lock();
        match command {
            DrawCommand::Clear => {
                data.pixels.pixels_mut().for_each(|px| *px = TRANSPARENT);
            }
            DrawCommand::FillArc { arc, color } => fill_arc(&mut data.pixels, &arc, color),
            DrawCommand::Dot { x, y, color } => {
                if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
                    if x < data.pixels.width() && y < data.pixels.height() {
                        data.pixels.put_pixel(x, y, color.to_rgba());
                    }
                }
            }
        }
        data.revision += 1;
    }
}

impl EstimateSink for Scene {
    fn show_estimate(&self, text: &str) {
        self.data.lock().label = text.to_owned();
    }
}

/// Fills the pie slice of `arc` that overlaps the image.
fn fill_arc(pixels: &mut RgbaImage, arc: &ArcShape, color: Color) {
    if arc.width == 0 || arc.height == 0 {
        return;
    }
    let rx = f64::from(arc.width) / 2.0;
    let ry = f64::from(arc.height) / 2.0;
    let cx = f64::from(arc.x) + rx;
    let cy = f64::from(arc.y) + ry;
    let start = f64::from(arc.start_angle);
    let sweep = f64::from(arc.sweep_angle);
    let rgba = color.to_rgba();

    let (width, height) = pixels.dimensions();
    for py in 0..height {
        for px in 0..width {
            let dx = f64::from(px) - cx;
            // screen y grows downwards, angles grow counter-clockwise
            let dy = cy - f64::from(py);
            if (dx / rx).powi(2) + (dy / ry).powi(2) > 1.0 {
                continue;
            }
            let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);
            let offset = (angle - start).rem_euclid(360.0);
            if sweep >= 360.0 || offset <= sweep {
                pixels.put_pixel(px, py, rgba);
            }
        }
    }
}
