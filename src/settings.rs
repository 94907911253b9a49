use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Delay used until the user picks a speed (matches [`Speed::Fast`]).
pub const DEFAULT_DELAY_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const GRAY: Color = Color::rgb(128, 128, 128);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

/// Named choices offered by the color lists, first entry is the default.
pub const ARC_COLORS: [(&str, Color); 3] = [
    ("Black", Color::BLACK),
    ("Red", Color::RED),
    ("Green", Color::GREEN),
];

pub const POINT_COLORS: [(&str, Color); 3] = [
    ("Yellow", Color::YELLOW),
    ("Red", Color::RED),
    ("Green", Color::GREEN),
];

pub const BACKGROUND_COLORS: [(&str, Color); 3] = [
    ("Gray", Color::GRAY),
    ("Black", Color::BLACK),
    ("White", Color::WHITE),
];

/// Case-insensitive lookup of a color name across all palettes.
pub fn color_by_name(name: &str) -> Option<Color> {
    ARC_COLORS
        .iter()
        .chain(POINT_COLORS.iter())
        .chain(BACKGROUND_COLORS.iter())
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, c)| *c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speed {
    Slow,
    Medium,
    Fast,
}

impl Speed {
    pub const ALL: [Speed; 3] = [Speed::Slow, Speed::Medium, Speed::Fast];

    pub fn name(self) -> &'static str {
        match self {
            Speed::Slow => "Slow",
            Speed::Medium => "Medium",
            Speed::Fast => "Fast",
        }
    }

    /// Inter-sample delay in milliseconds.
    pub fn delay_ms(self) -> u64 {
        match self {
            Speed::Slow => 5,
            Speed::Medium => 3,
            Speed::Fast => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    arc: Color,
    point: Color,
    background: Color,
}

/// Knobs shared between the controller and the sampling thread.
///
/// These persist across runs. The worker re-reads them every iteration, so a
/// change lands at most one iteration late.
#[derive(Debug)]
pub struct Settings {
    delay_ms: AtomicU64,
    active: AtomicBool,
    palette: Mutex<Palette>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_ms: AtomicU64::new(DEFAULT_DELAY_MS),
            active: AtomicBool::new(true),
            palette: Mutex::new(Palette {
                arc: ARC_COLORS[0].1,
                point: POINT_COLORS[0].1,
                background: BACKGROUND_COLORS[0].1,
            }),
        }
    }
}

impl Settings {
    pub fn delay_ms(&self) -> u64 {
        self.delay_ms.load(Ordering::Relaxed)
    }

    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Flips the pause flag and returns the new `active` value.
    pub fn toggle_active(&self) -> bool {
        !self.active.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn arc_color(&self) -> Color {
        self.palette.lock().arc
    }

    pub fn set_arc_color(&self, color: Color) {
        self.palette.lock().arc = color;
    }

    pub fn point_color(&self) -> Color {
        self.palette.lock().point
    }

    pub fn set_point_color(&self, color: Color) {
        self.palette.lock().point = color;
    }

    pub fn background_color(&self) -> Color {
        self.palette.lock().background
    }

    pub fn set_background_color(&self, color: Color) {
        self.palette.lock().background = color;
    }
}
