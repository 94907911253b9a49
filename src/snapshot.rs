use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::controller::{ControllerError, RunConfig, RunController};
use crate::sampler::SAMPLE_BUDGET;
use crate::scene::Scene;
use crate::settings::{self, Color, ARC_COLORS, BACKGROUND_COLORS, POINT_COLORS};
use crate::DEFAULT_RADIUS;

/// Largest accepted `--radius`; keeps the scene image a few hundred MiB at most.
pub const MAX_RADIUS: u32 = 8192;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing value for {0}")]
    MissingValue(&'static str),
    #[error("Invalid value '{value}' for {flag}")]
    InvalidValue { flag: &'static str, value: String },
    #[error("Unknown color '{0}'")]
    UnknownColor(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("Failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotConfig {
    pub radius: u32,
    pub samples: u32,
    pub delay_ms: u64,
    pub seed: Option<u64>,
    pub arc_color: Color,
    pub point_color: Color,
    pub background: Color,
    pub output: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            samples: SAMPLE_BUDGET,
            delay_ms: 0,
            seed: None,
            arc_color: ARC_COLORS[0].1,
            point_color: POINT_COLORS[0].1,
            background: BACKGROUND_COLORS[0].1,
            output: PathBuf::from("snapshot.png"),
        }
    }
}

pub fn parse_args() -> Result<Option<SnapshotConfig>, ConfigError> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

/// `Ok(None)` unless `--snapshot` is among `args`.
pub fn parse_args_from(args: &[String]) -> Result<Option<SnapshotConfig>, ConfigError> {
    if !args.iter().any(|a| a == "--snapshot") {
        return Ok(None);
    }

    let mut config = SnapshotConfig::default();

    fn value<'a>(args: &'a [String], flag: &'static str) -> Result<Option<&'a str>, ConfigError> {
        match args.iter().position(|a| a == flag) {
            None => Ok(None),
            Some(i) => args
                .get(i + 1)
                .map(|v| Some(v.as_str()))
                .ok_or(ConfigError::MissingValue(flag)),
        }
    }
    let get_val = |flag: &'static str| value(args, flag);
    fn number<T: std::str::FromStr>(flag: &'static str, v: &str) -> Result<T, ConfigError> {
        v.parse().map_err(|_| ConfigError::InvalidValue {
            flag,
            value: v.to_owned(),
        })
    }
    fn color(v: &str) -> Result<Color, ConfigError> {
        settings::color_by_name(v).ok_or_else(|| ConfigError::UnknownColor(v.to_owned()))
    }

    if let Some(v) = get_val("--radius")? {
        config.radius = number("--radius", v)?;
        if config.radius == 0 || config.radius > MAX_RADIUS {
            return Err(ConfigError::InvalidValue {
                flag: "--radius",
                value: v.to_owned(),
            });
        }
    }
    if let Some(v) = get_val("--samples")? {
        config.samples = number("--samples", v)?;
    }
    if let Some(v) = get_val("--delay")? {
        config.delay_ms = number("--delay", v)?;
    }
    if let Some(v) = get_val("--seed")? {
        config.seed = Some(number("--seed", v)?);
    }
    if let Some(v) = get_val("--arc-color")? {
        config.arc_color = color(v)?;
    }
    if let Some(v) = get_val("--point-color")? {
        config.point_color = color(v)?;
    }
    if let Some(v) = get_val("--background")? {
        config.background = color(v)?;
    }
    if let Some(v) = get_val("--output")? {
        config.output = PathBuf::from(v);
    }

    Ok(Some(config))
}

/// Runs one estimation to completion without a window and saves the picture.
/// Returns the final estimate, if any sample was taken.
pub fn render_snapshot(config: &SnapshotConfig) -> Result<Option<f64>, SnapshotError> {
    let side = config.radius + 1;
    let scene = Arc::new(Scene::new(side, side));
    let controller = RunController::new(
        RunConfig {
            radius: config.radius,
            budget: config.samples,
            seed: config.seed,
        },
        scene.clone(),
        scene.clone(),
    );
    controller.set_speed(config.delay_ms);
    controller.set_arc_color(config.arc_color);
    controller.set_point_color(config.point_color);
    controller.set_background_color(config.background);

    controller.start()?;
    controller.wait_idle();

    let stats = controller.stats();
    log::info!("Sampled {} points, {} inside", stats.total, stats.inside);

    scene
        .composite(config.background)
        .save(&config.output)
        .map_err(|source| SnapshotError::Save {
            path: config.output.clone(),
            source,
        })?;

    Ok(stats.estimate())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("pi-estimator")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn no_flag_means_windowed() {
        assert_eq!(parse_args_from(&args(&["--radius", "10"])).unwrap(), None);
    }

    #[test]
    fn defaults() {
        let config = parse_args_from(&args(&["--snapshot"])).unwrap().unwrap();
        assert_eq!(config, SnapshotConfig::default());
        assert_eq!(config.radius, DEFAULT_RADIUS);
        assert_eq!(config.samples, SAMPLE_BUDGET);
        assert_eq!(config.delay_ms, 0);
    }

    #[test]
    fn all_flags() {
        let config = parse_args_from(&args(&[
            "--snapshot",
            "--radius",
            "200",
            "--samples",
            "5000",
            "--delay",
            "2",
            "--seed",
            "9",
            "--arc-color",
            "red",
            "--point-color",
            "green",
            "--background",
            "white",
            "--output",
            "out.png",
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.radius, 200);
        assert_eq!(config.samples, 5000);
        assert_eq!(config.delay_ms, 2);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.arc_color, Color::RED);
        assert_eq!(config.point_color, Color::GREEN);
        assert_eq!(config.background, Color::WHITE);
        assert_eq!(config.output, PathBuf::from("out.png"));
    }

    #[test]
    fn bad_values() {
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--radius", "big"])),
            Err(ConfigError::InvalidValue { flag: "--radius", .. })
        ));
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--radius", "0"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--radius", "4294967295"])),
            Err(ConfigError::InvalidValue { flag: "--radius", .. })
        ));
        let too_big = (MAX_RADIUS + 1).to_string();
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--radius", too_big.as_str()])),
            Err(ConfigError::InvalidValue { flag: "--radius", .. })
        ));
        let largest = MAX_RADIUS.to_string();
        let config = parse_args_from(&args(&["--snapshot", "--radius", largest.as_str()]))
            .unwrap()
            .unwrap();
        assert_eq!(config.radius, MAX_RADIUS);
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--arc-color", "teal"])),
            Err(ConfigError::UnknownColor(_))
        ));
        assert!(matches!(
            parse_args_from(&args(&["--snapshot", "--output"])),
            Err(ConfigError::MissingValue("--output"))
        ));
    }

    #[test]
    fn renders_png() {
        let output = std::env::temp_dir().join(format!("pi-snapshot-{}.png", std::process::id()));
        let config = SnapshotConfig {
            radius: 50,
            samples: 4000,
            seed: Some(3),
            output: output.clone(),
            ..SnapshotConfig::default()
        };

        let pi = render_snapshot(&config).unwrap().unwrap();
        assert!((pi - 3.14).abs() < 0.3, "estimate {pi} too far from pi");

        let img = image::open(&output).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (51, 51));
        // bottom-right corner lies outside the arc
        assert_eq!(*img.get_pixel(50, 50), Color::GRAY.to_rgba());
        std::fs::remove_file(&output).unwrap();
    }
}
