use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rand::rngs::StdRng;
use rand::Rng;

use crate::settings::{Color, Settings};

/// Samples drawn by a run that is left to complete.
pub const SAMPLE_BUDGET: u32 = 100_000;

/// Loop iterations between estimate publications.
pub const ESTIMATE_INTERVAL: u32 = 1000;

/// Ellipse-bounded arc, angles in degrees counter-clockwise from 3 o'clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcShape {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub start_angle: f32,
    pub sweep_angle: f32,
}

impl ArcShape {
    /// Quarter disk with its center at `(0, radius)` and opening towards the
    /// top-right, which is exactly the region [`is_inside`] accepts.
    pub fn quarter(radius: u32) -> Self {
        let r = radius as i32;
        Self {
            x: -r - 1,
            y: -1,
            width: radius * 2,
            height: radius * 2,
            start_angle: 0.0,
            sweep_angle: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    /// Wipe everything drawn by a previous run.
    Clear,
    FillArc { arc: ArcShape, color: Color },
    Dot { x: i32, y: i32, color: Color },
}

/// Receives the primitives a run produces.
pub trait DrawSink: Send + Sync {
    fn draw(&self, command: DrawCommand);
}

/// Receives formatted estimate text, e.g. `"PI: 3.141593"`.
pub trait EstimateSink: Send + Sync {
    fn show_estimate(&self, text: &str);
}

/// Inside the circle of `radius` centered at `(0, radius)`, boundary included.
pub fn is_inside(x: u32, y: u32, radius: u32) -> bool {
    let dx = f64::from(x);
    let dy = f64::from(y) - f64::from(radius);
    (dx * dx + dy * dy).sqrt() <= f64::from(radius)
}

/// `None` until at least one sample is counted.
pub fn estimate(inside: u32, total: u32) -> Option<f64> {
    (total > 0).then(|| 4.0 * f64::from(inside) / f64::from(total))
}

pub fn format_estimate(value: f64) -> String {
    format!("PI: {value:.6}")
}

/// Cooperative cancellation flag that can also interrupt a delay.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    /// Waits out `duration` unless canceled first. Returns whether the token
    /// is canceled once the wait ends.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut canceled = flag.lock();
        while !*canceled {
            if cvar.wait_until(&mut canceled, deadline).timed_out() {
                break;
            }
        }
        *canceled
    }
}

/// Counters of one run. Written only by its worker.
#[derive(Debug, Default)]
pub struct RunStats {
    total: AtomicU32,
    inside: AtomicU32,
}

/// Consistent view of [`RunStats`], always `inside <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub total: u32,
    pub inside: u32,
}

impl RunSnapshot {
    pub fn estimate(&self) -> Option<f64> {
        estimate(self.inside, self.total)
    }
}

impl RunStats {
    fn record(&self, hit: bool) {
        // total first, so a reader loading inside before total never sees inside > total
        self.total.fetch_add(1, Ordering::Release);
        if hit {
            self.inside.fetch_add(1, Ordering::Release);
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let inside = self.inside.load(Ordering::Acquire);
        let total = self.total.load(Ordering::Acquire);
        RunSnapshot { total, inside }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Canceled,
}

/// One Monte Carlo run. Consumed by [`SamplingWorker::run`].
pub struct SamplingWorker {
    pub radius: u32,
    pub budget: u32,
    pub settings: Arc<Settings>,
    pub stats: Arc<RunStats>,
    pub cancel: CancelToken,
    pub rng: StdRng,
    pub draw: Arc<dyn DrawSink>,
    pub estimates: Arc<dyn EstimateSink>,
}

impl SamplingWorker {
    pub fn run(mut self) -> Outcome {
        let r = self.radius;

        self.draw.draw(DrawCommand::Clear);
        self.draw.draw(DrawCommand::FillArc {
            arc: ArcShape::quarter(r),
            color: self.settings.arc_color(),
        });

        for i in 0..self.budget {
            let delay = Duration::from_millis(self.settings.delay_ms());
            if self.cancel.sleep(delay) {
                return Outcome::Canceled;
            }

            // Paused runs keep ticking so cancellation stays responsive.
            if !self.settings.is_active() {
                continue;
            }

            let x = self.rng.gen_range(0..=r);
            let y = self.rng.gen_range(0..=r);
            self.stats.record(is_inside(x, y, r));

            // Cadence follows the loop index, so pauses shift it against the sample count.
            if i % ESTIMATE_INTERVAL == 0 {
                if let Some(value) = self.stats.snapshot().estimate() {
                    let text = format_estimate(value);
                    log::debug!("iteration {i}: {text}");
                    self.estimates.show_estimate(&text);
                }
            }

            self.draw.draw(DrawCommand::Dot {
                x: x as i32 - 1,
                y: y as i32 - 1,
                color: self.settings.point_color(),
            });
        }

        Outcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Recorder {
        dots: AtomicUsize,
        first: Mutex<Vec<DrawCommand>>,
        estimates: Mutex<Vec<String>>,
    }

    impl DrawSink for Recorder {
        fn draw(&self, command: DrawCommand) {
            match command {
                DrawCommand::Dot { .. } => {
                    self.dots.fetch_add(1, Ordering::Relaxed);
                }
                other => self.first.lock().push(other),
            }
        }
    }

    impl EstimateSink for Recorder {
        fn show_estimate(&self, text: &str) {
            self.estimates.lock().push(text.to_owned());
        }
    }

    fn worker(
        radius: u32,
        budget: u32,
        settings: Arc<Settings>,
        recorder: &Arc<Recorder>,
    ) -> SamplingWorker {
        SamplingWorker {
            radius,
            budget,
            settings,
            stats: Arc::new(RunStats::default()),
            cancel: CancelToken::new(),
            rng: StdRng::seed_from_u64(7),
            draw: recorder.clone(),
            estimates: recorder.clone(),
        }
    }

    #[test]
    fn inclusion_boundaries() {
        let r = 500;
        assert!(is_inside(0, 0, r));
        assert!(is_inside(r, r, r));
        assert!(!is_inside(r, 0, r));
        assert!(is_inside(0, r, r));
    }

    #[test]
    fn estimate_text() {
        assert_eq!(estimate(1, 4).map(format_estimate).as_deref(), Some("PI: 1.000000"));
        assert_eq!(estimate(0, 0), None);
    }

    #[test]
    fn quarter_arc_bounds() {
        let arc = ArcShape::quarter(500);
        assert_eq!((arc.x, arc.y, arc.width, arc.height), (-501, -1, 1000, 1000));
        assert_eq!((arc.start_angle, arc.sweep_angle), (0.0, 90.0));
    }

    #[test]
    fn full_run_converges() {
        let settings = Arc::new(Settings::default());
        settings.set_delay_ms(0);
        let recorder = Arc::new(Recorder::default());
        let worker = worker(500, SAMPLE_BUDGET, settings, &recorder);
        let stats = worker.stats.clone();

        assert_eq!(worker.run(), Outcome::Completed);

        let snap = stats.snapshot();
        assert_eq!(snap.total, SAMPLE_BUDGET);
        assert!(snap.inside <= snap.total);
        let pi = snap.estimate().unwrap();
        assert!((pi - 3.14).abs() < 0.3, "estimate {pi} too far from pi");

        assert_eq!(recorder.dots.load(Ordering::Relaxed), SAMPLE_BUDGET as usize);
        assert_eq!(
            *recorder.first.lock(),
            vec![
                DrawCommand::Clear,
                DrawCommand::FillArc {
                    arc: ArcShape::quarter(500),
                    color: Color::BLACK,
                },
            ]
        );
        // iterations 0, 1000, ..., 99000
        let estimates = recorder.estimates.lock();
        assert_eq!(estimates.len(), (SAMPLE_BUDGET / ESTIMATE_INTERVAL) as usize);
        assert!(estimates.iter().all(|t| t.starts_with("PI: ")));
    }

    #[test]
    fn paused_run_samples_nothing() {
        let settings = Arc::new(Settings::default());
        settings.set_delay_ms(0);
        settings.set_active(false);
        let recorder = Arc::new(Recorder::default());
        let worker = worker(100, 2500, settings, &recorder);
        let stats = worker.stats.clone();

        assert_eq!(worker.run(), Outcome::Completed);
        assert_eq!(stats.snapshot(), RunSnapshot::default());
        assert_eq!(recorder.dots.load(Ordering::Relaxed), 0);
        assert!(recorder.estimates.lock().is_empty());
        // the background arc is drawn even while paused
        assert_eq!(recorder.first.lock().len(), 2);
    }

    /// Pauses the run right after its 1000th dot, so loop index 1000 is skipped.
    struct PauseAfterThousand {
        settings: Arc<Settings>,
        dots: AtomicUsize,
        estimates: Mutex<Vec<String>>,
    }

    impl DrawSink for PauseAfterThousand {
        fn draw(&self, command: DrawCommand) {
            if let DrawCommand::Dot { .. } = command {
                if self.dots.fetch_add(1, Ordering::SeqCst) + 1 == 1000 {
                    self.settings.set_delay_ms(20);
                    self.settings.set_active(false);
                }
            }
        }
    }

    impl EstimateSink for PauseAfterThousand {
        fn show_estimate(&self, text: &str) {
            self.estimates.lock().push(text.to_owned());
        }
    }

    #[test]
    fn cadence_follows_loop_index_across_pause() {
        let settings = Arc::new(Settings::default());
        settings.set_delay_ms(0);
        let sink = Arc::new(PauseAfterThousand {
            settings: settings.clone(),
            dots: AtomicUsize::new(0),
            estimates: Mutex::new(Vec::new()),
        });
        let stats = Arc::new(RunStats::default());
        let worker = SamplingWorker {
            radius: 100,
            budget: 3000,
            settings: settings.clone(),
            stats: stats.clone(),
            cancel: CancelToken::new(),
            rng: StdRng::seed_from_u64(11),
            draw: sink.clone(),
            estimates: sink.clone(),
        };

        let resumer = {
            let settings = settings.clone();
            let sink = sink.clone();
            std::thread::spawn(move || {
                while sink.dots.load(Ordering::SeqCst) < 1000 || settings.is_active() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                // a few paused iterations, well before index 2000
                std::thread::sleep(Duration::from_millis(60));
                settings.set_delay_ms(0);
                settings.set_active(true);
            })
        };

        assert_eq!(worker.run(), Outcome::Completed);
        resumer.join().unwrap();

        let total = stats.snapshot().total;
        assert!(total < 3000, "some iterations should have been skipped");
        assert!(total >= 1000);
        // published at indices 0 and 2000, index 1000 fell in the pause
        assert_eq!(sink.estimates.lock().len(), 2);
    }

    #[test]
    fn canceled_before_start_draws_no_samples() {
        let settings = Arc::new(Settings::default());
        let recorder = Arc::new(Recorder::default());
        let worker = worker(100, 1000, settings, &recorder);
        worker.cancel.cancel();
        let stats = worker.stats.clone();

        assert_eq!(worker.run(), Outcome::Canceled);
        assert_eq!(stats.snapshot().total, 0);
        assert_eq!(recorder.dots.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let started = Instant::now();
        assert!(token.sleep(Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn uncanceled_sleep_times_out() {
        let token = CancelToken::new();
        let started = Instant::now();
        assert!(!token.sleep(Duration::from_millis(5)));
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
