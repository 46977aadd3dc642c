//! Visualizer session: one frame of audio in, one frame of draw calls out.
//!
//! A session is created per room and started at each round. Every frame it
//! samples the audio source, updates the amplitude history, advances the
//! particles and draws either the circle or the bar visualizer. The pending
//! frame handle is the only way to stop the loop, so it is kept on the
//! session and cancelled by [`VisualizerSession::stop`].

use super::amplitude::{amplitude_of, AmplitudeTracker};
use super::particles::{is_hit, ParticleSystem};
use super::screen::{bar_divisor, ScreenClass};
use super::spectrum::{average_downsample, circle_pipeline, CIRCLE_BINS};
use crate::audio::AudioSource;
use crate::colors::{color_from_identifier, hue_rotate, Rgb};
use crate::config::{ModePreference, VisualizerConfig};
use crate::emblem::Emblem;
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::surface::DrawSurface;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::f64::consts::TAU;
use tracing::{debug, info};

mod constants {
    /// Frequency bins requested per frame in circle mode (FFT size 2048).
    pub const CIRCLE_FFT_BINS: usize = 1024;
    /// Frequency bins requested per frame in bar mode (FFT size 256).
    pub const BAR_FFT_BINS: usize = 128;
    /// Leading bins shown as bars.
    pub const BAR_BINS: usize = 80;
    /// Frames the emblem stays shut after a guess.
    pub const BLINK_FRAMES: u32 = 10;
    /// Particles born in a winner's colour.
    pub const WIN_FADE_DURATION: i32 = 1000;
    /// Shake offset scale is `multiplier^2` with multiplier 2.
    pub const SHAKE_SCALE: f64 = 4.0;
    pub const RING_LINE_WIDTH: f64 = 2.0;
}

use constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerMode {
    Circle,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running(VisualizerMode),
    Stopped,
}

/// Game-side signals the visualizer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PlayerGuessed(String),
    RoundChanged,
}

/// Numbers behind one drawn frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub mode: VisualizerMode,
    pub amplitude: f64,
    pub average: f64,
    pub hit: bool,
    pub shake: Option<(f64, f64)>,
}

pub struct VisualizerSession {
    config: VisualizerConfig,
    state: SessionState,
    amplitudes: AmplitudeTracker,
    particles: ParticleSystem,
    blink_frames: u32,
    winners: HashSet<String>,
    emblem: Emblem,
    rng: StdRng,
    pending: Option<FrameHandle>,
}

impl VisualizerSession {
    pub fn new(config: VisualizerConfig, emblem: Emblem, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            state: SessionState::Idle,
            amplitudes: AmplitudeTracker::default(),
            particles: ParticleSystem::default(),
            blink_frames: 0,
            winners: HashSet::new(),
            emblem,
            rng,
            pending: None,
        }
    }

    /// Start drawing in the configured mode; `Random` flips a coin.
    ///
    /// Restarting a running session replaces its frame instead of stacking a
    /// second loop.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) -> VisualizerMode {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }

        let mode = match self.config.mode() {
            ModePreference::Circle => VisualizerMode::Circle,
            ModePreference::Bar => VisualizerMode::Bar,
            ModePreference::Random => {
                if self.rng.gen_bool(0.5) {
                    VisualizerMode::Circle
                } else {
                    VisualizerMode::Bar
                }
            }
        };

        self.amplitudes.clear();
        self.winners.clear();
        self.particles.clear();
        self.state = SessionState::Running(mode);
        self.pending = Some(scheduler.request_frame());
        info!(?mode, "visualizer started");
        mode
    }

    /// Cancel the pending frame. The session stays stopped until `start`.
    pub fn stop(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        if matches!(self.state, SessionState::Running(_)) {
            info!("visualizer stopped");
            self.state = SessionState::Stopped;
        }
    }

    /// Run one frame. Handles other than the pending one are ignored.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        audio: &mut dyn AudioSource,
        surface: &mut dyn DrawSurface,
        scheduler: &mut dyn FrameScheduler,
    ) -> Option<FrameStats> {
        let mode = match self.state {
            SessionState::Running(mode) if self.pending == Some(handle) => mode,
            _ => {
                debug!(?handle, "stale frame ignored");
                return None;
            }
        };

        let stats = match mode {
            VisualizerMode::Circle => self.draw_circle(audio, surface),
            VisualizerMode::Bar => self.draw_bars(audio, surface),
        };
        self.pending = Some(scheduler.request_frame());
        Some(stats)
    }

    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::PlayerGuessed(id) => {
                self.blink_frames = BLINK_FRAMES;
                if !self.winners.contains(&id) {
                    let color = color_from_identifier(&id);
                    debug!(player = %id, color = %color.to_hex(), "winner colour queued");
                    self.particles.fades_mut().push(color, WIN_FADE_DURATION);
                    self.winners.insert(id);
                }
            }
            SessionEvent::RoundChanged => {
                self.amplitudes.clear();
                self.winners.clear();
            }
        }
    }

    fn draw_circle(&mut self, audio: &mut dyn AudioSource, surface: &mut dyn DrawSurface) -> FrameStats {
        let (w, h) = surface.size();
        let class = ScreenClass::from_width(w);
        let snapshot = audio.frequency_data(CIRCLE_FFT_BINS);

        let current = amplitude_of(&snapshot[..snapshot.len().min(CIRCLE_BINS)]);
        self.amplitudes.push(current);
        let average = self.amplitudes.average().unwrap_or(current);
        let ring = circle_pipeline(&snapshot);

        let threshold = self.config.shake_threshold();
        let centre = (w / 2.0, h / 2.0);
        self.particles.tick(current, average, threshold, centre, &mut self.rng);

        surface.clear();
        surface.fill_rect(0.0, 0.0, w, h, Rgb::BACKGROUND);

        let radius = h / 3.0;
        let hit = is_hit(current, average, threshold);
        surface.save();
        let shake = if hit {
            let reach = current * class.shake_modifier() * SHAKE_SCALE;
            let offset = (self.rng.gen::<f64>() * reach, self.rng.gen::<f64>() * reach);
            surface.translate(offset.0, offset.1);
            Some(offset)
        } else {
            None
        };

        let blinking = self.blink_frames > 0;
        if blinking {
            self.blink_frames -= 1;
        }
        let size = radius * current;
        let image = self.emblem.frame(blinking, class.small_emblem());
        surface.draw_image(image, centre.0 - size / 2.0, centre.1 - size / 2.0, size, size);

        let modifier = class.bar_height_modifier(h > w);
        draw_ring(surface, &ring, centre, radius, modifier);

        self.particles.render(surface);
        surface.restore();

        FrameStats {
            mode: VisualizerMode::Circle,
            amplitude: current,
            average,
            hit,
            shake,
        }
    }

    fn draw_bars(&mut self, audio: &mut dyn AudioSource, surface: &mut dyn DrawSurface) -> FrameStats {
        let (w, h) = surface.size();
        let snapshot = audio.frequency_data(BAR_FFT_BINS);
        let head = &snapshot[..snapshot.len().min(BAR_BINS)];

        let current = amplitude_of(head);
        self.amplitudes.push(current);
        let average = self.amplitudes.average().unwrap_or(current);

        let divisor = bar_divisor(w);
        let reduced = average_downsample(head, divisor);

        surface.clear();
        surface.fill_rect(0.0, 0.0, w, h, Rgb::BACKGROUND);

        let n = reduced.len() as f64;
        let bar_width = (w - n) / n;
        let floor = 6.0 * (divisor as f64 - 2.0);
        let mut x = 0.0;
        for (i, &v) in reduced.iter().enumerate() {
            let bar_height = (v as f64 - floor).max(0.0);
            let saturation = (bar_height / h + 0.2).min(1.0);
            let color = hue_rotate((i * (divisor + 1)) as f64, saturation);
            surface.fill_rect(x, h - bar_height, bar_width, bar_height + bar_width, color);
            x += bar_width + 1.0;
        }

        FrameStats {
            mode: VisualizerMode::Bar,
            amplitude: current,
            average,
            hit: false,
            shake: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut VisualizerConfig {
        &mut self.config
    }

    pub fn amplitudes(&self) -> &AmplitudeTracker {
        &self.amplitudes
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn blink_frames(&self) -> u32 {
        self.blink_frames
    }
}

fn polar(centre: (f64, f64), r: f64, angle: f64) -> (f64, f64) {
    (r * angle.cos() + centre.0, r * angle.sin() + centre.1)
}

/// Closed quadratic-curve ring; each node sits at `radius + value/modifier`.
fn draw_ring(surface: &mut dyn DrawSurface, ring: &[f64], centre: (f64, f64), radius: f64, modifier: f64) {
    let n = ring.len();
    if n == 0 {
        return;
    }
    let unit = TAU / n as f64;

    surface.begin_path();
    let (x0, y0) = polar(centre, radius + ring[0] / modifier, 0.0);
    surface.move_to(x0, y0);
    for i in 1..=n {
        let r = radius + ring[i % n] / modifier;
        let angle = i as f64 * unit;
        let (cx, cy) = polar(centre, r, angle - unit / 2.0);
        let (x, y) = polar(centre, r, angle);
        surface.quadratic_curve_to(cx, cy, x, y);
    }
    surface.stroke(Rgb::WHITE, RING_LINE_WIDTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::FrameLoop;
    use crate::surface::{DrawOp, Recorder};

    struct Flat(u8);

    impl AudioSource for Flat {
        fn frequency_data(&mut self, max_bins: usize) -> Vec<u8> {
            vec![self.0; max_bins]
        }

        fn is_suspended(&self) -> bool {
            false
        }
    }

    fn session(mode: ModePreference) -> VisualizerSession {
        let mut cfg = VisualizerConfig::default();
        cfg.set_mode(mode);
        VisualizerSession::new(cfg, Emblem::procedural(), Some(1))
    }

    fn run_frame(
        s: &mut VisualizerSession,
        audio: &mut dyn AudioSource,
        surface: &mut Recorder,
        frames: &mut FrameLoop,
    ) -> Option<FrameStats> {
        let due = frames.take_due();
        assert_eq!(due.len(), 1);
        s.on_frame(due[0], audio, surface, frames)
    }

    #[test]
    fn random_mode_picks_one_of_both() {
        let mut frames = FrameLoop::new();
        let mut seen = HashSet::new();
        for seed in 0..32 {
            let mut s = VisualizerSession::new(VisualizerConfig::default(), Emblem::procedural(), Some(seed));
            let mode = s.start(&mut frames);
            assert_eq!(s.state(), SessionState::Running(mode));
            s.stop(&mut frames);
            seen.insert(format!("{mode:?}"));
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn circle_frame_draw_order() {
        let mut frames = FrameLoop::new();
        let mut surface = Recorder::new(800.0, 600.0);
        let mut s = session(ModePreference::Circle);
        s.start(&mut frames);
        run_frame(&mut s, &mut Flat(40), &mut surface, &mut frames).unwrap();

        let ops = surface.take_ops();
        assert_eq!(ops[0], DrawOp::Clear);
        assert!(matches!(ops[1], DrawOp::FillRect { color: Rgb::BACKGROUND, .. }));
        assert_eq!(ops[2], DrawOp::Save);
        assert!(matches!(ops[3], DrawOp::Image { .. }));
        assert!(matches!(ops[4], DrawOp::Stroke { color: Rgb::WHITE, .. }));
        let restore = ops.iter().position(|op| *op == DrawOp::Restore).unwrap();
        assert_eq!(restore, 5 + s.particles().len());
        assert_eq!(ops.last(), Some(&DrawOp::Restore));
        assert_eq!(surface.save_depth(), 0);
        assert_eq!(frames.pending(), 1);
    }

    #[test]
    fn ring_closes_on_itself() {
        let mut surface = Recorder::new(100.0, 100.0);
        let ring = vec![3.0; 320];
        draw_ring(&mut surface, &ring, (50.0, 50.0), 30.0, 1.0);
        match surface.ops.last() {
            Some(DrawOp::Stroke { segments, .. }) => assert_eq!(*segments, 320 * 8),
            other => panic!("expected stroke, got {other:?}"),
        }
    }

    #[test]
    fn bar_frame_has_no_shake() {
        let mut frames = FrameLoop::new();
        let mut surface = Recorder::new(1000.0, 500.0);
        let mut s = session(ModePreference::Bar);
        s.start(&mut frames);
        let stats = run_frame(&mut s, &mut Flat(200), &mut surface, &mut frames).unwrap();
        assert_eq!(stats.mode, VisualizerMode::Bar);
        assert_eq!(stats.shake, None);

        let bars: Vec<_> = surface
            .ops
            .iter()
            .skip(2)
            .filter(|op| matches!(op, DrawOp::FillRect { .. }))
            .collect();
        // 80 bins at divisor 4
        assert_eq!(bars.len(), 20);
        if let DrawOp::FillRect { y, h, w, .. } = bars[0] {
            // 200 - 6 * (4 - 2)
            assert!((500.0 - y - 188.0).abs() < 1e-9);
            assert!((h - (188.0 + w)).abs() < 1e-9);
        }
    }

    #[test]
    fn guess_blinks_and_colours_once_per_round() {
        let mut s = session(ModePreference::Circle);
        s.handle(SessionEvent::PlayerGuessed("aabbcc00-1111".into()));
        s.handle(SessionEvent::PlayerGuessed("aabbcc00-1111".into()));
        assert_eq!(s.blink_frames(), BLINK_FRAMES);
        assert_eq!(s.particles().fades().len(), 1);
        assert_eq!(s.particles().fades().entries()[0].color, Rgb::new(0xAA, 0xBB, 0xCC));

        s.handle(SessionEvent::RoundChanged);
        s.handle(SessionEvent::PlayerGuessed("aabbcc00-1111".into()));
        assert_eq!(s.particles().fades().len(), 2);
    }

    #[test]
    fn blink_counts_down_per_frame() {
        let mut frames = FrameLoop::new();
        let mut surface = Recorder::new(640.0, 480.0);
        let mut s = session(ModePreference::Circle);
        s.start(&mut frames);
        s.handle(SessionEvent::PlayerGuessed("42".into()));
        for _ in 0..3 {
            run_frame(&mut s, &mut Flat(10), &mut surface, &mut frames);
        }
        assert_eq!(s.blink_frames(), BLINK_FRAMES - 3);
    }

    #[test]
    fn stale_and_stopped_frames_do_nothing() {
        let mut frames = FrameLoop::new();
        let mut surface = Recorder::new(640.0, 480.0);
        let mut s = session(ModePreference::Circle);
        let first = s.start(&mut frames);
        assert_eq!(first, VisualizerMode::Circle);
        let stale = frames.take_due()[0];
        s.start(&mut frames);
        assert!(s.on_frame(stale, &mut Flat(0), &mut surface, &mut frames).is_none());
        assert!(surface.ops.is_empty());

        s.stop(&mut frames);
        assert_eq!(s.state(), SessionState::Stopped);
        assert_eq!(frames.pending(), 0);
        assert!(frames.take_due().is_empty());
    }
}
