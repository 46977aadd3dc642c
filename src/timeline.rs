//! Round playback timeline: progress bar, volume fades and delayed teardown.
//!
//! All timing goes through [`Timers`]; the run loop hands fired ids back via
//! [`PlaybackTimeline::on_timer`]. Only one progress interval exists at a
//! time and every exit path clears it.

use crate::colors::{hsl_to_rgb, Rgb};
use crate::scheduler::{TimerId, Timers};
use std::time::{Duration, Instant};
use tracing::debug;

mod constants {
    use std::time::Duration;

    pub const PROGRESS_PERIOD: Duration = Duration::from_millis(50);
    /// The bar advances as if a tick took 51 ms, finishing slightly late.
    pub const PROGRESS_TICK_MS: f64 = 51.0;
    pub const COUNTER_STEP: f64 = 0.05;
    pub const FADE_IN: Duration = Duration::from_millis(2000);
    pub const FADE_OUT: Duration = Duration::from_millis(5000);
    pub const STOP_AFTER_FADE: Duration = Duration::from_millis(5000);
    pub const CANCEL_AFTER_FADE: Duration = Duration::from_millis(6000);
    pub const CANCEL_AFTER_CUT: Duration = Duration::from_millis(2000);
    /// Hue of the progress bar, in degrees.
    pub const BAR_HUE: f64 = 181.0;
}

use constants::*;

/// Deferred effects the owner must carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineAction {
    StopSound,
    CancelVisualizer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    /// Percent, 0..=100 (may overshoot by one increment).
    pub width: f64,
    pub color: Rgb,
    /// Hourglass animation flag.
    pub sand_animated: bool,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            width: 0.0,
            color: progress_color(0.0),
            sand_animated: false,
        }
    }
}

/// Progress bar colour: fixed hue, saturation and lightness grow with width.
pub fn progress_color(width: f64) -> Rgb {
    let half = (width / 2.0).round();
    let s = (half + 50.0).min(100.0) / 100.0;
    let l = (half + 45.0).min(75.0) / 100.0;
    hsl_to_rgb(BAR_HUE / 360.0, s, l)
}

#[derive(Debug, Clone, Copy)]
struct Progress {
    timer: TimerId,
    increment: f64,
    counter: f64,
}

#[derive(Debug, Clone, Copy)]
struct Fade {
    from: f64,
    to: f64,
    start: Instant,
    duration: Duration,
}

impl Fade {
    fn level(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration || self.duration.is_zero() {
            return self.to;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.from + (self.to - self.from) * t
    }
}

#[derive(Debug)]
pub struct PlaybackTimeline {
    volume: f64,
    playing: bool,
    progress: Option<Progress>,
    bar: ProgressBar,
    fade: Option<Fade>,
    stop_sound: Option<TimerId>,
    cancel_visualizer: Option<TimerId>,
}

impl PlaybackTimeline {
    pub fn new(volume: f64) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            playing: false,
            progress: None,
            bar: ProgressBar::default(),
            fade: None,
            stop_sound: None,
            cancel_visualizer: None,
        }
    }

    /// Start playback `elapsed` seconds into a round of `round_time` seconds.
    ///
    /// Returns `false` when already playing. Teardown still pending from an
    /// earlier `stop` is dropped so it cannot hit the new round.
    pub fn play(&mut self, elapsed: f64, round_time: f64, now: Instant, timers: &mut Timers) -> bool {
        if self.playing {
            return false;
        }
        for id in [self.stop_sound.take(), self.cancel_visualizer.take()].into_iter().flatten() {
            timers.clear(id);
        }

        self.playing = true;
        self.start_progress(elapsed, round_time, now, timers);
        self.fade = Some(Fade {
            from: 0.0,
            to: self.volume,
            start: now,
            duration: FADE_IN,
        });
        debug!(elapsed, round_time, "playback started");
        true
    }

    fn start_progress(&mut self, elapsed: f64, round_time: f64, now: Instant, timers: &mut Timers) {
        if self.progress.is_some() {
            return;
        }
        let increment = if round_time > 0.0 {
            100.0 / ((round_time * 1000.0) / PROGRESS_TICK_MS)
        } else {
            100.0
        };
        let width = (elapsed.max(0.0) * 1000.0 / PROGRESS_PERIOD.as_millis() as f64) * increment;
        self.bar = ProgressBar {
            width,
            color: progress_color(width),
            sand_animated: false,
        };
        self.progress = Some(Progress {
            timer: timers.start_interval(PROGRESS_PERIOD, now),
            increment,
            counter: 0.0,
        });
    }

    /// Stop playback, optionally fading out first.
    ///
    /// Returns the actions due immediately; the rest arrive via `on_timer`.
    /// Nothing happens when nothing is playing.
    pub fn stop(&mut self, fade: bool, now: Instant, timers: &mut Timers) -> Vec<TimelineAction> {
        if !self.playing {
            return Vec::new();
        }
        self.clear_progress(timers);
        for id in [self.stop_sound.take(), self.cancel_visualizer.take()].into_iter().flatten() {
            timers.clear(id);
        }

        if fade {
            self.fade = Some(Fade {
                from: self.gain(now),
                to: 0.0,
                start: now,
                duration: FADE_OUT,
            });
            self.stop_sound = Some(timers.start_timeout(STOP_AFTER_FADE, now));
            self.cancel_visualizer = Some(timers.start_timeout(CANCEL_AFTER_FADE, now));
            debug!("fading out");
            Vec::new()
        } else {
            self.playing = false;
            self.fade = None;
            self.cancel_visualizer = Some(timers.start_timeout(CANCEL_AFTER_CUT, now));
            debug!("cut");
            vec![TimelineAction::StopSound]
        }
    }

    /// Drop every timer and silence playback at once.
    pub fn halt(&mut self, timers: &mut Timers) {
        self.clear_progress(timers);
        for id in [self.stop_sound.take(), self.cancel_visualizer.take()].into_iter().flatten() {
            timers.clear(id);
        }
        self.playing = false;
        self.fade = None;
    }

    /// True for the progress interval and pending teardown timeouts.
    pub fn owns(&self, id: TimerId) -> bool {
        self.progress.map(|p| p.timer) == Some(id)
            || self.stop_sound == Some(id)
            || self.cancel_visualizer == Some(id)
    }

    /// Handle a fired timer. Ids that belong to someone else return `None`.
    pub fn on_timer(&mut self, id: TimerId, timers: &mut Timers) -> Option<TimelineAction> {
        if self.progress.map(|p| p.timer) == Some(id) {
            self.tick_progress(timers);
            None
        } else if self.stop_sound == Some(id) {
            self.stop_sound = None;
            self.playing = false;
            self.fade = None;
            Some(TimelineAction::StopSound)
        } else if self.cancel_visualizer == Some(id) {
            self.cancel_visualizer = None;
            Some(TimelineAction::CancelVisualizer)
        } else {
            None
        }
    }

    fn tick_progress(&mut self, timers: &mut Timers) {
        let Some(progress) = self.progress.as_mut() else { return };
        progress.counter += COUNTER_STEP;

        if self.bar.width >= 100.0 {
            self.clear_progress(timers);
            return;
        }

        let beat = progress.counter.round() as i64;
        if beat % 2 == 0 {
            self.bar.sand_animated = beat % 4 == 0;
        }
        self.bar.width += progress.increment;
        self.bar.color = progress_color(self.bar.width);
    }

    fn clear_progress(&mut self, timers: &mut Timers) {
        if let Some(progress) = self.progress.take() {
            timers.clear(progress.timer);
        }
    }

    /// Effective playback gain at `now`.
    pub fn gain(&self, now: Instant) -> f64 {
        match self.fade {
            Some(fade) => fade.level(now),
            None if self.playing => self.volume,
            None => 0.0,
        }
    }

    /// Change the target volume. A fade-in retargets; a fade-out keeps heading to silence.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
        let fading_out = self.stop_sound.is_some();
        if let Some(fade) = self.fade.as_mut().filter(|_| !fading_out) {
            fade.to = self.volume;
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn progress_active(&self) -> bool {
        self.progress.is_some()
    }

    pub fn progress(&self) -> &ProgressBar {
        &self.bar
    }
}
