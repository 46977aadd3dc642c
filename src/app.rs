//! Terminal front end: wires the room feed, timers and audio to the
//! visualizer and draws the overlays.

use crate::audio::{AudioSource, AudioStatus, CaptureSource, SyntheticSource};
use crate::colors::Rgb;
use crate::config::ModePreference;
use crate::controller::{RoomContext, RoomController};
use crate::emblem::Emblem;
use crate::error::Result;
use crate::feed::{EventFeed, ScriptedFeed, WsFeed};
use crate::help::{render_help_overlay, render_progress_bar, render_status};
use crate::prefs::{init_visualizer_preference, PreferenceStore, VISUALIZER_KEY, VISUALIZER_TTL_DAYS};
use crate::scheduler::{FrameLoop, Timers};
use crate::settings::Settings;
use crate::surface::DrawSurface;
use crate::terminal::Terminal;
use crate::viz::engine::{FrameStats, VisualizerSession};
use crate::viz::{VizState, HELP};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const FLASH_DURATION: Duration = Duration::from_secs(2);
const ERROR_POLL_INTERVAL: f32 = 0.05;

/// Everything `run` needs besides the terminal.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Play against the scripted room with synthetic audio.
    pub demo: bool,
    /// Room url; falls back to the scripted room when absent.
    pub server: Option<String>,
    pub mode: Option<ModePreference>,
    pub seed: Option<u64>,
    /// Round length of the scripted room, in seconds.
    pub round_time: u32,
}

/// The room feed, timers and audio around one controller.
pub struct Room {
    controller: RoomController,
    feed: Box<dyn EventFeed>,
    audio: Option<Box<dyn AudioSource>>,
    timers: Timers,
    frames: FrameLoop,
    was_connected: bool,
}

impl Room {
    pub fn new(
        controller: RoomController,
        feed: Box<dyn EventFeed>,
        audio: Option<Box<dyn AudioSource>>,
        timers: Timers,
    ) -> Self {
        let was_connected = feed.is_connected();
        Self {
            controller,
            feed,
            audio,
            timers,
            frames: FrameLoop::new(),
            was_connected,
        }
    }

    /// Deliver room events and fired timers.
    pub fn pump(&mut self, now: Instant) {
        let events = match self.feed.poll(now) {
            Ok(events) => events,
            Err(e) => {
                warn!("feed poll failed: {}", e);
                Vec::new()
            }
        };
        for event in events {
            trace!(?event, "room event");
            let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
            for reply in self.controller.handle_event(event, now, &mut ctx) {
                if let Err(e) = self.feed.send(&reply) {
                    warn!("send failed: {}", e);
                }
            }
        }

        for id in self.timers.poll(now) {
            let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
            if self.controller.on_timer(id, &mut ctx) {
                continue;
            }
            match self.feed.on_timer(id) {
                Ok(true) => {}
                Ok(false) => debug!(?id, "unclaimed timer"),
                Err(e) => warn!("feed timer failed: {}", e),
            }
        }

        let connected = self.feed.is_connected();
        if self.was_connected && !connected {
            warn!("room connection lost");
            let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
            self.controller.shutdown(&mut ctx);
        }
        self.was_connected = connected;
    }

    /// Run the frames that are due. Returns stats of the last one drawn.
    pub fn draw(&mut self, now: Instant, surface: &mut dyn DrawSurface) -> Option<FrameStats> {
        let mut last = None;
        for handle in self.frames.take_due() {
            let Some(audio) = self.audio.as_deref_mut() else {
                debug!(?handle, "no audio source, frame dropped");
                continue;
            };
            if audio.is_suspended() {
                trace!("audio suspended");
            }
            if let Some(stats) = self.controller.on_frame(handle, now, audio, surface, &mut self.frames) {
                last = Some(stats);
            }
        }
        last
    }

    /// Switch the visualizer mode, restarting a running session.
    pub fn set_mode(&mut self, mode: ModePreference) {
        let session = self.controller.session_mut();
        session.config_mut().set_mode(mode);
        if session.is_running() {
            session.start(&mut self.frames);
        }
        info!(%mode, "visualizer mode changed");
    }

    /// Install a newly opened audio source, or record why it failed.
    pub fn enable_audio(&mut self, opened: Result<Box<dyn AudioSource>>, now: Instant) {
        self.controller.set_audio_status(AudioStatus::from_result(&opened));
        if let Ok(source) = opened {
            self.audio = Some(source);
            if self.controller.main_started() {
                let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
                self.controller.resume(now, &mut ctx);
            }
        }
    }

    /// Release every timer and frame, then the connection.
    pub fn close(&mut self) {
        let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
        self.controller.shutdown(&mut ctx);
        self.feed.close(&mut self.timers);
    }

    pub fn controller(&self) -> &RoomController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut RoomController {
        &mut self.controller
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    pub fn is_connected(&self) -> bool {
        self.feed.is_connected()
    }
}

/// Build the visualizer session from settings and the stored preference.
pub fn build_session(
    settings: &Settings,
    store: &mut dyn PreferenceStore,
    mode: Option<ModePreference>,
    seed: Option<u64>,
) -> Result<VisualizerSession> {
    let stored = init_visualizer_preference(store)?;
    let mut config = settings.visualizer.to_config(stored);
    if let Some(mode) = mode {
        config.set_mode(mode);
    }
    let emblem = match &settings.visualizer.emblem {
        Some(open) => Emblem::load(open, settings.visualizer.emblem_blink.as_deref())?,
        None => Emblem::procedural(),
    };
    debug!(mode = %config.mode(), volume = config.volume(), "session configured");
    Ok(VisualizerSession::new(config, emblem, seed))
}

fn open_capture() -> Result<Box<dyn AudioSource>> {
    CaptureSource::open().map(|source| Box::new(source) as Box<dyn AudioSource>)
}

/// Interactive loop until the user quits.
pub fn run(
    term: &mut Terminal,
    settings: &Settings,
    store: &mut dyn PreferenceStore,
    options: &RunOptions,
) -> Result<()> {
    let seed = options.seed.unwrap_or_else(rand::random);
    let session = build_session(settings, store, options.mode, options.seed)?;
    let now = Instant::now();
    let mut timers = Timers::new();

    let server = if options.demo { None } else { options.server.as_deref() };
    let feed: Box<dyn EventFeed> = match server {
        Some(url) => match WsFeed::connect(url, now, &mut timers) {
            Ok(feed) => Box::new(feed),
            Err(e) => {
                warn!(url, "connection failed: {}", e);
                let message = format!("Could not connect to {url}");
                let reason = e.to_string();
                display_error_and_wait(term, &[message.as_str(), "", reason.as_str(), "", "Press q to quit"])?;
                return Ok(());
            }
        },
        None => Box::new(ScriptedFeed::new(options.round_time, seed, now)),
    };

    let (audio, status): (Option<Box<dyn AudioSource>>, AudioStatus) = if options.demo {
        (Some(Box::new(SyntheticSource::new(seed))), AudioStatus::Loaded)
    } else {
        let opened = open_capture();
        let status = AudioStatus::from_result(&opened);
        (opened.ok(), status)
    };
    term.clear_screen()?;

    let controller = RoomController::new(session, status);
    let mut room = Room::new(controller, feed, audio, timers);
    let result = event_loop(term, settings, store, &mut room, options, seed);
    room.close();
    result
}

fn event_loop(
    term: &mut Terminal,
    settings: &Settings,
    store: &mut dyn PreferenceStore,
    room: &mut Room,
    options: &RunOptions,
    seed: u64,
) -> Result<()> {
    let frame_time = settings.visualizer.frame_time.max(0.001);
    let mut state = VizState::new();
    let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9);
    let mut flash: Option<(String, Instant)> = None;
    let mut tick: u64 = 0;
    let (mut prev_w, mut prev_h) = term.size();

    loop {
        let started = Instant::now();
        let (width, height) = crossterm::terminal::size().unwrap_or(term.size());
        if width != prev_w || height != prev_h {
            term.resize(width, height);
            term.clear_screen()?;
            prev_w = width;
            prev_h = height;
        }

        while let Some((code, mods)) = term.check_key()? {
            if state.handle_key(code, mods) {
                return Ok(());
            }
        }

        if let Some(mode) = state.requested_mode.take() {
            room.set_mode(mode);
            flash = Some((format!("Visualizer: {mode}"), started));
        }
        if std::mem::take(&mut state.persist_mode) {
            let mode = room.controller().session().config().mode();
            let text = match store.set(VISUALIZER_KEY, mode.as_str(), VISUALIZER_TTL_DAYS) {
                Ok(()) => format!("Saved {mode} as default"),
                Err(e) => {
                    warn!("saving preference failed: {}", e);
                    format!("Could not save preference: {e}")
                }
            };
            flash = Some((text, started));
        }
        if let Some(step) = state.volume_step.take() {
            let volume = room.controller_mut().change_volume(step);
            flash = Some((volume_label(volume, false), started));
        }
        if std::mem::take(&mut state.toggle_mute) {
            let volume = room.controller_mut().toggle_mute();
            flash = Some((volume_label(volume, room.controller().is_muted()), started));
        }
        if std::mem::take(&mut state.simulate_guess) {
            let id = format!("local-{:04x}", rng.gen::<u16>());
            room.controller_mut().player_guessed(&id);
        }
        if std::mem::take(&mut state.retry_audio) {
            if options.demo {
                debug!("demo uses synthetic audio");
            } else if matches!(room.controller().audio_status(), AudioStatus::LoadError { .. }) {
                room.enable_audio(open_capture(), started);
            }
        }

        room.pump(started);
        if !state.paused {
            let drawn = room.draw(started, term);
            if drawn.is_none() && !room.controller().session().is_running() {
                paint_idle(term);
            }
        }

        term.compose();
        let bar = room.controller().timeline().progress();
        if room.controller().timeline().progress_active() || bar.width > 0.0 {
            render_progress_bar(term, height as i32 - 1, bar, room.controller().seconds_left(), tick);
        }
        if flash.as_ref().is_some_and(|(_, at)| started.duration_since(*at) > FLASH_DURATION) {
            flash = None;
        }
        let status = room
            .controller()
            .status()
            .or_else(|| flash.as_ref().map(|(text, _)| text.clone()))
            .or_else(|| (!room.is_connected()).then(|| "Disconnected from room".to_string()));
        if let Some(text) = status {
            render_status(term, 0, &text);
        }
        if state.paused {
            render_status(term, height as i32 / 2, "paused");
        }
        if state.show_help {
            render_help_overlay(term, HELP);
        }
        term.present()?;

        tick += 1;
        let remaining = frame_time - started.elapsed().as_secs_f32();
        if remaining > 0.0 {
            term.sleep(remaining);
        }
    }
}

/// Status flash for a volume change.
fn volume_label(volume: f64, muted: bool) -> String {
    if muted {
        "Volume: muted".to_string()
    } else {
        format!("Volume: {:.0}%", volume * 100.0)
    }
}

fn paint_idle(surface: &mut dyn DrawSurface) {
    let (w, h) = surface.size();
    surface.clear();
    surface.fill_rect(0.0, 0.0, w, h, Rgb::BACKGROUND);
}

/// Show centered lines until the user quits.
fn display_error_and_wait(term: &mut Terminal, lines: &[&str]) -> io::Result<()> {
    let mut state = VizState::new();
    term.clear();
    let (width, height) = term.size();
    let start_y = height as i32 / 2 - lines.len() as i32 / 2;

    for (i, line) in lines.iter().enumerate() {
        let x = width as i32 / 2 - line.chars().count() as i32 / 2;
        term.set_str(x, start_y + i as i32, line, None, false);
    }
    term.present()?;

    loop {
        if let Some((code, mods)) = term.check_key()? {
            if state.handle_key(code, mods) {
                return Ok(());
            }
        }
        term.sleep(ERROR_POLL_INTERVAL);
    }
}

/// Print or change the stored visualizer preference.
pub fn run_mode(store: &mut dyn PreferenceStore, value: Option<ModePreference>) -> Result<ModePreference> {
    match value {
        Some(mode) => {
            store.set(VISUALIZER_KEY, mode.as_str(), VISUALIZER_TTL_DAYS)?;
            info!(%mode, "visualizer preference stored");
            Ok(mode)
        }
        None => init_visualizer_preference(store),
    }
}
