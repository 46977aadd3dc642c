//! Room controller: turns game events into playback and visualizer changes.

use crate::audio::{AudioSource, AudioStatus};
use crate::events::{ClientEvent, GameEvent};
use crate::scheduler::{FrameHandle, FrameScheduler, TimerId, Timers};
use crate::surface::DrawSurface;
use crate::timeline::{PlaybackTimeline, TimelineAction};
use crate::viz::engine::{FrameStats, SessionEvent, VisualizerSession};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mutable collaborators lent to the controller for one call.
pub struct RoomContext<'a> {
    pub timers: &'a mut Timers,
    pub frames: &'a mut dyn FrameScheduler,
}

pub struct RoomController {
    session: VisualizerSession,
    timeline: PlaybackTimeline,
    audio: AudioStatus,
    pre_round_started: bool,
    main_started: bool,
    /// Last `timer` reading: seconds left and round length.
    clock: Option<(u32, u32)>,
    status: Option<String>,
    /// Volume to restore when unmuting.
    muted: Option<f64>,
}

impl RoomController {
    pub fn new(session: VisualizerSession, audio: AudioStatus) -> Self {
        let timeline = PlaybackTimeline::new(session.config().volume());
        let mut controller = Self {
            session,
            timeline,
            audio: AudioStatus::Loaded,
            pre_round_started: false,
            main_started: false,
            clock: None,
            status: None,
            muted: None,
        };
        controller.set_audio_status(audio);
        controller
    }

    /// Apply one server event. Returns the messages to send back.
    pub fn handle_event(&mut self, event: GameEvent, now: Instant, ctx: &mut RoomContext<'_>) -> Vec<ClientEvent> {
        let mut outgoing = Vec::new();
        match event {
            GameEvent::PlayerData { payload, .. } => {
                for player in payload.into_iter().filter(|p| p.guessed) {
                    self.session.handle(SessionEvent::PlayerGuessed(player.uuid));
                }
            }
            GameEvent::Timer { message, round_time, .. } => {
                self.status = None;
                self.clock = Some((message, round_time));
                if message == round_time + 3 {
                    self.pre_round_started = false;
                    self.main_started = false;
                }
                if message > round_time {
                    if !self.pre_round_started {
                        self.stop(false, now, ctx);
                        self.pre_round_started = true;
                    }
                } else if !self.main_started {
                    self.main_started = true;
                    self.play(0, round_time, now, ctx);
                }
            }
            GameEvent::NewTurn { .. } => {
                self.stop(true, now, ctx);
                self.session.handle(SessionEvent::RoundChanged);
                match &self.audio {
                    AudioStatus::Loaded => outgoing.push(ClientEvent::AudioLoaded),
                    AudioStatus::LoadError { code, message } => {
                        warn!(code, %message, "audio unavailable for new turn");
                    }
                }
            }
            GameEvent::NewRound { round } => {
                debug!(round, "new round");
                self.stop(true, now, ctx);
                self.session.handle(SessionEvent::RoundChanged);
            }
            GameEvent::ResumeAudio => {
                self.main_started = true;
                if let Some((left, round_time)) = self.clock {
                    self.play(round_time.saturating_sub(left), round_time, now, ctx);
                }
            }
            GameEvent::Loading => self.status = Some("Loading song...".to_string()),
            GameEvent::GameEnded | GameEvent::GameExit | GameEvent::GameKilled => {
                info!("game over");
                self.stop(true, now, ctx);
                self.status = Some("Game over".to_string());
            }
            GameEvent::Notify { message } => debug!(%message, "notify"),
            GameEvent::Scoreboard { .. } | GameEvent::Chat | GameEvent::Unknown => {}
        }
        outgoing
    }

    /// Start playback `elapsed` seconds into the round and the visualizer with it.
    fn play(&mut self, elapsed: u32, round_time: u32, now: Instant, ctx: &mut RoomContext<'_>) {
        if let AudioStatus::LoadError { .. } = self.audio {
            debug!("audio unavailable, not starting playback");
            return;
        }
        if self.timeline.play(elapsed as f64, round_time as f64, now, ctx.timers) {
            self.session.start(ctx.frames);
        }
    }

    fn stop(&mut self, fade: bool, now: Instant, ctx: &mut RoomContext<'_>) {
        for action in self.timeline.stop(fade, now, ctx.timers) {
            self.apply(action, ctx);
        }
    }

    fn apply(&mut self, action: TimelineAction, ctx: &mut RoomContext<'_>) {
        match action {
            TimelineAction::StopSound => debug!("sound stopped"),
            TimelineAction::CancelVisualizer => self.session.stop(ctx.frames),
        }
    }

    /// Route a fired timer. Returns `false` when it is not ours.
    pub fn on_timer(&mut self, id: TimerId, ctx: &mut RoomContext<'_>) -> bool {
        if !self.timeline.owns(id) {
            return false;
        }
        if let Some(action) = self.timeline.on_timer(id, ctx.timers) {
            self.apply(action, ctx);
        }
        true
    }

    /// Draw a frame if `handle` is the session's pending one.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now: Instant,
        audio: &mut dyn AudioSource,
        surface: &mut dyn DrawSurface,
        frames: &mut dyn FrameScheduler,
    ) -> Option<FrameStats> {
        audio.set_gain(self.timeline.gain(now) as f32);
        self.session.on_frame(handle, audio, surface, frames)
    }

    /// Replace the audio status; a failure shows the enable-audio prompt.
    pub fn set_audio_status(&mut self, status: AudioStatus) {
        if let AudioStatus::LoadError { code, message } = &status {
            warn!(code, %message, "audio failed to load");
        }
        self.audio = status;
    }

    pub fn audio_status(&self) -> &AudioStatus {
        &self.audio
    }

    /// Resume a round already under way, e.g. after audio was enabled.
    pub fn resume(&mut self, now: Instant, ctx: &mut RoomContext<'_>) {
        self.handle_event(GameEvent::ResumeAudio, now, ctx);
    }

    /// Simulated or local guess signal.
    pub fn player_guessed(&mut self, id: &str) {
        self.session.handle(SessionEvent::PlayerGuessed(id.to_string()));
    }

    pub fn shutdown(&mut self, ctx: &mut RoomContext<'_>) {
        debug!("room shutdown");
        self.timeline.halt(ctx.timers);
        self.session.stop(ctx.frames);
    }

    pub fn session(&self) -> &VisualizerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut VisualizerSession {
        &mut self.session
    }

    pub fn timeline(&self) -> &PlaybackTimeline {
        &self.timeline
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.session.config_mut().set_volume(volume);
        self.timeline.set_volume(self.session.config().volume());
        debug!(volume = self.volume(), "volume set");
    }

    pub fn volume(&self) -> f64 {
        self.session.config().volume()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.is_some()
    }

    /// Step the volume by `delta`, unmuting first. Returns the new volume.
    pub fn change_volume(&mut self, delta: f64) -> f64 {
        let base = self.muted.take().unwrap_or_else(|| self.volume());
        self.set_volume(((base + delta) * 100.0).round() / 100.0);
        self.volume()
    }

    /// Silence playback, or bring back the level it had before muting.
    pub fn toggle_mute(&mut self) -> f64 {
        match self.muted.take() {
            Some(level) => self.set_volume(level),
            None => {
                self.muted = Some(self.volume());
                self.set_volume(0.0);
            }
        }
        self.volume()
    }

    pub fn main_started(&self) -> bool {
        self.main_started
    }

    /// Seconds left in the current round, if known.
    pub fn seconds_left(&self) -> Option<u32> {
        self.clock.map(|(left, round_time)| left.min(round_time))
    }

    /// Line shown over the visualizer; the enable-audio prompt wins.
    pub fn status(&self) -> Option<String> {
        match &self.audio {
            AudioStatus::LoadError { message, .. } => {
                Some(format!("Audio unavailable ({message}). Press 'a' to enable audio."))
            }
            AudioStatus::Loaded => self.status.clone(),
        }
    }
}
