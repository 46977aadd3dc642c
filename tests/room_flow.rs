//! Server messages through the controller: playback, teardown and replies.

use guessviz::audio::AudioStatus;
use guessviz::config::{ModePreference, VisualizerConfig};
use guessviz::controller::{RoomContext, RoomController};
use guessviz::emblem::Emblem;
use guessviz::events::{ClientEvent, GameEvent};
use guessviz::scheduler::{FrameLoop, Timers};
use guessviz::viz::engine::VisualizerSession;
use std::time::{Duration, Instant};

struct Harness {
    controller: RoomController,
    timers: Timers,
    frames: FrameLoop,
    t0: Instant,
}

impl Harness {
    fn new(audio: AudioStatus) -> Self {
        let mut config = VisualizerConfig::default();
        config.set_mode(ModePreference::Bar);
        let session = VisualizerSession::new(config, Emblem::procedural(), Some(4));
        Self {
            controller: RoomController::new(session, audio),
            timers: Timers::new(),
            frames: FrameLoop::new(),
            t0: Instant::now(),
        }
    }

    fn send(&mut self, json: &str, at_ms: u64) -> Vec<ClientEvent> {
        let event = GameEvent::parse(json).expect("valid message");
        let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
        self.controller
            .handle_event(event, self.t0 + Duration::from_millis(at_ms), &mut ctx)
    }

    fn advance(&mut self, to_ms: u64) {
        for id in self.timers.poll(self.t0 + Duration::from_millis(to_ms)) {
            let mut ctx = RoomContext { timers: &mut self.timers, frames: &mut self.frames };
            self.controller.on_timer(id, &mut ctx);
        }
    }

    fn running(&self) -> bool {
        self.controller.session().is_running()
    }
}

fn timer(left: u32) -> String {
    format!(r#"{{"state":"timer","message":{left},"hint":"","scores":[],"round_time":30}}"#)
}

#[test]
fn countdown_then_round_starts_once() {
    let mut h = Harness::new(AudioStatus::Loaded);
    for (i, left) in (31..=33).rev().enumerate() {
        h.send(&timer(left), i as u64 * 1000);
        assert!(!h.running());
    }
    h.send(&timer(30), 3000);
    assert!(h.running());
    assert!(h.controller.timeline().progress_active());
    assert_eq!(h.timers.active_intervals(), 1);

    for left in (20..30).rev() {
        h.send(&timer(left), 3000 + (30 - left as u64) * 1000);
    }
    assert_eq!(h.timers.active_intervals(), 1, "one progress interval only");
    assert_eq!(h.controller.seconds_left(), Some(20));
}

#[test]
fn new_round_fades_and_cancels_after_six_seconds() {
    let mut h = Harness::new(AudioStatus::Loaded);
    h.send(&timer(30), 0);
    assert!(h.running());

    h.send(r#"{"state":"new_round","round":2}"#, 10_000);
    assert!(!h.controller.timeline().progress_active());

    h.advance(15_500);
    assert!(!h.controller.timeline().is_playing());
    assert!(h.running(), "visualizer outlives the sound by a second");

    h.advance(16_000);
    assert!(!h.running());
    assert_eq!(h.frames.pending(), 0);
    assert_eq!(h.timers.active_intervals(), 0);
    assert_eq!(h.timers.active_timeouts(), 0);
}

#[test]
fn new_turn_replies_audio_loaded() {
    let mut h = Harness::new(AudioStatus::Loaded);
    let replies = h.send(r#"{"state":"new_turn","not_guesser":"7"}"#, 0);
    assert_eq!(replies, vec![ClientEvent::AudioLoaded]);

    let mut muted = Harness::new(AudioStatus::LoadError { code: 2, message: "no device".into() });
    assert!(muted.send(r#"{"state":"new_turn"}"#, 0).is_empty());
    muted.send(&timer(30), 1000);
    assert!(!muted.running());
    assert!(muted.controller.status().is_some());
}

#[test]
fn guesses_blink_the_emblem() {
    let mut h = Harness::new(AudioStatus::Loaded);
    h.send(
        r#"{"state":"player_data","payload":[
            {"uuid":"a1","username":"x","guessed":true},
            {"uuid":"b2","username":"y","guessed":false}]}"#,
        0,
    );
    assert!(h.controller.session().blink_frames() > 0);
    assert_eq!(h.controller.session().particles().fades().len(), 1);
}

#[test]
fn killed_game_tears_down() {
    let mut h = Harness::new(AudioStatus::Loaded);
    h.send(&timer(30), 0);
    h.send(r#"{"state":"game-killed"}"#, 2000);
    assert_eq!(h.controller.status().as_deref(), Some("Game over"));
    h.advance(8_000);
    assert!(!h.running());

    let mut ctx = RoomContext { timers: &mut h.timers, frames: &mut h.frames };
    h.controller.shutdown(&mut ctx);
    assert_eq!(h.timers.active_timeouts(), 0);
}

#[test]
fn volume_keys_reach_the_running_fade() {
    let mut h = Harness::new(AudioStatus::Loaded);
    h.send(&timer(30), 0);
    let mid = h.t0 + Duration::from_millis(1000);
    assert_eq!(h.controller.volume(), 0.5);
    assert!((h.controller.timeline().gain(mid) - 0.25).abs() < 1e-9);

    assert_eq!(h.controller.change_volume(0.1), 0.6);
    assert!((h.controller.timeline().gain(mid) - 0.3).abs() < 1e-9);

    assert_eq!(h.controller.toggle_mute(), 0.0);
    assert!(h.controller.is_muted());
    assert_eq!(h.controller.timeline().gain(mid), 0.0);
    assert_eq!(h.controller.toggle_mute(), 0.6);
    assert!((h.controller.timeline().gain(mid) - 0.3).abs() < 1e-9);

    // stepping while muted starts from the muted level
    h.controller.toggle_mute();
    assert_eq!(h.controller.change_volume(-0.1), 0.5);
    assert!(!h.controller.is_muted());
    assert_eq!(h.controller.change_volume(1.0), 1.0);
}
