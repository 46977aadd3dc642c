//! End-to-end frames of a visualizer session against a recording surface.

use guessviz::audio::AudioSource;
use guessviz::config::{ModePreference, VisualizerConfig};
use guessviz::emblem::Emblem;
use guessviz::scheduler::{FrameLoop, FrameScheduler};
use guessviz::surface::{DrawOp, Recorder};
use guessviz::viz::engine::{FrameStats, SessionState, VisualizerSession};
use guessviz::viz::particles::TARGET_PARTICLES;

/// Every bin at the same level.
struct Level(u8);

impl AudioSource for Level {
    fn frequency_data(&mut self, max_bins: usize) -> Vec<u8> {
        vec![self.0; max_bins]
    }

    fn is_suspended(&self) -> bool {
        false
    }
}

fn circle_session(seed: u64) -> VisualizerSession {
    let mut config = VisualizerConfig::default();
    config.set_mode(ModePreference::Circle);
    VisualizerSession::new(config, Emblem::procedural(), Some(seed))
}

fn frame(
    session: &mut VisualizerSession,
    level: u8,
    surface: &mut Recorder,
    frames: &mut FrameLoop,
) -> FrameStats {
    let due = frames.take_due();
    assert_eq!(due.len(), 1, "exactly one frame loop");
    session
        .on_frame(due[0], &mut Level(level), surface, frames)
        .expect("frame should draw")
}

#[test]
fn loud_frame_after_silence_shakes() {
    let mut frames = FrameLoop::new();
    let mut surface = Recorder::new(800.0, 600.0);
    let mut session = circle_session(11);
    session.start(&mut frames);

    for _ in 0..10 {
        let stats = frame(&mut session, 0, &mut surface, &mut frames);
        assert!(!stats.hit);
        assert_eq!(stats.shake, None);
    }
    surface.take_ops();

    let stats = frame(&mut session, 255, &mut surface, &mut frames);
    assert!(stats.hit);
    assert!((stats.amplitude - 3.8).abs() < 1e-9);
    let (dx, dy) = stats.shake.expect("loud frame shakes");
    // 800 px wide is screen class 2, shake modifier 0.7
    let reach = 3.8 * 0.7 * 4.0 + 1e-9;
    assert!((0.0..reach).contains(&dx) && (0.0..reach).contains(&dy));

    let ops = surface.take_ops();
    let translate = ops.iter().position(|op| *op == DrawOp::Translate { dx, dy }).expect("translated");
    let stroke = ops
        .iter()
        .position(|op| matches!(op, DrawOp::Stroke { .. }))
        .expect("ring stroked");
    let restore = ops.iter().position(|op| *op == DrawOp::Restore).expect("restored");
    // the ring shakes along with the emblem and particles
    assert!(translate < stroke && stroke < restore);
    assert_eq!(surface.save_depth(), 0);
}

#[test]
fn steady_level_never_shakes() {
    let mut frames = FrameLoop::new();
    let mut surface = Recorder::new(800.0, 600.0);
    let mut session = circle_session(3);
    session.start(&mut frames);

    for _ in 0..30 {
        let stats = frame(&mut session, 100, &mut surface, &mut frames);
        assert!(!stats.hit);
        assert_eq!(stats.shake, None);
    }
    assert!(!surface.ops.iter().any(|op| matches!(op, DrawOp::Translate { .. })));
    assert_eq!(session.amplitudes().len(), 30);
}

#[test]
fn particle_pool_is_refilled_every_frame() {
    let mut frames = FrameLoop::new();
    let mut surface = Recorder::new(800.0, 600.0);
    let mut session = circle_session(5);
    session.start(&mut frames);

    for level in [0, 255, 40, 255, 0, 180] {
        frame(&mut session, level, &mut surface, &mut frames);
        assert_eq!(session.particles().len(), TARGET_PARTICLES);
    }
}

#[test]
fn stop_leaves_nothing_scheduled() {
    let mut frames = FrameLoop::new();
    let mut surface = Recorder::new(800.0, 600.0);
    let mut session = circle_session(9);
    session.start(&mut frames);
    frame(&mut session, 50, &mut surface, &mut frames);

    session.stop(&mut frames);
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.pending_frame(), None);
    assert_eq!(frames.pending(), 0);

    // a restart begins from empty history
    session.start(&mut frames);
    assert!(session.amplitudes().is_empty());
    assert!(session.particles().is_empty());
    let handle = session.pending_frame().expect("restart schedules a frame");
    assert!(frames.cancel_frame(handle));
}
