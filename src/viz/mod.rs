//! Audio-reactive visualizer.
//!
//! `spectrum` and `amplitude` hold the numeric pipeline, `particles` the
//! simulation, `engine` the per-frame session that ties them to a surface.

pub mod amplitude;
pub mod engine;
pub mod particles;
pub mod screen;
pub mod spectrum;

use crate::config::ModePreference;
use crossterm::event::{KeyCode, KeyModifiers};

/// Interactive controls of the terminal front end.
#[derive(Debug, Default)]
pub struct VizState {
    pub paused: bool,
    pub show_help: bool,
    /// Mode switch requested by the user, consumed by the run loop.
    pub requested_mode: Option<ModePreference>,
    /// Pretend a player guessed (demo only).
    pub simulate_guess: bool,
    /// Save the current mode as the stored preference.
    pub persist_mode: bool,
    /// Try to open the audio device again.
    pub retry_audio: bool,
    /// Volume step requested by the user.
    pub volume_step: Option<f64>,
    pub toggle_mute: bool,
}

/// Volume change per key press.
pub const VOLUME_STEP: f64 = 0.1;

impl VizState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle keypress, returns true if should quit
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char(' ') => self.paused = !self.paused,
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Char('c') => self.requested_mode = Some(ModePreference::Circle),
            KeyCode::Char('b') => self.requested_mode = Some(ModePreference::Bar),
            KeyCode::Char('r') => self.requested_mode = Some(ModePreference::Random),
            KeyCode::Char('s') => self.persist_mode = true,
            KeyCode::Char('g') => self.simulate_guess = true,
            KeyCode::Char('a') => self.retry_audio = true,
            KeyCode::Char('+') | KeyCode::Char('=') => self.volume_step = Some(VOLUME_STEP),
            KeyCode::Char('-') => self.volume_step = Some(-VOLUME_STEP),
            KeyCode::Char('m') => self.toggle_mute = !self.toggle_mute,
            _ => {}
        }
        false
    }
}

pub const HELP: &str = "\
guessviz
─────────────────
c       circle visualizer
b       bar visualizer
r       random visualizer
s       save mode as default
g       simulate a guess (demo)
a       enable audio
+/-     volume up/down
m       mute
Space   pause
?       toggle help
q/Esc   quit";
