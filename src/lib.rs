//! Terminal client visualizer for a multiplayer song-guessing game.

pub mod app;
pub mod audio;
pub mod colors;
pub mod config;
pub mod controller;
pub mod emblem;
pub mod error;
pub mod events;
pub mod feed;
pub mod help;
pub mod logging;
pub mod prefs;
pub mod scheduler;
pub mod settings;
pub mod surface;
pub mod terminal;
pub mod timeline;
pub mod viz;

pub use error::{Error, Result};
