use thiserror::Error;

/// Errors surfaced by the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse {path}: {source}")]
    Settings {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write preferences: {0}")]
    Preferences(#[from] toml::ser::Error),

    #[error("invalid visualizer mode {0:?} (expected random, circle or bar)")]
    InvalidMode(String),

    #[error("failed to load image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

impl Error {
    /// Numeric code reported with audio load failures.
    pub fn code(&self) -> i32 {
        match self {
            Error::Io(_) => 1,
            Error::AudioDevice(_) => 2,
            Error::AudioStream(_) => 3,
            Error::WebSocket(_) => 4,
            Error::Json(_) => 5,
            Error::Settings { .. } | Error::Preferences(_) => 6,
            Error::InvalidMode(_) => 7,
            Error::Image { .. } => 8,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
