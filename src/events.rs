//! Game-room messages exchanged with the server.

use serde::{Deserialize, Deserializer, Serialize};

/// One player as reported in `player_data` and `timer` payloads.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PlayerInfo {
    #[serde(deserialize_with = "id_string")]
    pub uuid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub guessed: bool,
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub disconnected: bool,
}

impl PlayerInfo {
    pub fn new(uuid: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            username: username.into(),
            ..Self::default()
        }
    }
}

/// Server to client, tagged by `state`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerData {
        #[serde(default)]
        payload: Vec<PlayerInfo>,
        #[serde(default, deserialize_with = "opt_id_string")]
        owner: Option<String>,
    },
    Timer {
        /// Seconds left, counting the pre-round countdown.
        message: u32,
        #[serde(default)]
        hint: String,
        #[serde(default)]
        scores: Vec<PlayerInfo>,
        round_time: u32,
    },
    NewTurn {
        #[serde(default, deserialize_with = "opt_id_string")]
        not_guesser: Option<String>,
    },
    NewRound {
        #[serde(default)]
        round: u32,
    },
    Loading,
    ResumeAudio,
    GameEnded,
    GameExit,
    #[serde(rename = "game-killed")]
    GameKilled,
    Scoreboard {
        #[serde(default)]
        round: u32,
        #[serde(default)]
        max_rounds: u32,
    },
    Chat,
    Notify {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

impl GameEvent {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Client to server, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    AudioLoaded,
}

impl ClientEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Player ids arrive as strings but older servers sent numbers.
fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_player_data() {
        let ev = GameEvent::parse(
            r#"{"state":"player_data","owner":"17","payload":[
                {"uuid":"17","username":"a","points":3,"prev_points":0,"streak":1,
                 "emoji":"x","loaded":true,"guessed":true,"disconnected":false},
                {"uuid":42,"username":"b"}]}"#,
        )
        .unwrap();
        match ev {
            GameEvent::PlayerData { payload, owner } => {
                assert_eq!(owner.as_deref(), Some("17"));
                assert!(payload[0].guessed);
                assert_eq!(payload[1].uuid, "42");
                assert!(!payload[1].guessed);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_timer_and_unit_states() {
        let ev = GameEvent::parse(r#"{"state":"timer","message":33,"hint":"_ _","scores":[],"round_time":30}"#)
            .unwrap();
        assert!(matches!(ev, GameEvent::Timer { message: 33, round_time: 30, .. }));
        assert_eq!(GameEvent::parse(r#"{"state":"loading"}"#).unwrap(), GameEvent::Loading);
        assert_eq!(GameEvent::parse(r#"{"state":"game-killed"}"#).unwrap(), GameEvent::GameKilled);
        assert_eq!(
            GameEvent::parse(r#"{"state":"new_round","round":2}"#).unwrap(),
            GameEvent::NewRound { round: 2 }
        );
    }

    #[test]
    fn unknown_states_are_tolerated() {
        assert_eq!(
            GameEvent::parse(r#"{"state":"emoteReaction","uuid":"1","reaction":"x"}"#).unwrap(),
            GameEvent::Unknown
        );
        assert!(GameEvent::parse("not json").is_err());
        assert!(GameEvent::parse(r#"{"message":1}"#).is_err());
    }

    #[test]
    fn audio_loaded_wire_format() {
        assert_eq!(ClientEvent::AudioLoaded.to_json().unwrap(), r#"{"type":"audio-loaded"}"#);
    }
}
