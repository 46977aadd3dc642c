//! Sources of game events: the room websocket, or a scripted game offline.

use crate::error::Result;
use crate::events::{ClientEvent, GameEvent, PlayerInfo};
use crate::scheduler::{TimerId, Timers};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tungstenite::{connect, stream::MaybeTlsStream, Message, WebSocket};

/// Keep-alive period of the room socket.
pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(40);

pub trait EventFeed {
    /// Drain every event available now. Never blocks.
    fn poll(&mut self, now: Instant) -> Result<Vec<GameEvent>>;

    fn send(&mut self, event: &ClientEvent) -> Result<()>;

    /// Handle a fired timer; returns `false` for ids the feed does not own.
    fn on_timer(&mut self, _id: TimerId) -> Result<bool> {
        Ok(false)
    }

    /// Release the connection and any timers held by the feed.
    fn close(&mut self, _timers: &mut Timers) {}

    fn is_connected(&self) -> bool {
        true
    }
}

/// Live room connection.
pub struct WsFeed {
    ws: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    keep_alive: Option<TimerId>,
}

impl WsFeed {
    pub fn connect(url: &str, now: Instant, timers: &mut Timers) -> Result<Self> {
        let (mut ws, response) = connect(url)?;
        match ws.get_mut() {
            MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true)?,
            MaybeTlsStream::NativeTls(stream) => stream.get_ref().set_nonblocking(true)?,
            _ => {}
        }
        info!(url, status = %response.status(), "connected to room");
        Ok(Self {
            ws: Some(ws),
            keep_alive: Some(timers.start_interval(KEEP_ALIVE_PERIOD, now)),
        })
    }

    fn write(&mut self, message: Message) -> Result<()> {
        let Some(ws) = self.ws.as_mut() else { return Ok(()) };
        match ws.send(message) {
            Ok(()) => Ok(()),
            // Queued; flushed on a later read or write.
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => {
                self.ws = None;
                Err(e.into())
            }
        }
    }
}

impl EventFeed for WsFeed {
    fn poll(&mut self, _now: Instant) -> Result<Vec<GameEvent>> {
        let mut texts = Vec::new();
        let mut disconnected = false;

        if let Some(ws) = &mut self.ws {
            loop {
                match ws.read() {
                    Ok(Message::Text(text)) => texts.push(text),
                    Ok(Message::Close(frame)) => {
                        info!(?frame, "room closed the connection");
                        disconnected = true;
                        break;
                    }
                    Ok(_) => continue,
                    Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("room socket error: {}", e);
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        if disconnected {
            self.ws = None;
        }

        let mut events = Vec::with_capacity(texts.len());
        for text in texts {
            match GameEvent::parse(&text) {
                Ok(event) => events.push(event),
                Err(e) => debug!("skipping malformed message: {}", e),
            }
        }
        Ok(events)
    }

    fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let text = event.to_json()?;
        debug!(%text, "send");
        self.write(Message::Text(text))
    }

    fn on_timer(&mut self, id: TimerId) -> Result<bool> {
        if self.keep_alive != Some(id) {
            return Ok(false);
        }
        self.write(Message::Ping(Vec::new()))?;
        Ok(true)
    }

    fn close(&mut self, timers: &mut Timers) {
        if let Some(id) = self.keep_alive.take() {
            timers.clear(id);
        }
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.close(None);
            let _ = ws.flush();
        }
    }

    fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

mod script {
    /// Players in the scripted room.
    pub const NAMES: [&str; 6] = ["ada", "brook", "cato", "dune", "ember", "fox"];
    pub const COUNTDOWN: u32 = 3;
    /// Pause between a round's end and the next turn.
    pub const INTERMISSION: u32 = 4;
    pub const GUESS_CHANCE: f64 = 0.12;
    /// Most recent client messages kept for inspection.
    pub const SENT_LOG: usize = 32;
}

/// Offline stand-in for a room: countdown, round timer and random guesses.
pub struct ScriptedFeed {
    rng: StdRng,
    round_time: u32,
    started: Instant,
    /// Seconds already emitted.
    emitted: u64,
    players: Vec<PlayerInfo>,
    round: u32,
    /// Last [`script::SENT_LOG`] messages sent, oldest first.
    sent: Vec<ClientEvent>,
}

impl ScriptedFeed {
    pub fn new(round_time: u32, seed: u64, now: Instant) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let players = script::NAMES
            .iter()
            .map(|name| {
                let uuid = format!("{:08x}-{:04x}", rng.gen::<u32>(), rng.gen::<u16>());
                PlayerInfo::new(uuid, *name)
            })
            .collect();
        Self {
            rng,
            round_time: round_time.max(1),
            started: now,
            emitted: 0,
            players,
            round: 0,
            sent: Vec::new(),
        }
    }

    fn cycle_len(&self) -> u64 {
        (script::COUNTDOWN + self.round_time + 1 + script::INTERMISSION) as u64
    }

    /// Events for second `t` since start.
    fn events_at(&mut self, t: u64) -> Vec<GameEvent> {
        let phase = (t % self.cycle_len()) as u32;
        let main_start = script::COUNTDOWN;
        let round_end = main_start + self.round_time + 1;
        let mut events = Vec::new();

        if phase == 0 {
            for p in &mut self.players {
                p.guessed = false;
            }
            events.push(GameEvent::NewTurn { not_guesser: None });
        }
        if phase < round_end {
            let message = self.round_time + script::COUNTDOWN - phase;
            events.push(GameEvent::Timer {
                message,
                hint: String::new(),
                scores: self.players.clone(),
                round_time: self.round_time,
            });
            if phase > main_start {
                let waiting: Vec<usize> = (0..self.players.len()).filter(|&i| !self.players[i].guessed).collect();
                if !waiting.is_empty() && self.rng.gen_bool(script::GUESS_CHANCE) {
                    let who = waiting[self.rng.gen_range(0..waiting.len())];
                    self.players[who].guessed = true;
                    self.players[who].points += 1;
                    events.push(GameEvent::PlayerData {
                        payload: self.players.clone(),
                        owner: self.players.first().map(|p| p.uuid.clone()),
                    });
                }
            }
        }
        if phase == round_end {
            self.round += 1;
            events.push(GameEvent::NewRound { round: self.round });
        }
        events
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    /// Messages the client sent, for inspection.
    pub fn sent(&self) -> &[ClientEvent] {
        &self.sent
    }
}

impl EventFeed for ScriptedFeed {
    fn poll(&mut self, now: Instant) -> Result<Vec<GameEvent>> {
        let elapsed = now.saturating_duration_since(self.started).as_secs();
        let mut events = Vec::new();
        while self.emitted <= elapsed {
            let t = self.emitted;
            events.extend(self.events_at(t));
            self.emitted += 1;
        }
        Ok(events)
    }

    fn send(&mut self, event: &ClientEvent) -> Result<()> {
        if self.sent.len() >= script::SENT_LOG {
            self.sent.remove(0);
        }
        self.sent.push(event.clone());
        Ok(())
    }
}
