//! WebSocket protocol message definitions
//! These are the wire types for client-server communication. Every message is
//! a JSON object `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::input::{InputSample, Key, KeyState};

/// Largest batch accepted in one `playerInputBatch`
pub const MAX_BATCH_LEN: usize = 256;

/// Direction an avatar faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// One or more per-tick input samples
    PlayerInputBatch(InputBatch),

    /// Ping for latency measurement
    #[serde(rename_all = "camelCase")]
    Ping {
        /// Client timestamp, echoed back
        client_timestamp: u64,
    },
}

impl ClientMsg {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Payload of `playerInputBatch`: `{"inputs": [...]}`, a bare array of
/// entries, or a single entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBatch {
    Batch { inputs: Vec<InputEntry> },
    Entries(Vec<InputEntry>),
    Single(InputEntry),
}

impl InputBatch {
    /// Validate and convert into samples. Ticks within one batch must be
    /// strictly increasing.
    pub fn into_samples(self) -> Result<Vec<InputSample>, ProtocolError> {
        let entries = match self {
            InputBatch::Batch { inputs } | InputBatch::Entries(inputs) => inputs,
            InputBatch::Single(entry) => vec![entry],
        };

        if entries.is_empty() {
            return Err(ProtocolError::EmptyBatch);
        }
        if entries.len() > MAX_BATCH_LEN {
            return Err(ProtocolError::BatchTooLarge(entries.len()));
        }

        for pair in entries.windows(2) {
            if pair[1].current_tick <= pair[0].current_tick {
                return Err(ProtocolError::NonMonotonicTicks {
                    previous: pair[0].current_tick,
                    next: pair[1].current_tick,
                });
            }
        }

        Ok(entries.into_iter().map(InputSample::from).collect())
    }
}

/// One tick of client input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEntry {
    #[serde(default)]
    pub keys_pressed: KeysPressed,
    pub current_tick: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

impl From<InputEntry> for InputSample {
    fn from(entry: InputEntry) -> Self {
        InputSample {
            tick: entry.current_tick,
            keys: entry.keys_pressed.into(),
            sequence: entry.sequence_number,
        }
    }
}

impl From<InputSample> for InputEntry {
    fn from(sample: InputSample) -> Self {
        InputEntry {
            keys_pressed: sample.keys.into(),
            current_tick: sample.tick,
            sequence_number: sample.sequence,
        }
    }
}

/// Keyboard-shaped key map. Missing keys read as released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeysPressed {
    #[serde(rename = "ArrowLeft", default)]
    pub arrow_left: bool,
    #[serde(rename = "ArrowRight", default)]
    pub arrow_right: bool,
    #[serde(rename = "ArrowUp", default)]
    pub arrow_up: bool,
    #[serde(rename = "KeyP", default)]
    pub key_p: bool,
    #[serde(rename = "KeyK", default)]
    pub key_k: bool,
}

impl From<KeysPressed> for KeyState {
    fn from(keys: KeysPressed) -> Self {
        KeyState::NONE
            .with(Key::Left, keys.arrow_left)
            .with(Key::Right, keys.arrow_right)
            .with(Key::Jump, keys.arrow_up)
            .with(Key::Punch, keys.key_p)
            .with(Key::Kick, keys.key_k)
    }
}

impl From<KeyState> for KeysPressed {
    fn from(state: KeyState) -> Self {
        KeysPressed {
            arrow_left: state.is_down(Key::Left),
            arrow_right: state.is_down(Key::Right),
            arrow_up: state.is_down(Key::Jump),
            key_p: state.is_down(Key::Punch),
            key_k: state.is_down(Key::Kick),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Sent once to a new connection
    #[serde(rename_all = "camelCase")]
    Init {
        player_id: Uuid,
        players: Vec<PlayerPublicState>,
    },

    /// A player joined the arena
    PlayerJoined(PlayerPublicState),

    /// A player left the arena
    PlayerLeft { id: Uuid },

    /// Authoritative snapshot of every connected player
    GameState { players: Vec<PlayerPublicState> },

    /// Visual-only action triggers
    PlayerPunched { id: Uuid },
    PlayerKicked { id: Uuid },

    /// Pong response
    #[serde(rename_all = "camelCase")]
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    /// Wire event name, for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMsg::Init { .. } => "init",
            ServerMsg::PlayerJoined(_) => "playerJoined",
            ServerMsg::PlayerLeft { .. } => "playerLeft",
            ServerMsg::GameState { .. } => "gameState",
            ServerMsg::PlayerPunched { .. } => "playerPunched",
            ServerMsg::PlayerKicked { .. } => "playerKicked",
            ServerMsg::Pong { .. } => "pong",
            ServerMsg::Error { .. } => "error",
        }
    }
}

/// Public per-player state carried in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPublicState {
    pub id: Uuid,
    pub x: f32,
    pub height: f32,
    pub facing: Facing,
    pub is_jumping: bool,
    pub is_kicking: bool,
    pub is_punching: bool,
    pub vertical_velocity: f32,
    pub horizontal_velocity: f32,
    pub last_processed_input: u64,
    pub server_tick: u64,
}

/// Protocol errors on inbound messages
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Input batch is empty")]
    EmptyBatch,

    #[error("Input batch has {0} entries, over the per-batch limit")]
    BatchTooLarge(usize),

    #[error("Input ticks not strictly increasing ({previous} then {next})")]
    NonMonotonicTicks { previous: u64, next: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_batched_input() {
        let text = json!({
            "event": "playerInputBatch",
            "data": {
                "inputs": [
                    { "keysPressed": { "ArrowRight": true }, "currentTick": 4, "sequenceNumber": 1 },
                    { "keysPressed": { "ArrowRight": true, "ArrowUp": true }, "currentTick": 6 }
                ],
                "batchId": 123
            }
        })
        .to_string();

        let ClientMsg::PlayerInputBatch(batch) = ClientMsg::parse(&text).unwrap() else {
            panic!("expected input batch");
        };
        let samples = batch.into_samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].tick, 4);
        assert_eq!(samples[0].sequence, Some(1));
        assert!(samples[0].keys.is_down(Key::Right));
        assert!(!samples[0].keys.is_down(Key::Left));
        assert!(samples[1].keys.is_down(Key::Jump));
        assert_eq!(samples[1].sequence, None);
    }

    #[test]
    fn parses_bare_entry_array() {
        let text = json!({
            "event": "playerInputBatch",
            "data": [
                { "keysPressed": { "ArrowRight": true }, "currentTick": 1 },
                { "keysPressed": { "ArrowRight": true, "KeyK": true }, "currentTick": 2 }
            ]
        })
        .to_string();

        let ClientMsg::PlayerInputBatch(batch) = ClientMsg::parse(&text).unwrap() else {
            panic!("expected input batch");
        };
        let samples = batch.into_samples().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].tick, 1);
        assert!(samples[0].keys.is_down(Key::Right));
        assert!(samples[1].keys.is_down(Key::Kick));

        let backwards = r#"{"event":"playerInputBatch","data":[{"currentTick":4},{"currentTick":3}]}"#;
        let ClientMsg::PlayerInputBatch(batch) = ClientMsg::parse(backwards).unwrap() else {
            panic!("expected input batch");
        };
        assert!(matches!(
            batch.into_samples(),
            Err(ProtocolError::NonMonotonicTicks { previous: 4, next: 3 })
        ));
    }

    #[test]
    fn parses_single_entry() {
        let text = r#"{"event":"playerInputBatch","data":{"keysPressed":{"KeyP":true},"currentTick":9}}"#;
        let ClientMsg::PlayerInputBatch(batch) = ClientMsg::parse(text).unwrap() else {
            panic!("expected input batch");
        };
        let samples = batch.into_samples().unwrap();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].keys.is_down(Key::Punch));
    }

    #[test]
    fn rejects_non_monotonic_batch() {
        let batch = InputBatch::Batch {
            inputs: vec![
                InputEntry {
                    keys_pressed: KeysPressed::default(),
                    current_tick: 5,
                    sequence_number: None,
                },
                InputEntry {
                    keys_pressed: KeysPressed::default(),
                    current_tick: 5,
                    sequence_number: None,
                },
            ],
        };
        assert!(matches!(
            batch.into_samples(),
            Err(ProtocolError::NonMonotonicTicks { previous: 5, next: 5 })
        ));
        assert!(matches!(
            InputBatch::Batch { inputs: vec![] }.into_samples(),
            Err(ProtocolError::EmptyBatch)
        ));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(ClientMsg::parse("not json").is_err());
        assert!(ClientMsg::parse(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(ClientMsg::parse(r#"{"event":"playerInputBatch","data":{"keysPressed":{}}}"#).is_err());
    }

    #[test]
    fn game_state_uses_camel_case_fields() {
        let id = Uuid::new_v4();
        let msg = ServerMsg::GameState {
            players: vec![PlayerPublicState {
                id,
                x: 100.0,
                height: 0.0,
                facing: Facing::Left,
                is_jumping: false,
                is_kicking: false,
                is_punching: true,
                vertical_velocity: 0.0,
                horizontal_velocity: 5.0,
                last_processed_input: 12,
                server_tick: 99,
            }],
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "gameState");
        let player = &value["data"]["players"][0];
        assert_eq!(player["id"], id.to_string());
        assert_eq!(player["facing"], "left");
        assert_eq!(player["isPunching"], true);
        assert_eq!(player["horizontalVelocity"], 5.0);
        assert_eq!(player["lastProcessedInput"], 12);
        assert_eq!(player["serverTick"], 99);
    }

    #[test]
    fn init_and_pong_field_names() {
        let id = Uuid::new_v4();
        let init = serde_json::to_value(ServerMsg::Init {
            player_id: id,
            players: vec![],
        })
        .unwrap();
        assert_eq!(init["event"], "init");
        assert_eq!(init["data"]["playerId"], id.to_string());

        let pong = serde_json::to_value(ServerMsg::Pong {
            client_timestamp: 1,
            server_timestamp: 2,
        })
        .unwrap();
        assert_eq!(pong["data"]["clientTimestamp"], 1);
        assert_eq!(pong["data"]["serverTimestamp"], 2);
    }
}
