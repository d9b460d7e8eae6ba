//! Client-side player registry: snapshot reconciliation, remote
//! interpolation and local prediction

use std::collections::HashMap;

use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::combat::{AttackKind, AttackTimer, CombatSystem};
use crate::game::input::KeyState;
use crate::game::physics::{ArenaRules, Body, PhysicsSystem};
use crate::util::time::CLIENT_SAMPLE_INTERVAL_MS;
use crate::ws::protocol::{Facing, PlayerPublicState, ServerMsg};

/// Random `#rrggbb` display color
pub fn random_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=0xFF_FFFF);
    format!("#{:06x}", value)
}

/// A player as the client renders it
#[derive(Debug, Clone, PartialEq)]
pub struct ClientPlayer {
    pub id: Uuid,
    pub x: f32,
    pub height: f32,
    /// Screen-space y derived from height
    pub y: f32,
    pub horizontal_velocity: f32,
    pub vertical_velocity: f32,
    pub facing: Facing,
    pub is_jumping: bool,
    pub color: String,
    /// Visual-only attack state
    pub attack: AttackTimer,
    pub target_x: f32,
    pub target_height: f32,
    pub last_processed_input: u64,
    pub server_tick: u64,
}

impl ClientPlayer {
    fn from_public(state: &PlayerPublicState, color: String, rules: &ArenaRules) -> Self {
        Self {
            id: state.id,
            x: state.x,
            height: state.height,
            y: PhysicsSystem::derived_y(state.height, rules),
            horizontal_velocity: state.horizontal_velocity,
            vertical_velocity: state.vertical_velocity,
            facing: state.facing,
            is_jumping: state.is_jumping,
            color,
            attack: AttackTimer::default(),
            target_x: state.x,
            target_height: state.height,
            last_processed_input: state.last_processed_input,
            server_tick: state.server_tick,
        }
    }

    pub fn is_punching(&self) -> bool {
        self.attack.is_punching()
    }

    pub fn is_kicking(&self) -> bool {
        self.attack.is_kicking()
    }

    /// Take every authoritative field from the server. Color and the attack
    /// timer stay as they are.
    fn overwrite_authoritative(&mut self, state: &PlayerPublicState, rules: &ArenaRules) {
        self.x = state.x;
        self.height = state.height;
        self.y = PhysicsSystem::derived_y(state.height, rules);
        self.horizontal_velocity = state.horizontal_velocity;
        self.vertical_velocity = state.vertical_velocity;
        self.facing = state.facing;
        self.is_jumping = state.is_jumping;
        self.target_x = state.x;
        self.target_height = state.height;
        self.last_processed_input = state.last_processed_input;
        self.server_tick = state.server_tick;
    }

    fn body(&self) -> Body {
        Body {
            x: self.x,
            height: self.height,
            horizontal_velocity: self.horizontal_velocity,
            vertical_velocity: self.vertical_velocity,
            airborne: self.is_jumping,
        }
    }
}

/// Registry of every player the client knows about
#[derive(Debug, Clone)]
pub struct ClientWorld {
    rules: ArenaRules,
    tick_interval_ms: u64,
    tick: u64,
    local_id: Option<Uuid>,
    players: HashMap<Uuid, ClientPlayer>,
}

impl ClientWorld {
    pub fn new(rules: ArenaRules, tick_interval_ms: u64) -> Self {
        Self {
            rules,
            tick_interval_ms,
            tick: 0,
            local_id: None,
            players: HashMap::new(),
        }
    }

    pub fn local_id(&self) -> Option<Uuid> {
        self.local_id
    }

    pub fn local_player(&self) -> Option<&ClientPlayer> {
        self.local_id.and_then(|id| self.players.get(&id))
    }

    pub fn player(&self, id: &Uuid) -> Option<&ClientPlayer> {
        self.players.get(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &ClientPlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Dispatch a server message
    pub fn handle(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::Init { player_id, players } => self.apply_init(*player_id, players),
            ServerMsg::PlayerJoined(state) => self.apply_player_joined(state),
            ServerMsg::PlayerLeft { id } => self.apply_player_left(id),
            ServerMsg::GameState { players } => self.apply_snapshot(players),
            ServerMsg::PlayerPunched { id } => self.apply_action(id, AttackKind::Punch),
            ServerMsg::PlayerKicked { id } => self.apply_action(id, AttackKind::Kick),
            ServerMsg::Pong { .. } => {}
            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Server error");
            }
        }
    }

    /// Replace the registry and adopt the assigned id
    pub fn apply_init(&mut self, player_id: Uuid, players: &[PlayerPublicState]) {
        self.local_id = Some(player_id);
        self.players.clear();
        for state in players {
            self.insert(state);
        }
        debug!(player_id = %player_id, players = self.players.len(), "Initialized world");
    }

    pub fn apply_player_joined(&mut self, state: &PlayerPublicState) {
        if self.players.contains_key(&state.id) {
            return;
        }
        self.insert(state);
    }

    pub fn apply_player_left(&mut self, id: &Uuid) {
        self.players.remove(id);
    }

    /// Merge an authoritative snapshot.
    ///
    /// The local player takes every authoritative field but keeps its color
    /// and attack animation. Unknown remote players are created at the
    /// snapshot position; known ones only get new interpolation targets.
    pub fn apply_snapshot(&mut self, players: &[PlayerPublicState]) {
        for state in players {
            let is_local = self.local_id == Some(state.id);

            let Some(player) = self.players.get_mut(&state.id) else {
                self.insert(state);
                continue;
            };

            if is_local {
                player.overwrite_authoritative(state, &self.rules);
            } else {
                player.target_x = state.x;
                player.target_height = state.height;
                player.facing = state.facing;
                player.last_processed_input = state.last_processed_input;
                player.server_tick = state.server_tick;
            }
        }
    }

    /// Start a visual attack on a player
    pub fn apply_action(&mut self, id: &Uuid, kind: AttackKind) {
        let now = self.tick;
        let interval = self.tick_interval_ms;
        if let Some(player) = self.players.get_mut(id) {
            player.attack.trigger(kind, now, interval);
        }
    }

    /// Move the world clock forward and expire finished attacks
    pub fn advance(&mut self, tick: u64) {
        self.tick = self.tick.max(tick);
        for player in self.players.values_mut() {
            player.attack.expire(self.tick);
        }
    }

    /// Move every remote player toward its target. 1.0 snaps.
    pub fn interpolate(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        for player in self.players.values_mut() {
            if Some(player.id) == self.local_id {
                continue;
            }
            player.x += (player.target_x - player.x) * factor;
            player.height += (player.target_height - player.height) * factor;
            player.y = PhysicsSystem::derived_y(player.height, &self.rules);
        }
    }

    /// Step the local player with the server's movement rules until the next
    /// snapshot overwrites it
    pub fn predict_local(&mut self, keys: KeyState) {
        let Some(id) = self.local_id else {
            return;
        };
        let now = self.tick;
        let interval = self.tick_interval_ms;
        let rules = self.rules;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        let mut body = player.body();
        PhysicsSystem::step(&mut body, keys, &rules);
        player.x = body.x;
        player.height = body.height;
        player.y = PhysicsSystem::derived_y(body.height, &rules);
        player.horizontal_velocity = body.horizontal_velocity;
        player.vertical_velocity = body.vertical_velocity;
        player.is_jumping = body.airborne;
        player.target_x = body.x;
        player.target_height = body.height;

        let (punching, kicking) = CombatSystem::attack_flags(keys);
        if punching {
            player.attack.trigger(AttackKind::Punch, now, interval);
        } else if kicking {
            player.attack.trigger(AttackKind::Kick, now, interval);
        }
    }

    fn insert(&mut self, state: &PlayerPublicState) {
        self.players
            .insert(state.id, ClientPlayer::from_public(state, random_color(), &self.rules));
    }
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new(ArenaRules::default(), CLIENT_SAMPLE_INTERVAL_MS)
    }
}
