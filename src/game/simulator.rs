//! Authoritative per-tick simulation of every player in the arena

use tracing::{debug, warn};
use uuid::Uuid;

use crate::ws::protocol::{Facing, PlayerPublicState};

use super::combat::{AttackKind, CombatSystem};
use super::input::{EnqueueOutcome, InputQueue, InputSample, MoveIntent};
use super::physics::{ArenaRules, Body, PhysicsSystem};

/// Player state in the arena (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub body: Body,
    pub facing: Facing,
    pub intent: MoveIntent,
    pub is_punching: bool,
    pub is_kicking: bool,

    // Input tracking
    pub last_processed_input: u64,
    /// Client tick of the last consumed sample
    pub last_acked_tick: Option<u64>,
    /// Reused whenever the queue runs dry
    pub last_input: InputSample,
    pub queue: InputQueue,
}

impl PlayerState {
    pub fn new(id: Uuid, spawn_x: f32, queue_capacity: usize) -> Self {
        Self {
            id,
            body: Body::at(spawn_x),
            facing: Facing::Right,
            intent: MoveIntent::None,
            is_punching: false,
            is_kicking: false,
            last_processed_input: 0,
            last_acked_tick: None,
            last_input: InputSample::default(),
            queue: InputQueue::new(queue_capacity),
        }
    }

    pub fn is_jumping(&self) -> bool {
        self.body.airborne
    }

    pub fn to_public(&self, server_tick: u64) -> PlayerPublicState {
        PlayerPublicState {
            id: self.id,
            x: self.body.x,
            height: self.body.height,
            facing: self.facing,
            is_jumping: self.is_jumping(),
            is_kicking: self.is_kicking,
            is_punching: self.is_punching,
            vertical_velocity: self.body.vertical_velocity,
            horizontal_velocity: self.body.horizontal_velocity,
            last_processed_input: self.last_processed_input,
            server_tick,
        }
    }

    /// Advance this player by one tick. Returns an attack that started this
    /// tick, if any.
    fn step(&mut self, rules: &ArenaRules) -> Option<AttackKind> {
        let sample = match self.queue.pop() {
            Some(sample) => {
                self.last_input = sample;
                self.last_processed_input = sample.ack_value();
                self.last_acked_tick = Some(sample.tick);
                sample
            }
            None => self.last_input,
        };

        self.intent = sample.keys.intent();
        PhysicsSystem::step(&mut self.body, sample.keys, rules);

        let (punching, kicking) = CombatSystem::attack_flags(sample.keys);
        let started =
            CombatSystem::rising_edge(self.is_punching, self.is_kicking, punching, kicking);
        self.is_punching = punching;
        self.is_kicking = kicking;
        started
    }
}

/// An attack that began this tick, broadcast for visual effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvent {
    pub player_id: Uuid,
    pub kind: AttackKind,
}

/// Outcome of queueing a batch for one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueReport {
    pub queued: usize,
    pub dropped: usize,
    pub evicted: usize,
}

/// Owns every player and advances them together, one tick at a time.
///
/// Players are kept in join order; facing ties and snapshot order follow it.
#[derive(Debug, Clone)]
pub struct Simulator {
    rules: ArenaRules,
    tick: u64,
    players: Vec<PlayerState>,
    queue_capacity: usize,
}

impl Simulator {
    pub fn new(rules: ArenaRules, queue_capacity: usize) -> Self {
        Self {
            rules,
            tick: 0,
            players: Vec::new(),
            queue_capacity,
        }
    }

    pub fn rules(&self) -> &ArenaRules {
        &self.rules
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.players.iter().any(|p| &p.id == id)
    }

    pub fn player(&self, id: &Uuid) -> Option<&PlayerState> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &Uuid) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    /// Spawn a player at the default position. Returns `None` if the id is
    /// already present.
    pub fn add_player(&mut self, id: Uuid) -> Option<&PlayerState> {
        if self.contains(&id) {
            return None;
        }
        self.players
            .push(PlayerState::new(id, self.rules.spawn_x, self.queue_capacity));
        self.players.last()
    }

    /// Remove a player along with any inputs still queued for it
    pub fn remove_player(&mut self, id: &Uuid) -> Option<PlayerState> {
        let idx = self.players.iter().position(|p| &p.id == id)?;
        Some(self.players.remove(idx))
    }

    /// Queue samples for a player. Unknown ids are ignored.
    pub fn enqueue_inputs(
        &mut self,
        id: &Uuid,
        samples: impl IntoIterator<Item = InputSample>,
    ) -> Option<EnqueueReport> {
        let Some(player) = self.player_mut(id) else {
            debug!(player_id = %id, "Input for unknown player ignored");
            return None;
        };

        let mut report = EnqueueReport::default();
        for sample in samples {
            match player.queue.push(sample) {
                EnqueueOutcome::Queued => report.queued += 1,
                EnqueueOutcome::QueuedWithEviction => {
                    report.queued += 1;
                    report.evicted += 1;
                }
                EnqueueOutcome::Stale | EnqueueOutcome::Duplicate => report.dropped += 1,
            }
        }

        if report.evicted > 0 {
            warn!(
                player_id = %id,
                evicted = report.evicted,
                total_evicted = player.queue.evicted(),
                "Input queue overflow, dropped oldest samples"
            );
        }
        if report.dropped > 0 {
            debug!(player_id = %id, dropped = report.dropped, "Dropped stale or duplicate samples");
        }

        Some(report)
    }

    /// Run a single simulation tick
    pub fn step(&mut self) -> Vec<ActionEvent> {
        self.tick += 1;

        let mut events = Vec::new();
        for player in self.players.iter_mut() {
            if let Some(kind) = player.step(&self.rules) {
                events.push(ActionEvent {
                    player_id: player.id,
                    kind,
                });
            }
        }

        self.update_facing();
        events
    }

    /// Face every player toward its nearest opponent by horizontal distance.
    /// The first minimum in join order wins ties.
    fn update_facing(&mut self) {
        let positions: Vec<f32> = self.players.iter().map(|p| p.body.x).collect();

        for (i, player) in self.players.iter_mut().enumerate() {
            let mut closest: Option<(f32, f32)> = None;
            for (j, &other_x) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                let distance = (other_x - player.body.x).abs();
                if closest.map_or(true, |(best, _)| distance < best) {
                    closest = Some((distance, other_x));
                }
            }

            if let Some((_, other_x)) = closest {
                player.facing = PhysicsSystem::facing_toward(player.body.x, other_x);
            }
        }
    }

    /// Public state of every player, in join order
    pub fn snapshot(&self) -> Vec<PlayerPublicState> {
        self.players
            .iter()
            .map(|p| p.to_public(self.tick))
            .collect()
    }
}
