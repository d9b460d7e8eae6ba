//! Arena task: owns the simulator and runs the authoritative tick loop

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::util::time::{tick_duration, unix_millis, SIMULATION_TPS, SNAPSHOT_EVERY_TICKS};
use crate::ws::protocol::ServerMsg;

use super::combat::AttackKind;
use super::input::InputSample;
use super::physics::ArenaRules;
use super::simulator::Simulator;
use super::snapshot::SnapshotBuilder;

/// Capacity of the inbound command channel shared by all connections
const COMMAND_CHANNEL_CAPACITY: usize = 1024;
/// Capacity of the fan-out channel; lagging receivers skip older messages
const BROADCAST_CHANNEL_CAPACITY: usize = 64;

/// Commands funneled from connection tasks into the tick loop
#[derive(Debug)]
pub enum ArenaCommand {
    Join {
        player_id: Uuid,
        /// Direct channel to this connection (init, pong, errors)
        outbox: mpsc::Sender<ServerMsg>,
    },
    Input {
        player_id: Uuid,
        samples: Vec<InputSample>,
    },
    Ping {
        player_id: Uuid,
        client_timestamp: u64,
    },
    Leave {
        player_id: Uuid,
    },
}

/// Fan-out envelope. `exclude` skips the connection that caused the message.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub msg: Arc<ServerMsg>,
    pub exclude: Option<Uuid>,
}

impl Broadcast {
    pub fn is_for(&self, player_id: &Uuid) -> bool {
        self.exclude.as_ref() != Some(player_id)
    }
}

/// Arena settings derived from configuration
#[derive(Debug, Clone)]
pub struct ArenaSettings {
    pub tick_rate: u32,
    pub snapshot_every: u32,
    pub input_queue_capacity: usize,
    pub max_players: usize,
    pub rules: ArenaRules,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            tick_rate: SIMULATION_TPS,
            snapshot_every: SNAPSHOT_EVERY_TICKS,
            input_queue_capacity: 64,
            max_players: 8,
            rules: ArenaRules::default(),
        }
    }
}

impl From<&Config> for ArenaSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick_rate: config.tick_rate,
            snapshot_every: config.snapshot_every,
            input_queue_capacity: config.input_queue_capacity,
            max_players: config.max_players,
            rules: ArenaRules::default().with_world_width(config.world_width),
        }
    }
}

/// Arena counters visible to the health endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArenaStats {
    pub players: usize,
    pub server_tick: u64,
    pub snapshots_sent: u64,
    pub avg_players_per_snapshot: f32,
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub command_tx: mpsc::Sender<ArenaCommand>,
    pub broadcast_tx: broadcast::Sender<Broadcast>,
    stats: Arc<RwLock<ArenaStats>>,
}

impl ArenaHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.broadcast_tx.subscribe()
    }

    pub fn stats(&self) -> ArenaStats {
        *self.stats.read()
    }
}

/// The authoritative arena
pub struct GameArena {
    simulator: Simulator,
    command_rx: mpsc::Receiver<ArenaCommand>,
    broadcast_tx: broadcast::Sender<Broadcast>,
    outboxes: HashMap<Uuid, mpsc::Sender<ServerMsg>>,
    snapshot_builder: SnapshotBuilder,
    stats: Arc<RwLock<ArenaStats>>,
    settings: ArenaSettings,
}

impl GameArena {
    /// Create a new arena
    pub fn new(settings: ArenaSettings) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        let stats = Arc::new(RwLock::new(ArenaStats::default()));

        let handle = ArenaHandle {
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            stats: stats.clone(),
        };

        let arena = Self {
            simulator: Simulator::new(settings.rules, settings.input_queue_capacity),
            command_rx,
            broadcast_tx,
            outboxes: HashMap::new(),
            snapshot_builder: SnapshotBuilder::new(settings.snapshot_every),
            stats,
            settings,
        };

        (arena, handle)
    }

    /// Run the authoritative tick loop until every command sender is dropped
    pub async fn run(mut self) {
        info!(
            tick_rate = self.settings.tick_rate,
            snapshot_every = self.settings.snapshot_every,
            "Arena started"
        );

        let mut tick_interval = interval(tick_duration(self.settings.tick_rate));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain command queue
            if !self.process_commands() {
                break;
            }

            // Run simulation tick and broadcast if needed
            self.run_tick();
        }

        info!(server_tick = self.simulator.tick(), "Arena stopped");
    }

    /// Drain pending commands. Returns false once all senders are gone.
    pub fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_command(&mut self, command: ArenaCommand) {
        match command {
            ArenaCommand::Join { player_id, outbox } => self.handle_join(player_id, outbox),
            ArenaCommand::Input { player_id, samples } => {
                self.simulator.enqueue_inputs(&player_id, samples);
            }
            ArenaCommand::Ping {
                player_id,
                client_timestamp,
            } => {
                self.send_to(
                    &player_id,
                    ServerMsg::Pong {
                        client_timestamp,
                        server_timestamp: unix_millis(),
                    },
                );
            }
            ArenaCommand::Leave { player_id } => self.handle_leave(player_id),
        }
    }

    /// Handle player join
    fn handle_join(&mut self, player_id: Uuid, outbox: mpsc::Sender<ServerMsg>) {
        if self.simulator.contains(&player_id) {
            warn!(player_id = %player_id, "Player already in arena");
            return;
        }

        if self.simulator.len() >= self.settings.max_players {
            let _ = outbox.try_send(ServerMsg::Error {
                code: "arena_full".to_string(),
                message: "Arena is full".to_string(),
            });
            warn!(player_id = %player_id, "Arena full, join rejected");
            return;
        }

        let server_tick = self.simulator.tick();
        let Some(player) = self.simulator.add_player(player_id) else {
            return;
        };
        let joined = player.to_public(server_tick);

        self.outboxes.insert(player_id, outbox);
        self.send_to(
            &player_id,
            ServerMsg::Init {
                player_id,
                players: self.simulator.snapshot(),
            },
        );
        self.broadcast(ServerMsg::PlayerJoined(joined), Some(player_id));
        self.snapshot_builder.force_next();

        info!(
            player_id = %player_id,
            player_count = self.simulator.len(),
            "Player joined arena"
        );
    }

    /// Handle player leave
    fn handle_leave(&mut self, player_id: Uuid) {
        self.outboxes.remove(&player_id);

        let Some(player) = self.simulator.remove_player(&player_id) else {
            debug!(player_id = %player_id, "Leave for unknown player ignored");
            return;
        };

        self.broadcast(ServerMsg::PlayerLeft { id: player_id }, None);
        self.snapshot_builder.force_next();

        info!(
            player_id = %player_id,
            discarded_inputs = player.queue.len(),
            player_count = self.simulator.len(),
            "Player left arena"
        );
    }

    /// Run a single simulation tick, then emit action events and, when due,
    /// a snapshot
    pub fn run_tick(&mut self) {
        let events = self.simulator.step();

        for event in events {
            let msg = match event.kind {
                AttackKind::Punch => ServerMsg::PlayerPunched { id: event.player_id },
                AttackKind::Kick => ServerMsg::PlayerKicked { id: event.player_id },
            };
            self.broadcast(msg, Some(event.player_id));
        }

        if self.snapshot_builder.should_send() && !self.simulator.is_empty() {
            let snapshot = self.snapshot_builder.build(&self.simulator);
            self.broadcast(snapshot, None);
        }

        self.publish_stats();
    }

    fn publish_stats(&self) {
        let snapshot_stats = self.snapshot_builder.stats();
        *self.stats.write() = ArenaStats {
            players: self.simulator.len(),
            server_tick: self.simulator.tick(),
            snapshots_sent: snapshot_stats.total_snapshots,
            avg_players_per_snapshot: snapshot_stats.avg_players_per_snapshot,
        };
    }

    /// Fire-and-forget fan-out. No receivers is not an error.
    fn broadcast(&self, msg: ServerMsg, exclude: Option<Uuid>) {
        let _ = self.broadcast_tx.send(Broadcast {
            msg: Arc::new(msg),
            exclude,
        });
    }

    /// Direct message to one connection, dropped if its outbox is full
    fn send_to(&mut self, player_id: &Uuid, msg: ServerMsg) {
        let Some(outbox) = self.outboxes.get(player_id) else {
            debug!(player_id = %player_id, "No outbox for player");
            return;
        };

        match outbox.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(player_id = %player_id, event = msg.event_name(), "Outbox full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(player_id = %player_id, "Outbox closed");
                self.outboxes.remove(player_id);
            }
        }
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::{Key, KeyState};
    use std::time::Duration;

    fn join(handle: &ArenaHandle) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let player_id = Uuid::new_v4();
        let (outbox, rx) = mpsc::channel(16);
        handle
            .command_tx
            .try_send(ArenaCommand::Join { player_id, outbox })
            .unwrap();
        (player_id, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Broadcast>) -> Vec<Broadcast> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn join_sends_init_and_announces_to_others() {
        let (mut arena, handle) = GameArena::new(ArenaSettings::default());
        let mut fanout = handle.subscribe();

        let (first, mut first_rx) = join(&handle);
        let (second, mut second_rx) = join(&handle);
        assert!(arena.process_commands());

        match first_rx.try_recv().unwrap() {
            ServerMsg::Init { player_id, players } => {
                assert_eq!(player_id, first);
                assert_eq!(players.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        match second_rx.try_recv().unwrap() {
            ServerMsg::Init { players, .. } => assert_eq!(players.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        let joined: Vec<Broadcast> = drain(&mut fanout);
        assert_eq!(joined.len(), 2);
        assert!(!joined[1].is_for(&second));
        assert!(joined[1].is_for(&first));
    }

    #[test]
    fn full_arena_rejects_join() {
        let settings = ArenaSettings {
            max_players: 1,
            ..ArenaSettings::default()
        };
        let (mut arena, handle) = GameArena::new(settings);
        let (_, _first_rx) = join(&handle);
        let (_, mut second_rx) = join(&handle);
        arena.process_commands();

        assert_eq!(arena.simulator().len(), 1);
        assert!(matches!(
            second_rx.try_recv().unwrap(),
            ServerMsg::Error { ref code, .. } if code == "arena_full"
        ));
    }

    #[test]
    fn snapshots_follow_cadence() {
        let (mut arena, handle) = GameArena::new(ArenaSettings::default());
        let mut fanout = handle.subscribe();
        let (_, _rx) = join(&handle);
        arena.process_commands();
        drain(&mut fanout);

        // Join forces the first tick to broadcast
        let mut snapshot_ticks = Vec::new();
        for tick in 1..=7 {
            arena.run_tick();
            if drain(&mut fanout)
                .iter()
                .any(|b| matches!(*b.msg, ServerMsg::GameState { .. }))
            {
                snapshot_ticks.push(tick);
            }
        }
        assert_eq!(snapshot_ticks, vec![1, 4, 7]);
        assert_eq!(handle.stats().snapshots_sent, 3);
        assert_eq!(handle.stats().server_tick, 7);
    }

    #[test]
    fn punch_is_broadcast_to_others_only() {
        let (mut arena, handle) = GameArena::new(ArenaSettings::default());
        let mut fanout = handle.subscribe();
        let (puncher, _rx) = join(&handle);
        arena.process_commands();
        drain(&mut fanout);

        handle
            .command_tx
            .try_send(ArenaCommand::Input {
                player_id: puncher,
                samples: vec![InputSample::new(1, KeyState::from_keys(&[Key::Punch]))],
            })
            .unwrap();
        arena.process_commands();
        arena.run_tick();

        let punches: Vec<Broadcast> = drain(&mut fanout)
            .into_iter()
            .filter(|b| matches!(*b.msg, ServerMsg::PlayerPunched { .. }))
            .collect();
        assert_eq!(punches.len(), 1);
        assert_eq!(*punches[0].msg, ServerMsg::PlayerPunched { id: puncher });
        assert!(!punches[0].is_for(&puncher));
    }

    #[test]
    fn leave_removes_player_and_broadcasts() {
        let (mut arena, handle) = GameArena::new(ArenaSettings::default());
        let mut fanout = handle.subscribe();
        let (player_id, _rx) = join(&handle);
        arena.process_commands();
        drain(&mut fanout);

        handle
            .command_tx
            .try_send(ArenaCommand::Leave { player_id })
            .unwrap();
        // Input arriving after the leave is ignored
        handle
            .command_tx
            .try_send(ArenaCommand::Input {
                player_id,
                samples: vec![InputSample::new(1, KeyState::NONE)],
            })
            .unwrap();
        arena.process_commands();

        assert!(arena.simulator().is_empty());
        let msgs = drain(&mut fanout);
        assert_eq!(msgs.len(), 1);
        assert_eq!(*msgs[0].msg, ServerMsg::PlayerLeft { id: player_id });
    }

    #[test]
    fn ping_answers_with_pong() {
        let (mut arena, handle) = GameArena::new(ArenaSettings::default());
        let (player_id, mut rx) = join(&handle);
        handle
            .command_tx
            .try_send(ArenaCommand::Ping {
                player_id,
                client_timestamp: 42,
            })
            .unwrap();
        arena.process_commands();

        let _init = rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            ServerMsg::Pong {
                client_timestamp, ..
            } => assert_eq!(client_timestamp, 42),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn run_loop_ticks_and_stops_when_senders_drop() {
        let (arena, handle) = GameArena::new(ArenaSettings::default());
        let mut fanout = handle.subscribe();
        let task = tokio::spawn(arena.run());

        let (_, mut rx) = join(&handle);
        let init = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(init, Some(ServerMsg::Init { .. })));

        let snapshot = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(b) = fanout.recv().await {
                    if let ServerMsg::GameState { players } = &*b.msg {
                        return players.len();
                    }
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(snapshot, 1);

        drop(handle);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
