//! Snapshot cadence and building

use crate::ws::protocol::ServerMsg;

use super::simulator::Simulator;

/// Decides which ticks broadcast a snapshot and builds them
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    stats: SnapshotStats,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            stats: SnapshotStats::default(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (joins and leaves)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a full-roster snapshot message
    pub fn build(&mut self, simulator: &Simulator) -> ServerMsg {
        let players = simulator.snapshot();
        self.stats.record(players.len());
        ServerMsg::GameState { players }
    }

    pub fn stats(&self) -> &SnapshotStats {
        &self.stats
    }
}

/// Snapshot statistics for the health endpoint
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize) {
        self.total_snapshots += 1;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::ArenaRules;
    use uuid::Uuid;

    #[test]
    fn sends_every_nth_tick() {
        let mut builder = SnapshotBuilder::new(3);
        let sent: Vec<bool> = (0..9).map(|_| builder.should_send()).collect();
        assert_eq!(
            sent,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn force_next_sends_immediately() {
        let mut builder = SnapshotBuilder::new(3);
        assert!(!builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
        assert!(!builder.should_send());
    }

    #[test]
    fn interval_of_one_sends_every_tick() {
        let mut builder = SnapshotBuilder::new(0);
        assert!(builder.should_send());
        assert!(builder.should_send());
    }

    #[test]
    fn build_contains_full_roster() {
        let mut sim = Simulator::new(ArenaRules::default(), 8);
        sim.add_player(Uuid::new_v4());
        sim.add_player(Uuid::new_v4());
        let mut builder = SnapshotBuilder::new(3);

        let ServerMsg::GameState { players } = builder.build(&sim) else {
            panic!("expected game state");
        };
        assert_eq!(players.len(), 2);
        assert_eq!(builder.stats().total_snapshots, 1);
        assert_eq!(builder.stats().avg_players_per_snapshot, 2.0);
    }
}
