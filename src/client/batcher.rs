//! Client input batching with record-on-change and edge-triggered attacks

use std::collections::VecDeque;

use tracing::debug;

use crate::game::combat::{AttackKind, AttackTimer};
use crate::game::input::{InputSample, Key, KeyState};
use crate::util::time::CLIENT_SAMPLE_INTERVAL_MS;
use crate::ws::protocol::{ClientMsg, InputBatch, InputEntry};

/// Shortest and longest supported sampling interval
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 25;
pub const MAX_SAMPLE_INTERVAL_MS: u64 = 50;

/// Default bound on recorded entries waiting to be sent
pub const DEFAULT_PENDING_CAPACITY: usize = 64;

/// Samples local key state once per interval and ships the changes in batches.
///
/// Movement keys are level-triggered. Punch and kick are edge-triggered: a
/// press starts a timed attack that stays in the recorded key state until it
/// expires, and holding the key does not retrigger it.
#[derive(Debug, Clone)]
pub struct InputBatcher {
    /// Physically held keys
    held: KeyState,
    attack: AttackTimer,
    tick: u64,
    next_sequence: u32,
    last_recorded: Option<KeyState>,
    pending: VecDeque<InputEntry>,
    capacity: usize,
    interval_ms: u64,
    dropped: u64,
}

impl InputBatcher {
    pub fn new(interval_ms: u64, capacity: usize) -> Self {
        Self {
            held: KeyState::NONE,
            attack: AttackTimer::default(),
            tick: 0,
            next_sequence: 1,
            last_recorded: None,
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            interval_ms: interval_ms.clamp(MIN_SAMPLE_INTERVAL_MS, MAX_SAMPLE_INTERVAL_MS),
            dropped: 0,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Local tick of the most recent sample
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Entries evicted because the outgoing buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn press(&mut self, key: Key) {
        let was_down = self.held.is_down(key);
        self.held.set(key, true);

        if was_down {
            return;
        }

        let kind = match key {
            Key::Punch => AttackKind::Punch,
            Key::Kick => AttackKind::Kick,
            _ => return,
        };
        if !self.attack.trigger(kind, self.tick, self.interval_ms) {
            debug!(?kind, "Attack ignored, another attack in progress");
        }
    }

    pub fn release(&mut self, key: Key) {
        self.held.set(key, false);
    }

    /// Key state the next sample would record
    pub fn effective_keys(&self) -> KeyState {
        KeyState::NONE
            .with(Key::Left, self.held.is_down(Key::Left))
            .with(Key::Right, self.held.is_down(Key::Right))
            .with(Key::Jump, self.held.is_down(Key::Jump))
            .with(Key::Punch, self.attack.is_punching())
            .with(Key::Kick, self.attack.is_kicking())
    }

    /// Advance the local tick and record the key state if it changed.
    /// Returns the recorded sample, if any.
    pub fn sample(&mut self) -> Option<InputSample> {
        self.tick += 1;
        self.attack.expire(self.tick);

        let keys = self.effective_keys();
        if self.last_recorded == Some(keys) {
            return None;
        }
        self.last_recorded = Some(keys);

        let sample = InputSample {
            tick: self.tick,
            keys,
            sequence: Some(self.next_sequence),
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.pending.push_back(sample.into());
        if self.pending.len() > self.capacity {
            self.pending.pop_front();
            self.dropped += 1;
        }

        Some(sample)
    }

    /// One interval elapsed: sample, then ship whatever is pending
    pub fn on_interval(&mut self) -> Option<ClientMsg> {
        self.sample();
        self.flush()
    }

    /// Ship all pending entries immediately. The live key state is kept.
    pub fn flush(&mut self) -> Option<ClientMsg> {
        if self.pending.is_empty() {
            return None;
        }

        let inputs: Vec<InputEntry> = self.pending.drain(..).collect();
        Some(ClientMsg::PlayerInputBatch(InputBatch::Batch { inputs }))
    }
}

impl Default for InputBatcher {
    fn default() -> Self {
        Self::new(CLIENT_SAMPLE_INTERVAL_MS, DEFAULT_PENDING_CAPACITY)
    }
}
