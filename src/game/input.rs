//! Input samples, key state, and the per-player ordered input queue

use std::collections::VecDeque;

/// A single input key tracked by the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Jump,
    Punch,
    Kick,
}

impl Key {
    pub const ALL: [Key; 5] = [Key::Left, Key::Right, Key::Jump, Key::Punch, Key::Kick];

    fn bit(self) -> u8 {
        match self {
            Key::Left => 1 << 0,
            Key::Right => 1 << 1,
            Key::Jump => 1 << 2,
            Key::Punch => 1 << 3,
            Key::Kick => 1 << 4,
        }
    }
}

/// Key-state bitset for one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeyState(u8);

impl KeyState {
    pub const NONE: KeyState = KeyState(0);

    pub fn from_keys(keys: &[Key]) -> Self {
        let mut state = Self::NONE;
        for key in keys {
            state.set(*key, true);
        }
        state
    }

    pub fn is_down(self, key: Key) -> bool {
        self.0 & key.bit() != 0
    }

    pub fn set(&mut self, key: Key, down: bool) {
        if down {
            self.0 |= key.bit();
        } else {
            self.0 &= !key.bit();
        }
    }

    pub fn with(mut self, key: Key, down: bool) -> Self {
        self.set(key, down);
        self
    }

    /// Resolve horizontal movement intent. Both or neither pressed yields none.
    pub fn intent(self) -> MoveIntent {
        match (self.is_down(Key::Left), self.is_down(Key::Right)) {
            (true, false) => MoveIntent::Left,
            (false, true) => MoveIntent::Right,
            _ => MoveIntent::None,
        }
    }
}

/// Horizontal movement intent derived from the key state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveIntent {
    #[default]
    None,
    Left,
    Right,
}

impl MoveIntent {
    /// Sign of the resulting ground velocity
    pub fn direction(self) -> f32 {
        match self {
            MoveIntent::None => 0.0,
            MoveIntent::Left => -1.0,
            MoveIntent::Right => 1.0,
        }
    }
}

/// One client-side tick of input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSample {
    /// Client-local tick counter
    pub tick: u64,
    pub keys: KeyState,
    pub sequence: Option<u32>,
}

impl InputSample {
    pub fn new(tick: u64, keys: KeyState) -> Self {
        Self {
            tick,
            keys,
            sequence: None,
        }
    }

    /// Value reported back to the client as `lastProcessedInput`
    pub fn ack_value(&self) -> u64 {
        self.sequence.map(u64::from).unwrap_or(self.tick)
    }
}

/// Why a sample was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queued, but the oldest pending sample was evicted to make room
    QueuedWithEviction,
    /// Tick already consumed, or older than everything in a full queue
    Stale,
    /// Tick already waiting in the queue
    Duplicate,
}

/// Bounded, tick-ordered queue of pending samples for one player.
///
/// Batches may arrive duplicated or out of order; samples are kept sorted by
/// client tick and anything at or before the last consumed tick is dropped.
#[derive(Debug, Clone)]
pub struct InputQueue {
    pending: VecDeque<InputSample>,
    capacity: usize,
    last_consumed_tick: Option<u64>,
    evicted: u64,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
            last_consumed_tick: None,
            evicted: 0,
        }
    }

    pub fn push(&mut self, sample: InputSample) -> EnqueueOutcome {
        if matches!(self.last_consumed_tick, Some(last) if sample.tick <= last) {
            return EnqueueOutcome::Stale;
        }

        // Fast path: in-order arrival
        let insert_at = match self.pending.back() {
            None => 0,
            Some(back) if back.tick < sample.tick => self.pending.len(),
            Some(_) => match self.pending.binary_search_by_key(&sample.tick, |s| s.tick) {
                Ok(_) => return EnqueueOutcome::Duplicate,
                Err(idx) => idx,
            },
        };

        // A full queue would evict this sample straight away
        if insert_at == 0 && self.pending.len() >= self.capacity {
            return EnqueueOutcome::Stale;
        }

        self.pending.insert(insert_at, sample);

        if self.pending.len() > self.capacity {
            self.pending.pop_front();
            self.evicted += 1;
            EnqueueOutcome::QueuedWithEviction
        } else {
            EnqueueOutcome::Queued
        }
    }

    /// Pop the oldest pending sample and mark its tick consumed
    pub fn pop(&mut self) -> Option<InputSample> {
        let sample = self.pending.pop_front()?;
        self.last_consumed_tick = Some(sample.tick);
        Some(sample)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn last_consumed_tick(&self) -> Option<u64> {
        self.last_consumed_tick
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
