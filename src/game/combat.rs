//! Combat system - attack flags, durations, and tick-counted attack timers

use crate::util::time::millis_to_ticks;

use super::input::{Key, KeyState};

/// Punch animation length
pub const PUNCH_DURATION_MS: u64 = 300;
/// Kick animation length
pub const KICK_DURATION_MS: u64 = 400;

/// Attack kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    Punch,
    Kick,
}

impl AttackKind {
    pub fn duration_ms(self) -> u64 {
        match self {
            AttackKind::Punch => PUNCH_DURATION_MS,
            AttackKind::Kick => KICK_DURATION_MS,
        }
    }

    /// Duration in ticks of the given length
    pub fn duration_ticks(self, tick_interval_ms: u64) -> u64 {
        millis_to_ticks(self.duration_ms(), tick_interval_ms)
    }

    pub fn key(self) -> Key {
        match self {
            AttackKind::Punch => Key::Punch,
            AttackKind::Kick => Key::Kick,
        }
    }
}

/// At most one attack in progress, expiring at a fixed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttackTimer {
    active: Option<(AttackKind, u64)>,
}

impl AttackTimer {
    /// Start an attack at `now`. Ignored while another attack is in progress.
    /// Returns whether the attack started.
    pub fn trigger(&mut self, kind: AttackKind, now: u64, tick_interval_ms: u64) -> bool {
        self.expire(now);
        if self.active.is_some() {
            return false;
        }
        self.active = Some((kind, now + kind.duration_ticks(tick_interval_ms)));
        true
    }

    /// Clear the attack once its expiry tick is reached. Returns true if an
    /// attack ended on this call.
    pub fn expire(&mut self, now: u64) -> bool {
        match self.active {
            Some((_, expires_at)) if now >= expires_at => {
                self.active = None;
                true
            }
            _ => false,
        }
    }

    pub fn active(&self) -> Option<AttackKind> {
        self.active.map(|(kind, _)| kind)
    }

    pub fn is_punching(&self) -> bool {
        self.active() == Some(AttackKind::Punch)
    }

    pub fn is_kicking(&self) -> bool {
        self.active() == Some(AttackKind::Kick)
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

/// Combat system for resolving attack state on the authoritative side
pub struct CombatSystem;

impl CombatSystem {
    /// Attack flags for a sample. Punch wins if a client sets both bits.
    pub fn attack_flags(keys: KeyState) -> (bool, bool) {
        let punching = keys.is_down(Key::Punch);
        let kicking = keys.is_down(Key::Kick) && !punching;
        (punching, kicking)
    }

    /// Attack that just started between two flag states, if any
    pub fn rising_edge(
        was_punching: bool,
        was_kicking: bool,
        punching: bool,
        kicking: bool,
    ) -> Option<AttackKind> {
        if punching && !was_punching {
            Some(AttackKind::Punch)
        } else if kicking && !was_kicking {
            Some(AttackKind::Kick)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_expires_after_duration() {
        let mut timer = AttackTimer::default();
        assert!(timer.trigger(AttackKind::Punch, 10, 50));
        assert!(timer.is_punching());

        // 300 ms at 50 ms per tick is 6 ticks
        assert!(!timer.expire(15));
        assert!(timer.is_punching());
        assert!(timer.expire(16));
        assert!(timer.active().is_none());
    }

    #[test]
    fn attacks_are_mutually_exclusive() {
        let mut timer = AttackTimer::default();
        assert!(timer.trigger(AttackKind::Kick, 0, 50));
        assert!(!timer.trigger(AttackKind::Punch, 3, 50));
        assert!(timer.is_kicking());
        assert!(!timer.is_punching());

        // Kick lasts 8 ticks, punch allowed afterwards
        assert!(timer.trigger(AttackKind::Punch, 8, 50));
        assert!(timer.is_punching());
    }

    #[test]
    fn punch_wins_when_both_bits_set() {
        let keys = KeyState::from_keys(&[Key::Punch, Key::Kick]);
        assert_eq!(CombatSystem::attack_flags(keys), (true, false));
        let keys = KeyState::from_keys(&[Key::Kick]);
        assert_eq!(CombatSystem::attack_flags(keys), (false, true));
    }

    #[test]
    fn rising_edge_detection() {
        assert_eq!(
            CombatSystem::rising_edge(false, false, true, false),
            Some(AttackKind::Punch)
        );
        assert_eq!(CombatSystem::rising_edge(true, false, true, false), None);
        assert_eq!(
            CombatSystem::rising_edge(true, false, false, true),
            Some(AttackKind::Kick)
        );
        assert_eq!(CombatSystem::rising_edge(false, true, false, false), None);
    }
}
