//! Arena physics: ground control, jump arc, world bounds

use crate::ws::protocol::Facing;

use super::input::{Key, KeyState};

/// Physics constants for the arena. Units are pixels and pixels-per-tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaRules {
    /// Ground speed, applied instantly (no acceleration ramp)
    pub movement_speed: f32,
    /// Vertical velocity applied on takeoff. Negative because height is
    /// integrated as `height -= vertical_velocity`.
    pub jump_velocity: f32,
    /// Added to vertical velocity every airborne tick
    pub gravity: f32,
    pub world_width: f32,
    pub player_width: f32,
    pub player_height: f32,
    /// Screen-space y of the floor, used for the derived client y
    pub floor_y: f32,
    pub spawn_x: f32,
}

impl Default for ArenaRules {
    fn default() -> Self {
        Self {
            movement_speed: 5.0,
            jump_velocity: -15.0,
            gravity: 0.8,
            world_width: 1920.0,
            player_width: 50.0,
            player_height: 100.0,
            floor_y: 800.0,
            spawn_x: 100.0,
        }
    }
}

impl ArenaRules {
    pub fn with_world_width(mut self, world_width: f32) -> Self {
        self.world_width = world_width;
        self
    }

    /// Largest legal x for an entity
    pub fn max_x(&self) -> f32 {
        (self.world_width - self.player_width).max(0.0)
    }
}

/// Kinematic state shared by the server simulator and client-side prediction
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub x: f32,
    pub height: f32,
    pub horizontal_velocity: f32,
    pub vertical_velocity: f32,
    pub airborne: bool,
}

impl Body {
    pub fn at(x: f32) -> Self {
        Self {
            x,
            ..Self::default()
        }
    }
}

/// Result of one movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub took_off: bool,
    pub landed: bool,
}

/// Physics system for stepping bodies
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a body by one tick under the given key state.
    ///
    /// Grounded bodies get their horizontal velocity straight from intent and
    /// may take off; airborne bodies keep the velocity they left the ground
    /// with.
    pub fn step(body: &mut Body, keys: KeyState, rules: &ArenaRules) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        if !body.airborne {
            body.horizontal_velocity = Self::ground_velocity(keys, rules);

            if keys.is_down(Key::Jump) {
                body.airborne = true;
                body.vertical_velocity = rules.jump_velocity;
                outcome.took_off = true;
            }
        }

        body.x = Self::clamp_x(body.x + body.horizontal_velocity, rules);

        if body.airborne {
            body.height -= body.vertical_velocity;
            body.vertical_velocity += rules.gravity;

            if body.height <= 0.0 {
                body.height = 0.0;
                body.vertical_velocity = 0.0;
                body.airborne = false;
                // Ground control resumes on the landing tick
                body.horizontal_velocity = Self::ground_velocity(keys, rules);
                outcome.landed = true;
            }
        }

        outcome
    }

    /// Instantaneous ground velocity for a key state
    pub fn ground_velocity(keys: KeyState, rules: &ArenaRules) -> f32 {
        keys.intent().direction() * rules.movement_speed
    }

    /// Clamp x into `[0, world_width - player_width]`
    pub fn clamp_x(x: f32, rules: &ArenaRules) -> f32 {
        x.clamp(0.0, rules.max_x())
    }

    /// Screen-space y for a height above the floor
    pub fn derived_y(height: f32, rules: &ArenaRules) -> f32 {
        rules.floor_y - rules.player_height - height
    }

    /// Facing toward an opponent: right only when the opponent is strictly
    /// to the right
    pub fn facing_toward(own_x: f32, opponent_x: f32) -> Facing {
        if opponent_x > own_x {
            Facing::Right
        } else {
            Facing::Left
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn right() -> KeyState {
        KeyState::from_keys(&[Key::Right])
    }

    #[test]
    fn ground_movement_is_instant() {
        let rules = ArenaRules::default();
        let mut body = Body::at(100.0);
        PhysicsSystem::step(&mut body, right(), &rules);
        assert_eq!(body.horizontal_velocity, 5.0);
        assert_eq!(body.x, 105.0);

        PhysicsSystem::step(&mut body, KeyState::NONE, &rules);
        assert_eq!(body.horizontal_velocity, 0.0);
        assert_eq!(body.x, 105.0);
    }

    #[test]
    fn x_is_clamped_to_world() {
        let rules = ArenaRules::default();
        let mut body = Body::at(rules.max_x() - 2.0);
        PhysicsSystem::step(&mut body, right(), &rules);
        assert_eq!(body.x, rules.max_x());

        let mut body = Body::at(3.0);
        PhysicsSystem::step(&mut body, KeyState::from_keys(&[Key::Left]), &rules);
        assert_eq!(body.x, 0.0);
    }

    #[test]
    fn takeoff_integrates_height_in_same_tick() {
        let rules = ArenaRules::default();
        let mut body = Body::at(100.0);
        let outcome = PhysicsSystem::step(&mut body, KeyState::from_keys(&[Key::Jump]), &rules);
        assert!(outcome.took_off);
        assert!(body.airborne);
        assert_approx_eq!(body.height, 15.0);
        assert_approx_eq!(body.vertical_velocity, -14.2);
    }

    #[test]
    fn landing_snaps_to_ground() {
        let rules = ArenaRules::default();
        let mut body = Body {
            x: 100.0,
            height: 1.0,
            horizontal_velocity: 5.0,
            vertical_velocity: 3.0,
            airborne: true,
        };
        let outcome = PhysicsSystem::step(&mut body, KeyState::NONE, &rules);
        assert!(outcome.landed);
        assert_eq!(body.height, 0.0);
        assert_eq!(body.vertical_velocity, 0.0);
        assert!(!body.airborne);
        assert_eq!(body.horizontal_velocity, 0.0);
        // Momentum still carried x on the landing tick
        assert_eq!(body.x, 105.0);
    }

    #[test]
    fn facing_ties_face_left() {
        assert_eq!(PhysicsSystem::facing_toward(100.0, 300.0), Facing::Right);
        assert_eq!(PhysicsSystem::facing_toward(300.0, 100.0), Facing::Left);
        assert_eq!(PhysicsSystem::facing_toward(200.0, 200.0), Facing::Left);
    }

    #[test]
    fn derived_y_sits_on_floor() {
        let rules = ArenaRules::default();
        assert_eq!(PhysicsSystem::derived_y(0.0, &rules), 700.0);
        assert_eq!(PhysicsSystem::derived_y(50.0, &rules), 650.0);
    }
}
