// Gameplay numbers for the arena. Runtime knobs (tick rate, queue sizes)
// live in `frameworks::config` instead.

/// Play field in world units; ships leaving one edge re-enter at the opposite one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Default for ArenaBounds {
    fn default() -> Self {
        Self {
            min_x: -400.0,
            max_x: 400.0,
            min_y: -230.0,
            max_y: 230.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShipTuning {
    // units/s at full throttle
    pub max_speed: f32,
    // rad/s at full turn input
    pub turn_rate: f32,
    // throttle change per second while thrusting
    pub throttle_rate: f32,
    pub hit_radius: f32,
    pub max_hp: i32,
    pub respawn_delay: f32,
}

impl Default for ShipTuning {
    fn default() -> Self {
        Self {
            max_speed: 150.0,
            turn_rate: 3.0,
            throttle_rate: 2.0,
            hit_radius: 24.0,
            max_hp: 100,
            respawn_delay: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    pub speed: f32,
    // seconds before an unspent shot disappears
    pub ttl: f32,
    pub hit_radius: f32,
    pub damage: i32,
    // seconds between two shots of one ship
    pub cooldown: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 400.0,
            ttl: 1.25,
            hit_radius: 5.0,
            damage: 10,
            cooldown: 0.1,
        }
    }
}
