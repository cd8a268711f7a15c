use crate::domain::state::{SessionId, Spaceship};
use crate::domain::tuning::{ArenaBounds, ShipTuning};

#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    pub max_speed: f32,     // px/s
    pub turn_rate: f32,     // rad/s
    pub throttle_rate: f32, // throttle units per second
    pub bounds: ArenaBounds,
}

impl MovementConfig {
    pub fn new(tuning: &ShipTuning, bounds: ArenaBounds) -> Self {
        Self {
            max_speed: tuning.max_speed,
            turn_rate: tuning.turn_rate,
            throttle_rate: tuning.throttle_rate,
            bounds,
        }
    }
}

pub fn tick_ship(s: &mut Spaceship, dt: f32, cfg: MovementConfig) {
    // rotation
    s.rot += s.last_input.turn * cfg.turn_rate * dt;

    // throttle
    s.throttle += s.last_input.thrust * cfg.throttle_rate * dt;
    s.throttle = s.throttle.clamp(0.0, 1.0);

    // direction (0 rad = up / -Y)
    let dir_x = s.rot.sin();
    let dir_y = -s.rot.cos();

    // velocity = forward * throttle * max_speed
    let vel_x = dir_x * s.throttle * cfg.max_speed;
    let vel_y = dir_y * s.throttle * cfg.max_speed;

    // position integrate
    s.x += vel_x * dt;
    s.y += vel_y * dt;

    wrap_ship(s, cfg.bounds);
}

fn wrap_ship(s: &mut Spaceship, bounds: ArenaBounds) {
    if s.x < bounds.min_x {
        s.x = bounds.max_x;
    } else if s.x > bounds.max_x {
        s.x = bounds.min_x;
    }

    if s.y < bounds.min_y {
        s.y = bounds.max_y;
    } else if s.y > bounds.max_y {
        s.y = bounds.min_y;
    }
}

/// Deterministic spawn position spread across the arena by session id.
pub fn spawn_point(id: SessionId, bounds: ArenaBounds) -> (f32, f32) {
    let width = (bounds.max_x - bounds.min_x).max(1.0) as u32;
    let height = (bounds.max_y - bounds.min_y).max(1.0) as u32;
    let x = bounds.min_x + (id.wrapping_mul(137) % width) as f32;
    let y = bounds.min_y + (id.wrapping_mul(89) % height) as f32;
    (x, y)
}
