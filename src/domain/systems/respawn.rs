use crate::domain::state::Spaceship;
use crate::domain::systems::movement::spawn_point;
use crate::domain::tuning::{ArenaBounds, ShipTuning};
use tracing::debug;

/// Counts down dead ships and brings them back at full health.
pub fn tick_respawn(s: &mut Spaceship, dt: f32, tuning: &ShipTuning, bounds: ArenaBounds) {
    if s.alive {
        return;
    }

    s.respawn_timer -= dt;
    if s.respawn_timer > 0.0 {
        return;
    }

    let (x, y) = spawn_point(s.id, bounds);
    s.x = x;
    s.y = y;
    s.rot = 0.0;
    s.hp = tuning.max_hp;
    s.alive = true;
    s.respawn_timer = 0.0;
    s.throttle = 0.0;
    s.shoot_cooldown = 0.0;
    s.last_input = Default::default();
    debug!(session_id = s.id, "ship respawned");
}
