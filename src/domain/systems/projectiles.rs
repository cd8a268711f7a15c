use crate::domain::state::{Projectile, ProjectileSnapshot, SessionId, World};
use crate::domain::tuning::{ProjectileTuning, ShipTuning};
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ProjectileConfig {
    pub speed: f32,
    pub ttl: f32,
    pub radius: f32,
    pub damage: i32,
    pub cooldown: f32,
    pub ship_radius: f32,
    pub respawn_delay: f32,
}

impl ProjectileConfig {
    pub fn new(projectile: &ProjectileTuning, ship: &ShipTuning) -> Self {
        Self {
            speed: projectile.speed,
            ttl: projectile.ttl,
            radius: projectile.hit_radius,
            damage: projectile.damage,
            cooldown: projectile.cooldown,
            ship_radius: ship.hit_radius,
            respawn_delay: ship.respawn_delay,
        }
    }
}

struct Shot {
    owner_id: SessionId,
    x: f32,
    y: f32,
    rot: f32,
}

/// Spawns, moves, collides and expires projectiles.
///
/// Returns a descriptor for every projectile spawned during this step so the
/// caller can announce the shots.
pub fn tick_projectiles(
    world: &mut World,
    dt: f32,
    cfg: ProjectileConfig,
) -> Vec<ProjectileSnapshot> {
    // Spawn new projectiles from player input and cooldowns.
    let mut shots = Vec::new();
    for s in world.spaceships.values_mut() {
        if !s.alive {
            continue;
        }

        s.shoot_cooldown = (s.shoot_cooldown - dt).max(0.0);
        if s.last_input.shoot && s.shoot_cooldown <= 0.0 {
            shots.push(Shot {
                owner_id: s.id,
                x: s.x,
                y: s.y,
                rot: s.rot,
            });
            s.shoot_cooldown = cfg.cooldown;
        }
    }

    let mut fired = Vec::with_capacity(shots.len());
    for shot in shots {
        // Forward vector (same convention as ship movement).
        let dir_x = shot.rot.sin();
        let dir_y = -shot.rot.cos();
        let projectile = Projectile {
            id: world.allocate_projectile_id(),
            owner_id: shot.owner_id,
            // Spawn at the edge of the ship's radius, in the direction it's facing.
            x: shot.x + dir_x * cfg.ship_radius,
            y: shot.y + dir_y * cfg.ship_radius,
            rot: shot.rot,
            vx: dir_x * cfg.speed,
            vy: dir_y * cfg.speed,
            ttl: cfg.ttl,
        };
        fired.push(ProjectileSnapshot::from(&projectile));
        world.projectiles.push(projectile);
    }

    // Integrate projectile movement and lifetimes.
    for p in world.projectiles.iter_mut() {
        p.x += p.vx * dt;
        p.y += p.vy * dt;
        p.ttl -= dt;
    }

    // Projectile vs ship collision (naive O(P*S) for now).
    // A projectile despawns on its first hit.
    let hit_radius = cfg.ship_radius + cfg.radius;
    let hit_radius_sq = hit_radius * hit_radius;
    let mut hits: Vec<SessionId> = Vec::new();
    for p in world.projectiles.iter_mut() {
        if p.ttl <= 0.0 {
            continue;
        }

        for s in world.spaceships.values_mut() {
            if !s.alive || s.id == p.owner_id {
                continue;
            }

            let dx = s.x - p.x;
            let dy = s.y - p.y;
            if (dx * dx + dy * dy) <= hit_radius_sq {
                s.hp -= cfg.damage;
                if s.hp <= 0 {
                    s.hp = 0;
                    s.alive = false;
                    s.respawn_timer = cfg.respawn_delay;
                    s.throttle = 0.0;
                    s.shoot_cooldown = 0.0;
                }

                info!(
                    victim_id = s.id,
                    shooter_id = p.owner_id,
                    projectile_id = p.id,
                    victim_hp = s.hp,
                    "ship hit"
                );
                hits.push(p.owner_id);
                p.ttl = 0.0;
                break;
            }
        }
    }

    // One point per landed hit.
    for shooter_id in hits {
        if let Some(shooter) = world.spaceships.get_mut(&shooter_id) {
            shooter.score += 1;
        }
    }

    world.projectiles.retain(|p| p.ttl > 0.0);
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::{PlayerInput, Spaceship};

    fn config() -> ProjectileConfig {
        ProjectileConfig::new(&ProjectileTuning::default(), &ShipTuning::default())
    }

    fn shooting() -> PlayerInput {
        PlayerInput {
            thrust: 0.0,
            turn: 0.0,
            shoot: true,
        }
    }

    #[test]
    fn when_ship_shoots_then_projectile_is_spawned_and_reported_once() {
        let mut world = World::new();
        let mut ship = Spaceship::new(1, 0.0, 0.0, 100);
        ship.last_input = shooting();
        world.insert_spaceship(ship);

        let fired = tick_projectiles(&mut world, 0.01, config());
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].owner_id, 1);
        assert_eq!(world.projectiles.len(), 1);

        // Cooldown blocks the next shot.
        let fired = tick_projectiles(&mut world, 0.01, config());
        assert!(fired.is_empty());
    }

    #[test]
    fn when_projectile_hits_enemy_then_damage_is_dealt_and_shooter_scores() {
        let cfg = config();
        let mut world = World::new();
        let mut shooter = Spaceship::new(1, 0.0, 0.0, 100);
        shooter.last_input = shooting();
        world.insert_spaceship(shooter);
        // Directly in front of the shooter's nose (0 rad faces -Y).
        world.insert_spaceship(Spaceship::new(2, 0.0, -40.0, 100));

        tick_projectiles(&mut world, 0.01, cfg);

        let victim = &world.spaceships[&2];
        assert_eq!(victim.hp, 100 - cfg.damage);
        assert_eq!(world.spaceships[&1].score, 1);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn when_hp_drops_to_zero_then_ship_dies_and_waits_to_respawn() {
        let cfg = config();
        let mut world = World::new();
        let mut shooter = Spaceship::new(1, 0.0, 0.0, 100);
        shooter.last_input = shooting();
        world.insert_spaceship(shooter);
        world.insert_spaceship(Spaceship::new(2, 0.0, -40.0, cfg.damage));

        tick_projectiles(&mut world, 0.01, cfg);

        let victim = &world.spaceships[&2];
        assert!(!victim.alive);
        assert_eq!(victim.hp, 0);
        assert_eq!(victim.respawn_timer, cfg.respawn_delay);
    }

    #[test]
    fn when_lifetime_expires_then_projectile_is_removed() {
        let cfg = config();
        let mut world = World::new();
        let mut ship = Spaceship::new(1, 0.0, 0.0, 100);
        ship.last_input = shooting();
        world.insert_spaceship(ship);
        tick_projectiles(&mut world, 0.0, cfg);
        assert_eq!(world.projectiles.len(), 1);

        if let Some(ship) = world.spaceships.get_mut(&1) {
            ship.last_input = PlayerInput::default();
        }
        tick_projectiles(&mut world, cfg.ttl + 0.1, cfg);

        assert!(world.projectiles.is_empty());
    }
}
