// Simulation port driven by the game loop, plus the arena physics behind it.

use crate::domain::systems::movement::{self, MovementConfig};
use crate::domain::systems::projectiles::{self, ProjectileConfig};
use crate::domain::systems::respawn;
use crate::domain::tuning::{ArenaBounds, ProjectileTuning, ShipTuning};
use crate::domain::{Event, ProjectileFired, SessionId, Spaceship, World};
use std::time::Duration;

/// Mutates the world; runs synchronously on the dispatch loop.
pub trait Simulation: Send {
    /// Puts a ship for a newly connected session into the world.
    fn spawn(&mut self, world: &mut World, session_id: SessionId);

    /// Advances the world by `elapsed`, consuming buffered inputs, and returns
    /// the events it wants published.
    fn step(&mut self, world: &mut World, elapsed: Duration) -> Vec<Event>;
}

#[derive(Debug, Clone, Default)]
pub struct ArenaSimulation {
    pub ship: ShipTuning,
    pub projectile: ProjectileTuning,
    pub bounds: ArenaBounds,
}

impl ArenaSimulation {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Simulation for ArenaSimulation {
    fn spawn(&mut self, world: &mut World, session_id: SessionId) {
        let (x, y) = movement::spawn_point(session_id, self.bounds);
        world.insert_spaceship(Spaceship::new(session_id, x, y, self.ship.max_hp));
    }

    fn step(&mut self, world: &mut World, elapsed: Duration) -> Vec<Event> {
        let dt = elapsed.as_secs_f32();

        for (id, input) in world.take_pending_inputs() {
            // Inputs for ships that already left are discarded.
            if let Some(ship) = world.spaceships.get_mut(&id) {
                ship.last_input = input;
            }
        }

        let movement = MovementConfig::new(&self.ship, self.bounds);
        for ship in world.spaceships.values_mut() {
            if !ship.alive {
                respawn::tick_respawn(ship, dt, &self.ship, self.bounds);
                continue;
            }
            movement::tick_ship(ship, dt, movement);
        }

        let fired = projectiles::tick_projectiles(
            world,
            dt,
            ProjectileConfig::new(&self.projectile, &self.ship),
        );

        fired
            .into_iter()
            .map(|projectile| Event::ProjectileFired(ProjectileFired { projectile }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayerInput;

    #[test]
    fn when_session_spawns_then_ship_starts_at_full_hp() {
        let mut sim = ArenaSimulation::new();
        let mut world = World::new();

        sim.spawn(&mut world, 3);

        let ship = &world.spaceships[&3];
        assert!(ship.alive);
        assert_eq!(ship.hp, sim.ship.max_hp);
    }

    #[test]
    fn when_pending_input_shoots_then_step_emits_projectile_fired() {
        let mut sim = ArenaSimulation::new();
        let mut world = World::new();
        sim.spawn(&mut world, 1);
        world.queue_input(
            1,
            PlayerInput {
                thrust: 0.0,
                turn: 0.0,
                shoot: true,
            },
        );

        let events = sim.step(&mut world, Duration::from_millis(16));

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Event::ProjectileFired(fired) if fired.projectile.owner_id == 1
        ));
        assert!(world.pending_input(1).is_none());
    }

    #[test]
    fn when_input_targets_missing_ship_then_it_is_discarded() {
        let mut sim = ArenaSimulation::new();
        let mut world = World::new();
        world.queue_input(8, PlayerInput::default());

        let events = sim.step(&mut world, Duration::from_millis(16));

        assert!(events.is_empty());
        assert!(world.spaceships.is_empty());
        assert!(world.pending_input(8).is_none());
    }
}
