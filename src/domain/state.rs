// Domain-level simulation entities, the canonical world and snapshot types.

use std::collections::BTreeMap;

/// Process-unique identifier of a connected client (and of its ship).
pub type SessionId = u32;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    pub thrust: f32,
    pub turn: f32,
    pub shoot: bool,
}

pub struct Spaceship {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,

    // Combat state.
    pub hp: i32,
    pub alive: bool,
    pub respawn_timer: f32,
    pub score: u32,

    // Movement-only state (do not serialize to clients)
    pub throttle: f32,           // 0.0..=1.0
    pub last_input: PlayerInput, // last applied input for this ship
    pub shoot_cooldown: f32,     // seconds until next allowed shot
}

impl Spaceship {
    pub fn new(id: SessionId, x: f32, y: f32, hp: i32) -> Self {
        Self {
            id,
            x,
            y,
            rot: 0.0,
            hp,
            alive: true,
            respawn_timer: 0.0,
            score: 0,
            throttle: 0.0,
            last_input: PlayerInput::default(),
            shoot_cooldown: 0.0,
        }
    }
}

pub struct Projectile {
    pub id: u64,
    pub owner_id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub vx: f32,
    pub vy: f32,
    pub ttl: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShipSnapshot {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
    pub score: u32,
}

/// Descriptor of a projectile as other parties see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner_id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub vx: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub frame_id: u64,
    pub ships: Vec<ShipSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

impl From<&Spaceship> for ShipSnapshot {
    fn from(s: &Spaceship) -> Self {
        Self {
            id: s.id,
            x: s.x,
            y: s.y,
            rot: s.rot,
            hp: s.hp,
            score: s.score,
        }
    }
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id,
            owner_id: p.owner_id,
            x: p.x,
            y: p.y,
            rot: p.rot,
            vx: p.vx,
            vy: p.vy,
        }
    }
}

/// Canonical game state: ships keyed by session id plus live projectiles.
///
/// Ships are kept in a `BTreeMap` so every iteration (snapshots, ranking,
/// collision order) is ordered by id and therefore repeatable.
#[derive(Default)]
pub struct World {
    pub spaceships: BTreeMap<SessionId, Spaceship>,
    pub projectiles: Vec<Projectile>,
    // Inputs received since the last simulation step; latest input wins.
    pending_inputs: BTreeMap<SessionId, PlayerInput>,
    next_projectile_id: u64,
}

impl World {
    pub fn new() -> Self {
        Self {
            spaceships: BTreeMap::new(),
            projectiles: Vec::new(),
            pending_inputs: BTreeMap::new(),
            next_projectile_id: 1,
        }
    }

    pub fn insert_spaceship(&mut self, ship: Spaceship) {
        self.spaceships.insert(ship.id, ship);
    }

    /// Removes the ship together with its in-flight projectiles and any
    /// input still waiting for the next step.
    pub fn remove_spaceship(&mut self, id: SessionId) -> Option<Spaceship> {
        self.pending_inputs.remove(&id);
        self.projectiles.retain(|p| p.owner_id != id);
        self.spaceships.remove(&id)
    }

    pub fn contains_spaceship(&self, id: SessionId) -> bool {
        self.spaceships.contains_key(&id)
    }

    pub fn queue_input(&mut self, id: SessionId, input: PlayerInput) {
        self.pending_inputs.insert(id, input);
    }

    pub fn pending_input(&self, id: SessionId) -> Option<&PlayerInput> {
        self.pending_inputs.get(&id)
    }

    /// Hands the buffered inputs to the simulation step, leaving the buffer empty.
    pub fn take_pending_inputs(&mut self) -> BTreeMap<SessionId, PlayerInput> {
        std::mem::take(&mut self.pending_inputs)
    }

    pub fn allocate_projectile_id(&mut self) -> u64 {
        let id = self.next_projectile_id;
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        id
    }

    /// Copies the visible state; dead ships are left out until they respawn.
    pub fn snapshot(&self, frame_id: u64) -> WorldSnapshot {
        WorldSnapshot {
            frame_id,
            ships: self
                .spaceships
                .values()
                .filter(|s| s.alive)
                .map(ShipSnapshot::from)
                .collect(),
            projectiles: self.projectiles.iter().map(ProjectileSnapshot::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile(id: u64, owner_id: SessionId) -> Projectile {
        Projectile {
            id,
            owner_id,
            x: 0.0,
            y: 0.0,
            rot: 0.0,
            vx: 0.0,
            vy: 0.0,
            ttl: 1.0,
        }
    }

    #[test]
    fn when_ship_is_removed_then_its_projectiles_and_pending_input_go_with_it() {
        let mut world = World::new();
        world.insert_spaceship(Spaceship::new(1, 0.0, 0.0, 100));
        world.insert_spaceship(Spaceship::new(2, 10.0, 0.0, 100));
        world.projectiles.push(projectile(1, 1));
        world.projectiles.push(projectile(2, 2));
        world.queue_input(1, PlayerInput::default());

        let removed = world.remove_spaceship(1);

        assert!(removed.is_some());
        assert!(!world.contains_spaceship(1));
        assert!(world.pending_input(1).is_none());
        assert_eq!(world.projectiles.len(), 1);
        assert_eq!(world.projectiles[0].owner_id, 2);
    }

    #[test]
    fn when_input_is_queued_twice_then_latest_wins_and_take_empties_buffer() {
        let mut world = World::new();
        world.queue_input(
            3,
            PlayerInput {
                thrust: 1.0,
                turn: 0.0,
                shoot: false,
            },
        );
        world.queue_input(
            3,
            PlayerInput {
                thrust: 0.5,
                turn: 0.0,
                shoot: true,
            },
        );

        let inputs = world.take_pending_inputs();

        assert_eq!(inputs.len(), 1);
        assert!(inputs[&3].shoot);
        assert!(world.take_pending_inputs().is_empty());
    }

    #[test]
    fn when_snapshot_is_taken_then_dead_ships_are_hidden_and_order_follows_ids() {
        let mut world = World::new();
        world.insert_spaceship(Spaceship::new(5, 0.0, 0.0, 100));
        world.insert_spaceship(Spaceship::new(2, 0.0, 0.0, 100));
        let mut dead = Spaceship::new(3, 0.0, 0.0, 0);
        dead.alive = false;
        world.insert_spaceship(dead);

        let snapshot = world.snapshot(9);

        assert_eq!(snapshot.frame_id, 9);
        let ids: Vec<SessionId> = snapshot.ships.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }
}
