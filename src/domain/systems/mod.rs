// Per-tick simulation systems run by the arena simulation.

pub mod movement;
pub mod projectiles;
pub mod respawn;
