// Leaderboard derived from the world on demand; never stored between broadcasts.

use crate::domain::state::{SessionId, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub id: SessionId,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaderboard {
    pub ranks: Vec<Rank>,
}

impl Leaderboard {
    /// Ranks every ship by score, highest first.
    ///
    /// The sort is stable over the world's id order, so ties always list the
    /// lower session id first and stay put across broadcasts.
    pub fn from_world(world: &World) -> Self {
        let mut ranks: Vec<Rank> = world
            .spaceships
            .values()
            .map(|s| Rank {
                id: s.id,
                score: s.score,
            })
            .collect();
        ranks.sort_by(|a, b| b.score.cmp(&a.score));
        Self { ranks }
    }
}
