//! Role assignment engine.
//!
//! Given a player count and the room settings, builds a pool of role
//! assignments seeded by one random word pair, then permutes it with an
//! unbiased shuffle and hands assignments out positionally. Requested
//! counts are clamped so the round is always playable: at least one
//! spy, at least one Mr. White, at least one civilian.

use rand::Rng;
use rand::seq::SliceRandom;
use undercover_protocol::{GameSettings, Role};

use crate::words;

/// One dealt role, before it is attached to a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub role: Role,
    pub word: Option<String>,
    pub category: String,
}

/// Effective special-role counts after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCounts {
    pub spies: usize,
    pub mr_white: usize,
}

impl RoleCounts {
    /// Clamps the requested counts for a round of `n` players.
    ///
    /// Each special role is raised to at least 1, then the sum is
    /// trimmed until at least one civilian slot remains — spies give
    /// way first, then Mr. White. The one-civilian invariant overrides
    /// the requested counts.
    pub fn for_player_count(settings: GameSettings, n: usize) -> Self {
        let budget = n.saturating_sub(1);
        let mut spies = settings.num_spies.max(1);
        let mut mr_white = settings.num_mr_white.max(1);
        while spies + mr_white > budget && spies > 1 {
            spies -= 1;
        }
        while spies + mr_white > budget && mr_white > 1 {
            mr_white -= 1;
        }
        Self { spies, mr_white }
    }

    pub fn civilians(&self, n: usize) -> usize {
        n.saturating_sub(self.spies + self.mr_white)
    }
}

/// Deals roles for `n` players: picks a word pair uniformly, builds the
/// pool, shuffles it (Fisher–Yates via `SliceRandom`, every permutation
/// equally likely), and returns one assignment per player position.
pub fn deal<R: Rng + ?Sized>(
    n: usize,
    settings: GameSettings,
    rng: &mut R,
) -> Vec<Assignment> {
    let pair = words::random_pair(rng);
    let counts = RoleCounts::for_player_count(settings, n);

    let mut pool = Vec::with_capacity(n);
    for _ in 0..counts.mr_white {
        pool.push(Assignment {
            role: Role::MrWhite,
            word: Some(pair.word_b.to_string()),
            category: pair.category.to_string(),
        });
    }
    for _ in 0..counts.spies {
        pool.push(Assignment {
            role: Role::Spy,
            word: None,
            category: pair.category.to_string(),
        });
    }
    while pool.len() < n {
        pool.push(Assignment {
            role: Role::Civilian,
            word: Some(pair.word_a.to_string()),
            category: pair.category.to_string(),
        });
    }

    pool.shuffle(rng);
    pool
}
