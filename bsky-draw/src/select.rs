use itertools::Itertools;
use rand::{seq::SliceRandom, Rng};

use crate::snapshot::HandleSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// In draw order.
    pub winners: Vec<String>,
    /// Every entrant, sorted.
    pub entrants: Vec<String>,
}

/// Uniformly shuffles the whole pool and takes the first `winner_count`.
///
/// The pool is sorted before shuffling so a seeded `rng` gives a repeatable
/// draw regardless of set iteration order.
pub fn select_winners<R: Rng + ?Sized>(
    pool: &HandleSet,
    winner_count: usize,
    rng: &mut R,
) -> Selection {
    let mut shuffled: Vec<String> = pool.iter().cloned().sorted().collect();
    shuffled.shuffle(rng);

    let winners = shuffled.iter().take(winner_count).cloned().collect();
    shuffled.sort();

    Selection {
        winners,
        entrants: shuffled,
    }
}
