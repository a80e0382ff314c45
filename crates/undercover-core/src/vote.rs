//! Vote accounting for the voting phase.
//!
//! One vote per member per round, recorded by voter identity. Targets
//! keep their first-appearance order, which doubles as the tie-break
//! rule when the round resolves: the tally is sorted by descending
//! count with a stable sort, so equal counts stay in the order their
//! first vote arrived.

use std::collections::HashSet;

use undercover_protocol::{ConnectionId, VoteCount};

use crate::GameError;

/// The accumulated tally for one voting round.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    /// Target → count, in first-appearance order.
    entries: Vec<VoteCount>,
    /// Who has voted already this round.
    voters: HashSet<ConnectionId>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one vote.
    ///
    /// # Errors
    /// Returns [`GameError::AlreadyVoted`] if this voter has already
    /// cast a vote in the current round.
    pub fn record(
        &mut self,
        voter: ConnectionId,
        target: ConnectionId,
    ) -> Result<(), GameError> {
        if !self.voters.insert(voter) {
            return Err(GameError::AlreadyVoted(voter));
        }
        match self.entries.iter_mut().find(|e| e.target == target) {
            Some(entry) => entry.count += 1,
            None => self.entries.push(VoteCount { target, count: 1 }),
        }
        Ok(())
    }

    /// Number of members who have voted so far.
    pub fn voters(&self) -> usize {
        self.voters.len()
    }

    pub fn count_for(&self, target: ConnectionId) -> u32 {
        self.entries
            .iter()
            .find(|e| e.target == target)
            .map_or(0, |e| e.count)
    }

    /// The public tally, in first-appearance order.
    pub fn entries(&self) -> &[VoteCount] {
        &self.entries
    }

    /// Re-points every occurrence of `old` — as voter and as target —
    /// to `new`. Called when a reconnect swaps a member's connection
    /// id mid-round, so the member can neither vote twice nor shed the
    /// votes already cast against them.
    pub fn reassign(&mut self, old: ConnectionId, new: ConnectionId) {
        if self.voters.remove(&old) {
            self.voters.insert(new);
        }
        for entry in &mut self.entries {
            if entry.target == old {
                entry.target = new;
            }
        }
    }

    /// The top `n` targets by descending count; ties break by stable
    /// first-appearance order.
    pub fn leaders(&self, n: usize) -> Vec<ConnectionId> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted.into_iter().take(n).map(|e| e.target).collect()
    }

    /// Clears the tally for a fresh round.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.voters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);
    const C: ConnectionId = ConnectionId(3);
    const D: ConnectionId = ConnectionId(4);
    const E: ConnectionId = ConnectionId(5);

    #[test]
    fn test_record_counts_votes_per_target() {
        let mut tally = VoteTally::new();
        tally.record(A, C).unwrap();
        tally.record(B, C).unwrap();
        tally.record(D, E).unwrap();
        assert_eq!(tally.count_for(C), 2);
        assert_eq!(tally.count_for(E), 1);
        assert_eq!(tally.voters(), 3);
    }

    #[test]
    fn test_duplicate_voter_rejected_without_tally_change() {
        let mut tally = VoteTally::new();
        tally.record(A, C).unwrap();
        let err = tally.record(A, D).unwrap_err();
        assert!(matches!(err, GameError::AlreadyVoted(v) if v == A));
        assert_eq!(tally.count_for(C), 1);
        assert_eq!(tally.count_for(D), 0);
        assert_eq!(tally.voters(), 1);
    }

    #[test]
    fn test_leaders_take_top_n_by_count() {
        let mut tally = VoteTally::new();
        // 3 votes for C, 2 for D.
        tally.record(A, C).unwrap();
        tally.record(B, C).unwrap();
        tally.record(E, C).unwrap();
        tally.record(C, D).unwrap();
        tally.record(D, D).unwrap();
        assert_eq!(tally.leaders(1), vec![C]);
        assert_eq!(tally.leaders(2), vec![C, D]);
    }

    #[test]
    fn test_leaders_break_ties_by_first_appearance() {
        let mut tally = VoteTally::new();
        // D first receives a vote, then C; both end on 2.
        tally.record(A, D).unwrap();
        tally.record(B, C).unwrap();
        tally.record(C, D).unwrap();
        tally.record(D, C).unwrap();
        assert_eq!(tally.leaders(1), vec![D]);
    }

    #[test]
    fn test_reassign_moves_voter_and_target() {
        let mut tally = VoteTally::new();
        tally.record(A, C).unwrap();
        tally.record(B, C).unwrap();

        // C reconnects under a fresh id.
        let new_c = ConnectionId(99);
        tally.reassign(C, new_c);
        assert_eq!(tally.count_for(new_c), 2);
        assert_eq!(tally.count_for(C), 0);

        // A reconnects too; their old ballot still counts as theirs.
        let new_a = ConnectionId(98);
        tally.reassign(A, new_a);
        let err = tally.record(new_a, D).unwrap_err();
        assert!(matches!(err, GameError::AlreadyVoted(v) if v == new_a));
    }

    #[test]
    fn test_reset_clears_votes_and_voters() {
        let mut tally = VoteTally::new();
        tally.record(A, C).unwrap();
        tally.reset();
        assert_eq!(tally.voters(), 0);
        assert!(tally.entries().is_empty());
        // The same voter may vote again after a reset.
        tally.record(A, D).unwrap();
        assert_eq!(tally.count_for(D), 1);
    }
}
