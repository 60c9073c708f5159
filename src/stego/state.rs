//! Phase machine shared by every carrier adapter.
//!
//! ```text
//! embed:   Idle -> Validating -> { Embedding -> Done | Rejected }
//! extract: Idle -> Scanning -> { HeaderFound -> Validating -> { Extracted | Corrupted }
//!                              | HeaderAbsent -> NotFound }
//! ```

use tracing::{debug, error};

use super::ExtractResult;

/// Which direction an adapter call runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Embed,
    Extract,
}

/// A phase of an embed or extract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Embedding,
    Rejected,
    Done,
    Scanning,
    HeaderFound,
    HeaderAbsent,
    Extracted,
    Corrupted,
    NotFound,
}

impl Phase {
    /// Returns true for phases that end an operation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Rejected | Self::Extracted | Self::Corrupted | Self::NotFound
        )
    }

    /// Returns true if `operation` may move from `self` to `next`.
    pub fn can_transition_to(self, operation: Operation, next: Phase) -> bool {
        use Operation::{Embed, Extract};
        use Phase::*;

        matches!(
            (operation, self, next),
            (Embed, Idle, Validating)
                | (Embed, Validating, Embedding)
                | (Embed, Validating, Rejected)
                | (Embed, Embedding, Done)
                | (Extract, Idle, Scanning)
                | (Extract, Scanning, HeaderFound)
                | (Extract, Scanning, HeaderAbsent)
                | (Extract, HeaderFound, Validating)
                | (Extract, Validating, Extracted)
                | (Extract, Validating, Corrupted)
                | (Extract, HeaderAbsent, NotFound)
        )
    }
}

/// Tracks the phases of one adapter call.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    carrier: &'static str,
    operation: Operation,
    history: Vec<Phase>,
}

impl PhaseTracker {
    /// Starts tracking an operation in the `Idle` phase.
    pub fn new(carrier: &'static str, operation: Operation) -> Self {
        Self {
            carrier,
            operation,
            history: vec![Phase::Idle],
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    /// Every phase visited so far, starting with `Idle`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Moves to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: Phase) {
        let current = self.phase();
        if !current.can_transition_to(self.operation, next) {
            error!(carrier = self.carrier, ?current, ?next, "illegal phase transition");
            debug_assert!(false, "illegal phase transition {:?} -> {:?}", current, next);
            return;
        }
        debug!(carrier = self.carrier, operation = ?self.operation, phase = ?next, "phase");
        self.history.push(next);
    }

    /// Walks the extract phases that lead to `result`.
    pub fn record_extraction(&mut self, result: &ExtractResult) {
        match result {
            ExtractResult::NotFound => {
                self.advance(Phase::HeaderAbsent);
                self.advance(Phase::NotFound);
            }
            ExtractResult::Found { .. } => {
                self.advance(Phase::HeaderFound);
                self.advance(Phase::Validating);
                self.advance(Phase::Extracted);
            }
            ExtractResult::Corrupted(_) => {
                self.advance(Phase::HeaderFound);
                self.advance(Phase::Validating);
                self.advance(Phase::Corrupted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stego::CorruptionReason;

    #[test]
    fn test_embed_paths() {
        assert!(Phase::Idle.can_transition_to(Operation::Embed, Phase::Validating));
        assert!(Phase::Validating.can_transition_to(Operation::Embed, Phase::Rejected));
        assert!(Phase::Embedding.can_transition_to(Operation::Embed, Phase::Done));
        assert!(!Phase::Idle.can_transition_to(Operation::Embed, Phase::Embedding));
        assert!(!Phase::Rejected.can_transition_to(Operation::Embed, Phase::Embedding));
    }

    #[test]
    fn test_extract_paths() {
        assert!(Phase::Idle.can_transition_to(Operation::Extract, Phase::Scanning));
        assert!(Phase::HeaderAbsent.can_transition_to(Operation::Extract, Phase::NotFound));
        assert!(!Phase::HeaderAbsent.can_transition_to(Operation::Extract, Phase::Extracted));
        assert!(!Phase::Idle.can_transition_to(Operation::Extract, Phase::Validating));
        // Validating exists in both machines but leads to different phases
        assert!(!Phase::Validating.can_transition_to(Operation::Extract, Phase::Embedding));
    }

    #[test]
    fn test_terminal_phases() {
        for phase in [Phase::Done, Phase::Rejected, Phase::Extracted, Phase::Corrupted, Phase::NotFound] {
            assert!(phase.is_terminal());
        }
        assert!(!Phase::Scanning.is_terminal());
    }

    #[test]
    fn test_record_extraction() {
        let mut tracker = PhaseTracker::new("test", Operation::Extract);
        tracker.advance(Phase::Scanning);
        tracker.record_extraction(&ExtractResult::Corrupted(CorruptionReason::DamagedMagic));

        assert_eq!(
            tracker.history(),
            &[
                Phase::Idle,
                Phase::Scanning,
                Phase::HeaderFound,
                Phase::Validating,
                Phase::Corrupted
            ]
        );
        assert!(tracker.phase().is_terminal());
    }

    #[test]
    fn test_embed_tracker() {
        let mut tracker = PhaseTracker::new("test", Operation::Embed);
        tracker.advance(Phase::Validating);
        tracker.advance(Phase::Embedding);
        tracker.advance(Phase::Done);
        assert_eq!(tracker.phase(), Phase::Done);
    }
}
