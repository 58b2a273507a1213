// crates/tessera-reputation/src/lib.rs
//
// tessera-reputation: reputation scoring for the Tessera epoch engine.
//
// Reputation grows with the number of epochs a participant has completed and
// shrinks with every epoch in which it missed more than a cutoff fraction of
// its inference requests. Scores are integers in [0, 100].

pub mod score;

pub use score::{calculate_reputation, miss_percentage, score_participants, ReputationContext};
