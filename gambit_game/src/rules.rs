// Rules engine seam.
//
// The platform never implements game rules; it consumes the externally
// visible surface of an engine: apply a move string, list the legal moves,
// report a terminal outcome, replay the history. Rejection of an illegal
// move is also how duplicate deliveries are absorbed — a move replayed
// against the position it already produced is simply not legal.

use gambit_directory::Outcome;

/// An engine rejected a move for the current position.
#[derive(Clone, Debug, thiserror::Error)]
#[error("illegal move `{mv}`: {reason}")]
pub struct RulesError {
    pub mv: String,
    pub reason: String,
}

impl RulesError {
    pub fn new(mv: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            mv: mv.into(),
            reason: reason.into(),
        }
    }
}

/// Externally visible surface of a game rules engine.
pub trait RulesEngine: Send {
    /// Apply `mv` to the current position. On error the position is
    /// unchanged.
    fn apply(&mut self, mv: &str) -> Result<(), RulesError>;

    /// Legal moves for the current position.
    fn valid_moves(&self) -> Vec<String>;

    /// The terminal outcome, once the position has one.
    fn outcome(&self) -> Option<Outcome>;

    /// Every successfully applied move, in order.
    fn history(&self) -> Vec<String>;
}
