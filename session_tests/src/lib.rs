// Test harness for end-to-end session scenarios.
//
// Provides a scripted rules engine and synchronous wait helpers around the
// real node API (`gambit_game::runner`). Everything else in the scenarios —
// directory, mesh, coordinator — is the same code a live node runs; the
// only test-specific pieces are the engine double and the blocking loops
// around `CoordinatorHandle::status()`.
//
// See `tests/full_session.rs` for the scenarios.

use std::thread;
use std::time::{Duration, Instant};

use gambit_directory::Outcome;
use gambit_game::coordinator::{Phase, Status};
use gambit_game::rules::{RulesError, RulesEngine};
use gambit_game::runner::CoordinatorHandle;

/// Default timeout for blocking waits.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(8);

/// Sleep between status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Engine double: accepts any move it has not seen before, and reports the
/// configured outcome once the designated final move lands. Rejecting
/// repeats is exactly the behavior the duplicate-tolerance of the protocol
/// leans on.
pub struct ScriptedRules {
    history: Vec<String>,
    ending: Option<(String, Outcome)>,
}

impl ScriptedRules {
    pub fn open_ended() -> Self {
        Self {
            history: Vec::new(),
            ending: None,
        }
    }

    /// The game ends with `outcome` as soon as `final_move` is applied.
    pub fn ending_with(final_move: &str, outcome: Outcome) -> Self {
        Self {
            history: Vec::new(),
            ending: Some((final_move.to_owned(), outcome)),
        }
    }
}

impl RulesEngine for ScriptedRules {
    fn apply(&mut self, mv: &str) -> Result<(), RulesError> {
        if self.history.iter().any(|m| m == mv) {
            return Err(RulesError::new(mv, "not legal for this position"));
        }
        self.history.push(mv.to_owned());
        Ok(())
    }

    fn valid_moves(&self) -> Vec<String> {
        vec!["e2e4".into(), "e7e5".into(), "g1f3".into()]
    }

    fn outcome(&self) -> Option<Outcome> {
        let (final_move, outcome) = self.ending.as_ref()?;
        self.history
            .iter()
            .any(|m| m == final_move)
            .then_some(*outcome)
    }

    fn history(&self) -> Vec<String> {
        self.history.clone()
    }
}

/// Block until `predicate` accepts the node's status. Panics with `what`
/// on timeout, printing the last snapshot.
pub fn wait_until(handle: &CoordinatorHandle, what: &str, predicate: impl Fn(&Status) -> bool) {
    let start = Instant::now();
    loop {
        let status = handle.status();
        if predicate(&status) {
            return;
        }
        assert!(
            start.elapsed() < WAIT_TIMEOUT,
            "timed out waiting for {what}; last status: {status:?}"
        );
        thread::sleep(POLL_INTERVAL);
    }
}

pub fn wait_for_phase(handle: &CoordinatorHandle, phase: Phase) {
    wait_until(handle, &format!("phase {phase:?}"), |s| s.phase == phase);
}

pub fn wait_for_history(handle: &CoordinatorHandle, moves: &[&str]) {
    wait_until(handle, &format!("history {moves:?}"), |s| {
        s.history == moves.iter().map(|m| m.to_string()).collect::<Vec<_>>()
    });
}
