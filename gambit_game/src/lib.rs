// gambit_game — session coordination on top of the peer mesh.
//
// This crate turns a mesh of connected peers into a playable game session:
// it counts handshakes until everyone expected is present, elects and
// propagates the first turn, applies and broadcasts moves, replays state to
// recovering peers, and records the authoritative outcome with the
// directory.
//
// Module overview:
// - `coordinator.rs`: The per-session state machine. Single-threaded: every
//                     input arrives as a `GameEvent` on one channel.
// - `runner.rs`:      Node startup (`start_host`/`start_joiner`/
//                     `start_restore`), the event loop thread, and the
//                     UI-facing `CoordinatorHandle`.
// - `turn.rs`:        Symmetric turn-ownership arithmetic, deterministic
//                     across peers.
// - `rules.rs`:       The rules-engine seam; the platform consumes move
//                     validation, legal moves, outcome, and history.
// - `adapters.rs`:    The clock and randomness seams (envelope timestamps
//                     and the turn election).
// - `config.rs`:      Environment-driven node settings.
// - `logging.rs`:     Rotating-file tracing setup.

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod rules;
pub mod runner;
pub mod turn;

pub use adapters::{Clock, ManualClock, RandSource, SeededRand, SystemClock, ThreadRand};
pub use config::NodeConfig;
pub use coordinator::{GameEvent, Phase, Status};
pub use logging::init_logging;
pub use rules::{RulesEngine, RulesError};
pub use runner::{start_host, start_joiner, start_restore, CoordinatorHandle, GameError};
