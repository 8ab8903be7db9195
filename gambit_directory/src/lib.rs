// gambit_directory — authoritative session registry and its access seam.
//
// The directory is the only shared-state service in the platform: it issues
// readable session names, records per-player endpoints, allocates slots on
// join, and holds the authoritative outcome. Peers talk to each other over
// the mesh; they talk *about* the session through this crate.
//
// Module overview:
// - `names.rs`:    `adjective-noun` session name generator.
// - `session.rs`:  Data model — kinds, turn modes, outcomes, slots, rows.
// - `registry.rs`: `Directory`, the in-process registry. Map lock for
//                  lookups, one mutex per session row for mutations.
// - `client.rs`:   `DirectoryClient` trait plus `LocalClient` (in-process)
//                  and `HttpClient` (blocking JSON over HTTP).
// - `clock.rs`:    Time seam so tests control row timestamps.
// - `error.rs`:    `DirectoryError`, doubling as the RPC error vocabulary.

pub mod client;
pub mod clock;
pub mod error;
pub mod names;
pub mod registry;
pub mod session;

pub use client::{DirectoryClient, HttpClient, LocalClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DirectoryError;
pub use registry::Directory;
pub use session::{Outcome, PlayerId, Session, SessionKind, Slot, TurnMode};
