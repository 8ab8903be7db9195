// gambit_mesh — reconnecting peer-to-peer TCP transport.
//
// This crate implements the connection fabric game nodes use to exchange
// ordered events directly: each node listens on a TCP port, keeps persistent
// connections to the other nodes of its session, and redials lost links with
// bounded exponential backoff. Messages are the newline-delimited JSON
// envelopes of `gambit_protocol`.
//
// Module overview:
// - `mesh.rs`: `PeerMesh` — listener, per-connection reader threads,
//              reconnector threads, send/broadcast, close. The connection
//              table is keyed by logical peer id, never by TCP address.
// - `bus.rs`:  `GameBus` — typed `MessageKind` sends and a tracked
//              expected-peer set scoping session broadcasts.
//
// Delivery contract: at-most-once per connection, FIFO per connection (one
// write per record over TCP), no ordering across distinct links, no
// duplicate suppression — the layer above tolerates both interleaving and
// redelivery.

pub mod bus;
pub mod mesh;

pub use bus::GameBus;
pub use mesh::{
    BroadcastError, ClockFn, MeshConfig, MeshError, PeerMesh, DEFAULT_MAX_BACKOFF,
    DEFAULT_RETRY_DELAY,
};
