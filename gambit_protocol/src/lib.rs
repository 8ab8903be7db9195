// gambit_protocol — wire protocol for peer-to-peer game coordination.
//
// This crate defines the message types and framing used by mesh peers to
// exchange game events over TCP. It is shared by the mesh transport
// (`gambit_mesh`) and the coordination layer (`gambit_game`) and depends on
// neither.
//
// Module overview:
// - `types.rs`:   `PeerId` — logical peer identity `<session-name>-<slot>`.
// - `message.rs`: `Envelope` (the single wire record) and `MessageKind`
//                 (the typed protocol vocabulary).
// - `wire.rs`:    Newline-delimited JSON framing over any `BufRead` stream,
//                 with a max-line guard.
//
// Design decisions:
// - **JSON lines, not length prefixes.** One compact JSON object per
//   `\n`-terminated line. Human-readable on the wire, and a whole record is
//   always a single write.
// - **Kind stays a string in the envelope.** The mesh forwards records it
//   cannot interpret; only the game layer narrows to `MessageKind`, so a
//   newer peer with extra kinds degrades to log-and-drop instead of a
//   disconnect.
// - **No async runtime.** Plain `std::io` traits, compatible with blocking
//   TCP streams and buffered wrappers.

pub mod message;
pub mod types;
pub mod wire;

pub use message::{Envelope, MessageKind, UnknownKind};
pub use types::PeerId;
pub use wire::{decode_line, encode_line, read_line, MAX_LINE_BYTES};
