// deskling_protocol — client-synchronization types for the Deskling engine.
//
// The engine core owns no wire format, but it does owe its protocol layer a
// faithful, serializable description of every mascot: which behavior and
// action are active, the action stack, and every variable slot with its
// kind, value, used flag, and bound script id. This crate defines those
// snapshot types plus a minimal length-delimited framing so a broadcast
// server can ship them to clients over any `Read`/`Write` stream.
//
// Module overview:
// - `snapshot.rs`: `MascotSnapshot`, `SlotSnapshot`, `ColonyUpdate`.
// - `framing.rs`:  4-byte big-endian length prefix + JSON payload framing.
//
// Design decisions:
// - **JSON serialization.** Matches the serde usage of the engine crate;
//   a binary codec can be swapped in behind the same framing later.
// - **No dependency on the engine.** The engine depends on this crate and
//   converts its internal state into these types, never the other way
//   around. The snapshot enums mirror (rather than re-export) the engine's.
// - **No async runtime.** Framing works on plain `std::io` streams.

pub mod framing;
pub mod snapshot;

pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use snapshot::{ColonyUpdate, MascotSnapshot, SlotSnapshot, SlotValue, SnapshotState};
