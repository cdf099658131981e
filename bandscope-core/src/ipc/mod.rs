//! Event types broadcast to rendering collaborators.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them over whatever bus it uses (JSON lines, IPC, websockets).

pub mod events;
