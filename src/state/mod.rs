//! In-memory state registry (`C3`): users, rooms, and membership.
//!
//! Grounded on `examples/original_source/교수님코드/chat_server_1.c`
//! (`g_clients_mutex` / `g_rooms_mutex` lock discipline, `_unlocked` helper
//! naming convention) and `examples/OpenRustMS-net/crates/shroom-net/src/server/room.rs`
//! (`RoomSet` membership tracking) for the Rust-idiomatic collection shape.
//! `MAX_CLIENT = 100` slot sizing comes from `chat_server.h`.

mod registry;
mod room;
mod user;

pub use registry::Registry;
pub use room::Room;
pub use user::{SessionEvent, User};
