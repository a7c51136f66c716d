//! Command dispatch and handlers (`C4`).
//!
//! One handler function per packet type, matched on
//! [`PacketType`](crate::protocol::PacketType). Grounded in
//! `examples/original_source/교수님코드/chat_server_1.c` (`broadcast_room`,
//! `broadcast_lobby`, the command set) and `chat_server_2.c`
//! (`process_join_room_request`'s 4-byte id encoding). The teacher's
//! `shroom_router_fn!`/`call_handler_fn` opcode-table machinery
//! (`examples/OpenRustMS-net/crates/shroom-net/src/server/handler.rs`) is
//! simplified here to a plain `match`, since this protocol's opcode set is
//! small and fixed rather than an extensible game-packet surface.

mod account;
mod help;
mod messages;
mod rooms;

use crate::error::ChatError;
use crate::protocol::{Packet, PacketType};
use crate::session::conn::Conn;
use crate::state::Registry;

/// What the session loop should do after a dispatched command.
pub enum Outcome {
    Continue,
    Quit,
}

pub struct Ctx<'a> {
    pub registry: &'a Registry,
    pub nickname: String,
}

pub async fn dispatch(
    conn: &mut Conn,
    ctx: &mut Ctx<'_>,
    packet: Packet,
) -> Result<Outcome, ChatError> {
    if packet.ty != PacketType::DeleteAccount {
        ctx.registry.set_pending_delete(&ctx.nickname, false);
    }

    // Each handler is responsible for sending its own success or ERROR
    // packet(s); only transport failures propagate out of dispatch.
    match packet.ty {
        PacketType::Message => messages::handle_message(conn, ctx, &packet).await?,
        PacketType::SetId => rooms::handle_rename(conn, ctx, &packet).await?,
        PacketType::CreateRoom => rooms::handle_create(conn, ctx, &packet).await?,
        PacketType::JoinRoom => rooms::handle_join(conn, ctx, &packet).await?,
        PacketType::LeaveRoom => rooms::handle_leave(conn, ctx).await?,
        PacketType::ListRooms => rooms::handle_list_rooms(conn, ctx).await?,
        PacketType::ListUsers => rooms::handle_list_users(conn, ctx).await?,
        PacketType::KickUser => rooms::handle_kick(conn, ctx, &packet).await?,
        PacketType::ChangeRoomName => rooms::handle_change_name(conn, ctx, &packet).await?,
        PacketType::ChangeRoomManager => rooms::handle_change_manager(conn, ctx, &packet).await?,
        PacketType::DeleteMessage => messages::handle_delete_message(conn, ctx, &packet).await?,
        PacketType::DeleteAccount => return account::handle_delete_account(conn, ctx).await,
        PacketType::Help => help::handle_help(conn).await?,
        PacketType::Usage => help::handle_usage(conn).await?,
        PacketType::Quit => return Ok(Outcome::Quit),
        other => {
            conn.send_packet(Packet::error(format!("Unsupported request type {:?}", other)))
                .await?;
        }
    }

    Ok(Outcome::Continue)
}

/// Sends `result`'s error (if any) to `conn` as an ERROR packet; success is a no-op.
/// Shared by every handler so validation failures never need an early return
/// past the point where state has already changed.
pub(crate) async fn reply_error(
    conn: &mut Conn,
    result: Result<(), crate::error::CommandError>,
) -> Result<(), ChatError> {
    if let Err(e) = result {
        conn.send_packet(Packet::error(e.to_string())).await?;
    }
    Ok(())
}
