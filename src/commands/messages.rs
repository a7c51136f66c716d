use crate::error::{ChatError, CommandError};
use crate::protocol::{Packet, PacketType};
use crate::session::conn::Conn;

use super::{reply_error, Ctx};

pub async fn handle_message(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let body = packet.text_payload().unwrap_or("").to_string();
    let result = send_inner(ctx, &body);
    if result.is_ok() {
        conn.send_packet(Packet::text(
            PacketType::Message,
            format!("[{}] {body}", ctx.nickname),
        ))
        .await?;
    }
    reply_error(conn, result).await
}

fn send_inner(ctx: &Ctx<'_>, body: &str) -> Result<(), CommandError> {
    if body.is_empty() {
        return Err(CommandError::EmptyMessage);
    }
    let room_no = ctx.registry.user_room(&ctx.nickname).ok_or(CommandError::NotInRoom)?;

    ctx.registry
        .store()
        .insert_message(room_no, &ctx.nickname, body)
        .map_err(|e| CommandError::Internal(e.to_string()))?;

    ctx.registry.broadcast_room(
        room_no,
        Some(&ctx.nickname),
        Packet::text(PacketType::Message, format!("[{}] {body}", ctx.nickname)),
    );
    Ok(())
}

pub async fn handle_delete_message(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let message_id = match packet
        .text_payload()
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
    {
        Some(id) => id,
        None => return reply_error(conn, Err(CommandError::InvalidArgument)).await,
    };

    let result = delete_inner(ctx, message_id);
    if result.is_ok() {
        conn.send_packet(Packet::text(
            PacketType::DeleteMessage,
            message_id.to_string(),
        ))
        .await?;
    }
    reply_error(conn, result).await
}

fn delete_inner(ctx: &Ctx<'_>, message_id: u64) -> Result<(), CommandError> {
    let (sender, room_no) = ctx
        .registry
        .store()
        .message_owner(message_id)
        .map_err(|e| CommandError::Internal(e.to_string()))?
        .ok_or(CommandError::MessageNotFound(message_id))?;

    let user_room = ctx.registry.user_room(&ctx.nickname).ok_or(CommandError::NotInRoom)?;
    if user_room != room_no {
        return Err(CommandError::NotInRoom);
    }

    let is_manager = ctx.registry.room_manager(room_no).as_deref() == Some(ctx.nickname.as_str());
    if sender != ctx.nickname && !is_manager {
        return Err(CommandError::NotMessageOwner);
    }

    ctx.registry
        .store()
        .delete_message(message_id)
        .map_err(|e| CommandError::Internal(e.to_string()))
}
