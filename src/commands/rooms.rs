use crate::error::{ChatError, CommandError};
use crate::protocol::{Packet, PacketType};
use crate::session::conn::Conn;

use super::{reply_error, Ctx};

const MIN_NAME_LEN: usize = 1;
const MAX_NAME_LEN: usize = 31;

fn parse_room_id(data: &[u8]) -> Result<u32, CommandError> {
    if data.len() == 4 {
        let bytes: [u8; 4] = data.try_into().map_err(|_| CommandError::InvalidArgument)?;
        Ok(u32::from_be_bytes(bytes))
    } else {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .ok_or(CommandError::InvalidArgument)
    }
}

pub async fn handle_rename(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let new_name = packet.text_payload().unwrap_or("").trim().to_string();
    let result = rename_inner(ctx, &new_name);
    if result.is_ok() {
        conn.send_packet(Packet::text(PacketType::IdChange, new_name.clone()))
            .await?;
        ctx.nickname = new_name;
    }
    reply_error(conn, result).await
}

fn rename_inner(ctx: &Ctx<'_>, new_name: &str) -> Result<(), CommandError> {
    if new_name.len() < 2 || new_name.len() > 20 {
        return Err(CommandError::InvalidNicknameLength);
    }
    ctx.registry.rename_user(&ctx.nickname, new_name)
}

pub async fn handle_create(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let name = packet.text_payload().unwrap_or("").trim().to_string();
    let result = create_inner(ctx, &name);
    if let Ok(room_no) = result {
        conn.send_packet(Packet::text(
            PacketType::CreateRoom,
            format!("Room '{name}' (ID: {room_no}) created and joined."),
        ))
        .await?;
    }
    reply_error(conn, result.map(|_| ())).await
}

fn create_inner(ctx: &Ctx<'_>, name: &str) -> Result<u32, CommandError> {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(CommandError::InvalidRoomNameLength);
    }
    ctx.registry.create_room(name, &ctx.nickname)
}

pub async fn handle_join(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let room_no = match parse_room_id(&packet.data) {
        Ok(id) => id,
        Err(e) => return reply_error(conn, Err(e)).await,
    };

    if ctx.registry.user_room(&ctx.nickname).is_some() {
        return reply_error(conn, Err(CommandError::AlreadyInRoom)).await;
    }
    if !ctx.registry.room_exists(room_no) {
        return reply_error(conn, Err(CommandError::RoomNotFound(room_no))).await;
    }

    let result = ctx.registry.add_member_to_room(room_no, &ctx.nickname);
    if result.is_err() {
        return reply_error(conn, result).await;
    }

    conn.send_packet(Packet::text(
        PacketType::JoinRoom,
        format!("Joined room {room_no}."),
    ))
    .await?;

    replay_history(conn, ctx, room_no).await?;

    ctx.registry.broadcast_room(
        room_no,
        Some(&ctx.nickname),
        Packet::notice(format!("{} joined the room.", ctx.nickname)),
    );

    Ok(())
}

async fn replay_history(conn: &mut Conn, ctx: &Ctx<'_>, room_no: u32) -> Result<(), ChatError> {
    let since = match ctx
        .registry
        .store()
        .earliest_join_time(room_no, &ctx.nickname)
    {
        Ok(Some(ts)) => ts,
        _ => return Ok(()),
    };

    let history = ctx
        .registry
        .store()
        .messages_since(room_no, &since)
        .unwrap_or_default();

    for (sender, body) in history {
        conn.send_packet(Packet::text(
            PacketType::Message,
            format!("[{sender}] {body}"),
        ))
        .await?;
    }
    Ok(())
}

pub async fn handle_leave(conn: &mut Conn, ctx: &mut Ctx<'_>) -> Result<(), ChatError> {
    let room_no = match ctx.registry.user_room(&ctx.nickname) {
        Some(r) => r,
        None => return reply_error(conn, Err(CommandError::NotInRoom)).await,
    };

    let destroyed = match ctx.registry.remove_member_from_room(room_no, &ctx.nickname) {
        Ok(d) => d,
        Err(e) => return reply_error(conn, Err(e)).await,
    };

    conn.send_packet(Packet::empty(PacketType::LeaveRoom)).await?;

    if !destroyed {
        ctx.registry.broadcast_room(
            room_no,
            Some(&ctx.nickname),
            Packet::notice(format!("{} left the room.", ctx.nickname)),
        );
    }
    Ok(())
}

pub async fn handle_list_rooms(conn: &mut Conn, ctx: &mut Ctx<'_>) -> Result<(), ChatError> {
    let rooms = ctx.registry.room_listing();
    let text = if rooms.is_empty() {
        "No rooms available.".to_string()
    } else {
        rooms
            .iter()
            .map(|(id, name, count)| format!("ID {id}: '{name}' ({count} members)"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    conn.send_packet(Packet::text(PacketType::ListRooms, text))
        .await?;
    Ok(())
}

pub async fn handle_list_users(conn: &mut Conn, ctx: &mut Ctx<'_>) -> Result<(), ChatError> {
    let mut names = match ctx.registry.user_room(&ctx.nickname) {
        Some(room_no) => ctx.registry.room_members(room_no),
        None => ctx.registry.all_nicknames(),
    };
    names.sort();
    let text = format!("{}\n", names.join(", "));
    conn.send_packet(Packet::text(PacketType::ListUsers, text))
        .await?;
    Ok(())
}

pub async fn handle_kick(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let target = packet.text_payload().unwrap_or("").trim().to_string();
    let result = kick_inner(ctx, &target);
    if result.is_ok() {
        // Queued in order on the target's own outbox: the notice is
        // delivered to their socket before Close ends their session.
        ctx.registry
            .send_to(&target, Packet::text(PacketType::KickUser, "You have been kicked."));
        ctx.registry.close_session(&target);
    }
    reply_error(conn, result).await
}

fn kick_inner(ctx: &Ctx<'_>, target: &str) -> Result<(), CommandError> {
    if target == ctx.nickname {
        return Err(CommandError::SelfTarget);
    }
    let room_no = ctx.registry.user_room(&ctx.nickname).ok_or(CommandError::NotInRoom)?;
    let manager = ctx.registry.room_manager(room_no).ok_or(CommandError::RoomNotFound(room_no))?;
    if manager != ctx.nickname {
        return Err(CommandError::NotManager);
    }
    if !ctx.registry.room_members(room_no).iter().any(|m| m == target) {
        return Err(CommandError::UserNotFound(target.to_string()));
    }
    ctx.registry.remove_member_from_room(room_no, target)?;
    ctx.registry.broadcast_room(
        room_no,
        None,
        Packet::notice(format!("{target} was kicked from the room.")),
    );
    Ok(())
}

pub async fn handle_change_name(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let new_name = packet.text_payload().unwrap_or("").trim().to_string();
    let result = change_name_inner(ctx, &new_name);
    if result.is_ok() {
        conn.send_packet(Packet::text(PacketType::ChangeRoomName, new_name))
            .await?;
    }
    reply_error(conn, result).await
}

fn change_name_inner(ctx: &Ctx<'_>, new_name: &str) -> Result<(), CommandError> {
    if new_name.len() < MIN_NAME_LEN || new_name.len() > MAX_NAME_LEN {
        return Err(CommandError::InvalidRoomNameLength);
    }
    let room_no = ctx.registry.user_room(&ctx.nickname).ok_or(CommandError::NotInRoom)?;
    let manager = ctx.registry.room_manager(room_no).ok_or(CommandError::RoomNotFound(room_no))?;
    if manager != ctx.nickname {
        return Err(CommandError::NotManager);
    }
    ctx.registry.rename_room(room_no, new_name)
}

pub async fn handle_change_manager(conn: &mut Conn, ctx: &mut Ctx<'_>, packet: &Packet) -> Result<(), ChatError> {
    let target = packet.text_payload().unwrap_or("").trim().to_string();
    let result = change_manager_inner(ctx, &target);
    if result.is_ok() {
        conn.send_packet(Packet::text(PacketType::ChangeRoomManager, target.clone()))
            .await?;
    }
    reply_error(conn, result).await
}

fn change_manager_inner(ctx: &Ctx<'_>, target: &str) -> Result<(), CommandError> {
    if target == ctx.nickname {
        return Err(CommandError::SelfTarget);
    }
    let room_no = ctx.registry.user_room(&ctx.nickname).ok_or(CommandError::NotInRoom)?;
    let manager = ctx.registry.room_manager(room_no).ok_or(CommandError::RoomNotFound(room_no))?;
    if manager != ctx.nickname {
        return Err(CommandError::NotManager);
    }
    let result = ctx.registry.set_room_manager(room_no, target);
    if result.is_ok() {
        ctx.registry.broadcast_room(
            room_no,
            None,
            Packet::notice(format!("{target} is now the room manager.")),
        );
    }
    result
}
