use crate::error::ChatError;
use crate::protocol::{Packet, PacketType};
use crate::session::conn::Conn;

use super::{Ctx, Outcome};

/// Two-phase account deletion: the first call sets `pending_delete` and
/// prompts; the second performs the deletion and ends the session. Any
/// other command clears the pending flag (`mod.rs::dispatch`), so this
/// handler is the only place that ever reads it without immediately
/// clearing it again.
pub async fn handle_delete_account(conn: &mut Conn, ctx: &mut Ctx<'_>) -> Result<Outcome, ChatError> {
    if !ctx.registry.is_pending_delete(&ctx.nickname) {
        ctx.registry.set_pending_delete(&ctx.nickname, true);
        conn.send_packet(Packet::text(
            PacketType::DeleteAccount,
            "Send DELETE_ACCOUNT again to confirm permanent deletion.",
        ))
        .await?;
        return Ok(Outcome::Continue);
    }

    if let Some(room_no) = ctx.registry.user_room(&ctx.nickname) {
        if let Ok(destroyed) = ctx.registry.remove_member_from_room(room_no, &ctx.nickname) {
            if !destroyed {
                ctx.registry.broadcast_room(
                    room_no,
                    Some(&ctx.nickname),
                    Packet::notice(format!("{} left the room.", ctx.nickname)),
                );
            }
        }
    }

    if let Err(e) = ctx.registry.store().delete_user(&ctx.nickname) {
        log::error!("failed to delete user '{}': {e}", ctx.nickname);
    }

    conn.send_packet(Packet::notice("Your account has been deleted. Goodbye."))
        .await?;
    Ok(Outcome::Quit)
}
