use crate::error::ChatError;
use crate::protocol::{Packet, PacketType};
use crate::session::conn::Conn;

const HELP_TEXT: &str = "\
MESSAGE <text> - send a message to your current room
SET_ID <nick> - change your nickname
CREATE_ROOM <name> - create and join a new room
JOIN_ROOM <id> - join an existing room
LEAVE_ROOM - leave your current room
LIST_ROOMS - list all rooms
LIST_USERS - list users in your room, or all connected users if in the lobby
KICK_USER <nick> - remove a user from your room (manager only)
CHANGE_ROOM_NAME <name> - rename your room (manager only)
CHANGE_ROOM_MANAGER <nick> - transfer room management (manager only)
DELETE_MESSAGE <id> - delete a message you sent, or any in your room (manager only)
DELETE_ACCOUNT - send twice to permanently delete your account
HELP - show this text
USAGE - show a short usage line
QUIT - disconnect";

const USAGE_TEXT: &str = "send HELP for the full command list";

pub async fn handle_help(conn: &mut Conn) -> Result<(), ChatError> {
    conn.send_packet(Packet::text(PacketType::Help, HELP_TEXT))
        .await
}

pub async fn handle_usage(conn: &mut Conn) -> Result<(), ChatError> {
    conn.send_packet(Packet::text(PacketType::Usage, USAGE_TEXT))
        .await
}
