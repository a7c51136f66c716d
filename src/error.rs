use thiserror::Error;

/// Errors that end a session or abort startup.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("bad packet magic: {0:#06x}")]
    BadMagic(u16),

    #[error("checksum mismatch")]
    BadChecksum,

    #[error("frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("unexpected packet type {0} during handshake")]
    UnexpectedDuringHandshake(u8),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("session ended")]
    SessionEnded,
}

/// Validation failures raised by command handlers. These are never fatal:
/// the session catches them and sends an ERROR packet with the `Display` text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Nickname must be 2-20 characters.")]
    InvalidNicknameLength,

    #[error("Nickname '{0}' is already in use.")]
    NicknameTaken(String),

    #[error("Room name must be 1-31 characters.")]
    InvalidRoomNameLength,

    #[error("Room name '{0}' is already in use.")]
    RoomNameTaken(String),

    #[error("You are already in a room.")]
    AlreadyInRoom,

    #[error("You are not in a room.")]
    NotInRoom,

    #[error("Room {0} not found.")]
    RoomNotFound(u32),

    #[error("User '{0}' not found.")]
    UserNotFound(String),

    #[error("Room is full.")]
    RoomFull,

    #[error("Only the room manager may do that.")]
    NotManager,

    #[error("You cannot target yourself.")]
    SelfTarget,

    #[error("Message {0} not found.")]
    MessageNotFound(u64),

    #[error("You may only delete your own messages, or as room manager.")]
    NotMessageOwner,

    #[error("Message body must not be empty.")]
    EmptyMessage,

    #[error("Server is full. Try again later.")]
    ServerFull,

    #[error("Invalid argument.")]
    InvalidArgument,

    #[error("internal error: {0}")]
    Internal(String),
}
