use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Opcode values are fixed to the original numbering so the wire format is
/// unambiguous across implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketType {
    Message = 0,
    SetId = 1,
    IdChange = 2,
    CreateRoom = 3,
    JoinRoom = 4,
    LeaveRoom = 5,
    ListRooms = 6,
    ListUsers = 7,
    KickUser = 8,
    ChangeRoomName = 9,
    ChangeRoomManager = 10,
    DeleteAccount = 11,
    DeleteMessage = 12,
    Help = 13,
    Usage = 14,
    Error = 15,
    Quit = 16,
    ServerNotice = 100,
}

/// A fully decoded packet: type plus payload, checksum already verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ty: PacketType,
    pub data: Bytes,
}

impl Packet {
    pub fn new(ty: PacketType, data: impl Into<Bytes>) -> Self {
        Self {
            ty,
            data: data.into(),
        }
    }

    pub fn empty(ty: PacketType) -> Self {
        Self::new(ty, Bytes::new())
    }

    pub fn text(ty: PacketType, s: impl Into<String>) -> Self {
        Self::new(ty, s.into().into_bytes())
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::text(PacketType::Error, msg)
    }

    pub fn notice(msg: impl Into<String>) -> Self {
        Self::text(PacketType::ServerNotice, msg)
    }

    pub fn text_payload(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }
}
