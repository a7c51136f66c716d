//! Wire packet types and framing constants.

mod packet;

pub use packet::{Packet, PacketType};

/// Magic bytes identifying a client-to-server frame.
pub const REQ_MAGIC: u16 = 0x5a5a;
/// Magic bytes identifying a server-to-client frame.
pub const RES_MAGIC: u16 = 0xa5a5;

/// `magic(2) + type(1) + data_len(2)`.
pub const HEADER_LEN: usize = 5;

/// Trailing checksum byte.
pub const CHECKSUM_LEN: usize = 1;

/// Hard ceiling on `data_len`; frames above this are dropped as malformed.
pub const MAX_DATA_LEN: usize = 2048;

/// Maximum simultaneously connected users (`MAX_CLIENT` in the original).
pub const MAX_CLIENTS: usize = 100;

/// Maximum members of a single room (also `MAX_CLIENT`).
pub const MAX_ROOM_MEMBERS: usize = 100;

/// XOR checksum over a header+payload slice, matching `calculate_checksum()`
/// in the original implementation.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_xor_of_all_bytes() {
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(checksum(&[0xff]), 0xff);
        assert_eq!(checksum(&[]), 0x00);
    }

    #[test]
    fn packet_type_round_trips_through_u8() {
        for (value, ty) in [
            (0u8, PacketType::Message),
            (11, PacketType::DeleteAccount),
            (100, PacketType::ServerNotice),
        ] {
            let decoded = PacketType::try_from(value).unwrap();
            assert_eq!(decoded, ty);
            let encoded: u8 = ty.into();
            assert_eq!(encoded, value);
        }
    }

    #[test]
    fn unknown_packet_type_rejected() {
        assert!(PacketType::try_from(99u8).is_err());
    }
}
