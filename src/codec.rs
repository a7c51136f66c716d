//! Framed binary codec: `magic(2) | type(1) | data_len(2) | payload | checksum(1)`.
//!
//! Direct structural descendant of the teacher's `LegacyDecoder`/`LegacyEncoder`
//! (a fixed-header codec implemented straight over `BytesMut`), generalized to
//! this protocol's XOR checksum trailer instead of a cipher.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ChatError;
use crate::protocol::{
    checksum, Packet, PacketType, CHECKSUM_LEN, HEADER_LEN, MAX_DATA_LEN, RES_MAGIC,
};

pub struct ChatDecoder {
    /// Which magic this side expects to read (clients read RES_MAGIC, the
    /// server reads REQ_MAGIC).
    expect_magic: u16,
}

impl ChatDecoder {
    pub fn new(expect_magic: u16) -> Self {
        Self { expect_magic }
    }
}

impl Decoder for ChatDecoder {
    type Item = Packet;
    type Error = ChatError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let magic = u16::from_be_bytes([src[0], src[1]]);
        if magic != self.expect_magic {
            return Err(ChatError::BadMagic(magic));
        }

        let ty_byte = src[2];
        let data_len = u16::from_be_bytes([src[3], src[4]]) as usize;

        if data_len > MAX_DATA_LEN {
            // Drain what we can of the oversize frame and report fatal.
            let have = src.len().min(HEADER_LEN + data_len + CHECKSUM_LEN);
            src.advance(have);
            return Err(ChatError::FrameTooLarge(data_len));
        }

        let total_len = HEADER_LEN + data_len + CHECKSUM_LEN;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total_len);
        let expected_checksum = frame[total_len - 1];
        let actual_checksum = checksum(&frame[..total_len - 1]);

        if actual_checksum != expected_checksum {
            // Tolerated: drop this one malformed packet and keep the
            // connection open.
            log::warn!("dropping frame with bad checksum (type {ty_byte})");
            return Ok(None);
        }

        let ty = match PacketType::try_from(ty_byte) {
            Ok(ty) => ty,
            Err(_) => {
                log::warn!("dropping frame with unknown type {ty_byte}");
                return Ok(None);
            }
        };

        let data = Bytes::copy_from_slice(&frame[HEADER_LEN..HEADER_LEN + data_len]);
        Ok(Some(Packet { ty, data }))
    }
}

pub struct ChatEncoder {
    magic: u16,
}

impl ChatEncoder {
    pub fn new(magic: u16) -> Self {
        Self { magic }
    }

    pub fn server() -> Self {
        Self::new(RES_MAGIC)
    }
}

impl Encoder<Packet> for ChatEncoder {
    type Error = ChatError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let data_len = item.data.len();
        if data_len > MAX_DATA_LEN {
            return Err(ChatError::FrameTooLarge(data_len));
        }

        let total_len = HEADER_LEN + data_len + CHECKSUM_LEN;
        dst.reserve(total_len);

        let start = dst.len();
        dst.put_u16(self.magic);
        dst.put_u8(item.ty.into());
        dst.put_u16(data_len as u16);
        dst.put_slice(&item.data);

        let sum = checksum(&dst[start..start + HEADER_LEN + data_len]);
        dst.put_u8(sum);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::REQ_MAGIC;

    #[test]
    fn round_trip_message() {
        let pkt = Packet::text(PacketType::Message, "hi");
        let mut buf = BytesMut::new();
        ChatEncoder::new(REQ_MAGIC).encode(pkt.clone(), &mut buf).unwrap();

        let mut dec = ChatDecoder::new(REQ_MAGIC);
        let decoded = dec.decode(&mut buf).unwrap().expect("one frame");
        assert_eq!(decoded.ty, PacketType::Message);
        assert_eq!(decoded.data, pkt.data);
        assert!(buf.is_empty());
    }

    #[test]
    fn round_trip_empty_payload() {
        let pkt = Packet::empty(PacketType::LeaveRoom);
        let mut buf = BytesMut::new();
        ChatEncoder::new(REQ_MAGIC).encode(pkt, &mut buf).unwrap();

        let mut dec = ChatDecoder::new(REQ_MAGIC);
        let decoded = dec.decode(&mut buf).unwrap().expect("one frame");
        assert_eq!(decoded.ty, PacketType::LeaveRoom);
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u16(0xdead);
        buf.put_u8(0);
        buf.put_u16(0);
        buf.put_u8(0);

        let mut dec = ChatDecoder::new(REQ_MAGIC);
        assert!(matches!(dec.decode(&mut buf), Err(ChatError::BadMagic(0xdead))));
    }

    #[test]
    fn flipped_checksum_bit_is_dropped_not_fatal() {
        let pkt = Packet::text(PacketType::Message, "hi");
        let mut buf = BytesMut::new();
        ChatEncoder::new(REQ_MAGIC).encode(pkt, &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        let mut dec = ChatDecoder::new(REQ_MAGIC);
        assert_eq!(dec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u16(REQ_MAGIC);
        buf.put_u8(0);
        buf.put_u16((MAX_DATA_LEN + 1) as u16);

        let mut dec = ChatDecoder::new(REQ_MAGIC);
        assert!(matches!(dec.decode(&mut buf), Err(ChatError::FrameTooLarge(_))));
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let pkt = Packet::text(PacketType::Message, "hello world");
        let mut full = BytesMut::new();
        ChatEncoder::new(REQ_MAGIC).encode(pkt, &mut full).unwrap();

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        let mut dec = ChatDecoder::new(REQ_MAGIC);
        assert_eq!(dec.decode(&mut partial).unwrap(), None);
    }
}
