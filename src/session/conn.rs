use std::io;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::{ChatDecoder, ChatEncoder};
use crate::error::ChatError;
use crate::protocol::{Packet, REQ_MAGIC};

/// A split, framed TCP connection for one session. Only this struct's owner
/// ever writes to the socket; other tasks deliver messages to it through an
/// mpsc channel instead (see [`crate::state::User::outbox`]).
pub struct Conn {
    r: FramedRead<ReadHalf<TcpStream>, ChatDecoder>,
    w: FramedWrite<WriteHalf<TcpStream>, ChatEncoder>,
    peer_addr: SocketAddr,
}

impl Conn {
    pub fn new(socket: TcpStream) -> io::Result<Self> {
        let peer_addr = socket.peer_addr()?;
        let (r, w) = tokio::io::split(socket);
        Ok(Self {
            r: FramedRead::new(r, ChatDecoder::new(REQ_MAGIC)),
            w: FramedWrite::new(w, ChatEncoder::server()),
            peer_addr,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Reads the next packet. `Ok(None)` means end-of-stream (clean close).
    pub async fn read_packet(&mut self) -> Result<Option<Packet>, ChatError> {
        self.r.next().await.transpose()
    }

    pub async fn send_packet(&mut self, packet: Packet) -> Result<(), ChatError> {
        self.w.send(packet).await
    }
}
