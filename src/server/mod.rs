//! Listener accept loop and operator console (`C1`).
//!
//! Grounded on `examples/OpenRustMS-net/crates/shroom-net/src/server/mod.rs`
//! (`ShroomServer`'s accept loop) and
//! `examples/original_source/교수님코드/chat_server_1.c` (epoll-multiplexed
//! listener + stdin admin loop with `users`/`rooms`/`quit` commands).

mod admin;

use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::ChatError;
use crate::protocol::Packet;
use crate::state::Registry;

pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl Server {
    pub async fn bind(port: u16, registry: Arc<Registry>) -> Result<Self, ChatError> {
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(([0, 0, 0, 0], port).into())?;
        let listener = socket.listen(5)?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> Result<(), ChatError> {
        let mut admin_lines = admin::stdin_lines();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            log::warn!("accept failed: {e}");
                            continue;
                        }
                    };

                    if self.registry.is_full() {
                        log::info!("rejecting {peer}: server full");
                        tokio::spawn(reject_full(socket));
                        continue;
                    }

                    let registry = self.registry.clone();
                    tokio::spawn(async move {
                        crate::session::run(socket, &registry).await;
                    });
                }
                line = admin_lines.recv() => {
                    match line {
                        Some(line) => {
                            if admin::handle_command(&line, &self.registry) {
                                log::info!("operator requested shutdown");
                                return Ok(());
                            }
                        }
                        None => {
                            log::info!("operator input closed, shutting down");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

async fn reject_full(mut socket: tokio::net::TcpStream) {
    use tokio::io::AsyncWriteExt;

    let packet = Packet::notice("Server is full. Try again later.\n");
    let mut buf = bytes::BytesMut::new();
    let mut encoder = crate::codec::ChatEncoder::server();
    use tokio_util::codec::Encoder;
    if encoder.encode(packet, &mut buf).is_ok() {
        let _ = socket.write_all(&buf).await;
    }
    let _ = socket.shutdown().await;
}
