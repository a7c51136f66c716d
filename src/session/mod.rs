//! Per-connection session task (`C2`): handshake, dispatch loop, cleanup.
//!
//! Grounded on `examples/OpenRustMS-net/crates/shroom-net/src/server/server_conn.rs`
//! (`ServerConnCtx::exec()`'s `tokio::select!` combining socket reads with an
//! mpsc receiver) and `conn.rs` (split-socket `FramedRead`/`FramedWrite`
//! wrapper), simplified from the teacher's generic handler-trait machinery to
//! a single concrete loop since this protocol has one fixed connection
//! lifecycle rather than a pluggable one.

pub mod conn;
mod handshake;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::commands::{self, Ctx, Outcome};
use crate::protocol::Packet;
use crate::state::{Registry, SessionEvent};

use conn::Conn;

const OUTBOX_CAPACITY: usize = 64;

pub async fn run(socket: TcpStream, registry: &Registry) {
    let peer = match socket.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };

    let mut conn = match Conn::new(socket) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("failed to wrap socket from {peer}: {e}");
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(OUTBOX_CAPACITY);

    let nickname = match handshake::run(&mut conn, registry).await {
        Ok(n) => n,
        Err(e) => {
            log::debug!("handshake with {peer} failed: {e}");
            return;
        }
    };

    if let Err(e) = registry.add_user(&nickname, tx) {
        log::warn!("could not register '{nickname}' from {peer}: {e}");
        let _ = conn.send_packet(Packet::error(e.to_string())).await;
        return;
    }

    log::info!("'{nickname}' connected from {peer}");
    conn.send_packet(Packet::notice(format!("Welcome, {nickname}!")))
        .await
        .ok();

    let mut ctx = Ctx {
        registry,
        nickname: nickname.clone(),
    };

    loop {
        tokio::select! {
            incoming = conn.read_packet() => {
                match incoming {
                    Ok(Some(packet)) => {
                        match commands::dispatch(&mut conn, &mut ctx, packet).await {
                            Ok(Outcome::Continue) => {}
                            Ok(Outcome::Quit) => break,
                            Err(e) => {
                                log::debug!("session '{}' ended: {e}", ctx.nickname);
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::debug!("session '{}' read error: {e}", ctx.nickname);
                        break;
                    }
                }
            }
            Some(event) = rx.recv() => {
                match event {
                    SessionEvent::Deliver(packet) => {
                        if conn.send_packet(packet).await.is_err() {
                            break;
                        }
                    }
                    SessionEvent::Close => break,
                }
            }
        }
    }

    cleanup(registry, &ctx.nickname);
}

/// Idempotent session teardown: removing an already-removed user is a no-op.
fn cleanup(registry: &Registry, nickname: &str) {
    if let Some(room_no) = registry.user_room(nickname) {
        if let Ok(destroyed) = registry.remove_member_from_room(room_no, nickname) {
            if !destroyed {
                registry.broadcast_room(
                    room_no,
                    Some(nickname),
                    Packet::notice(format!("{nickname} has disconnected.")),
                );
            }
        }
    }

    registry.remove_user(nickname);

    if let Err(e) = registry.store().set_connected(nickname, false) {
        log::warn!("failed to clear connected flag for '{nickname}': {e}");
    }

    log::info!("'{nickname}' disconnected");
}
