//! Shared end-to-end test harness.
//!
//! Grounded on `examples/Humans-Not-Required-local-agent-chat/tests/integration/common.rs`'s
//! `TestClient` wrapper with `Drop`-based temp-database cleanup, adapted from
//! a local Rocket test client to a real TCP client against this crate's own
//! framed protocol.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

use shroom_chat::codec::{ChatDecoder, ChatEncoder};
use shroom_chat::protocol::{Packet, PacketType, REQ_MAGIC, RES_MAGIC};
use shroom_chat::server::Server;
use shroom_chat::state::Registry;
use shroom_chat::store::Store;

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    db_path: String,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let db_path = format!("/tmp/shroom_chat_test_{}.db", uuid_like());
        let store = Arc::new(Store::open(&db_path).expect("open test store"));
        let max_room = store.reconcile_on_startup().expect("reconcile");
        let registry = Arc::new(Registry::new(store, max_room + 1));

        let server = Server::bind(0, registry).await.expect("bind");
        let addr = server.local_addr().expect("local addr");

        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            db_path,
            _handle: handle,
        }
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos}_{n}")
}

pub struct TestClient {
    r: FramedRead<OwnedReadHalf, ChatDecoder>,
    w: FramedWrite<OwnedWriteHalf, ChatEncoder>,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr) -> Self {
        let socket = TcpStream::connect(addr).await.expect("connect");
        let (r, w) = socket.into_split();
        Self {
            r: FramedRead::new(r, ChatDecoder::new(RES_MAGIC)),
            w: FramedWrite::new(w, ChatEncoder::new(REQ_MAGIC)),
        }
    }

    pub async fn send(&mut self, ty: PacketType, payload: impl Into<Vec<u8>>) {
        self.w
            .send(Packet::new(ty, payload.into()))
            .await
            .expect("send");
    }

    pub async fn recv(&mut self) -> Packet {
        self.r
            .next()
            .await
            .expect("stream ended")
            .expect("decode error")
    }

    /// Waits (with a timeout) for the connection to close from the other
    /// end. Returns `true` if it did, `false` if a packet arrived instead.
    pub async fn recv_eof(&mut self) -> bool {
        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), self.r.next()).await;
        matches!(outcome, Ok(None))
    }

    /// Completes the nickname handshake: drains the welcome prompt, sends
    /// SET_ID, and drains the post-registration welcome notice.
    pub async fn handshake(&mut self, nickname: &str) {
        let _prompt = self.recv().await;
        self.send(PacketType::SetId, nickname.as_bytes().to_vec()).await;
        let _welcome = self.recv().await;
    }
}
