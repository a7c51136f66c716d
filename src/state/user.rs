use tokio::sync::mpsc;

use crate::protocol::Packet;

/// Something delivered to a session task over its `outbox`. Besides ordinary
/// outbound packets, a session can be told to tear itself down — e.g. a kick
/// needs the target's own task to stop reading and run cleanup, and there is
/// no other channel into that task's `select!` loop. Routing both through one
/// mpsc keeps a `Close` ordered after any packet enqueued ahead of it (a kick
/// notice always reaches the socket before the connection drops).
pub enum SessionEvent {
    Deliver(Packet),
    Close,
}

/// One connected client. Owned by the [`Registry`](super::Registry); the
/// owning session task is the only one that ever reads from the other half
/// of `outbox` and writes to the real socket, so cross-task delivery goes
/// through this channel rather than a shared socket handle.
pub struct User {
    pub nickname: String,
    pub outbox: mpsc::Sender<SessionEvent>,
    pub room: Option<u32>,
    /// Set by a first `delete_account`, cleared by any other command.
    pub pending_delete: bool,
}

impl User {
    pub fn new(nickname: impl Into<String>, outbox: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            nickname: nickname.into(),
            outbox,
            room: None,
            pending_delete: false,
        }
    }
}
