//! Black-box scenarios from the design's end-to-end walkthrough: handshake,
//! room creation and chat, history replay, kick, and two-phase deletion.

mod common;

use common::TestServer;
use shroom_chat::protocol::PacketType;

#[tokio::test]
async fn handshake_assigns_requested_nickname() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.handshake("alice").await;
}

#[tokio::test]
async fn create_room_and_chat_round_trip() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.handshake("alice").await;

    alice.send(PacketType::CreateRoom, "lobby".as_bytes().to_vec()).await;
    let resp = alice.recv().await;
    assert_eq!(resp.ty, PacketType::CreateRoom);
    assert!(resp.text_payload().unwrap().contains("lobby"));

    alice.send(PacketType::Message, "hi".as_bytes().to_vec()).await;
    let echo = alice.recv().await;
    assert_eq!(echo.ty, PacketType::Message);
    assert_eq!(echo.text_payload().unwrap(), "[alice] hi");
}

#[tokio::test]
async fn history_replay_on_join() {
    let server = TestServer::start().await;

    let mut alice = server.connect().await;
    alice.handshake("alice").await;
    alice.send(PacketType::CreateRoom, "lobby".as_bytes().to_vec()).await;
    let _ = alice.recv().await;
    alice.send(PacketType::Message, "hi".as_bytes().to_vec()).await;
    let _echo = alice.recv().await;

    let mut bob = server.connect().await;
    bob.handshake("bob").await;
    bob.send(PacketType::JoinRoom, "1".as_bytes().to_vec()).await;
    let join_resp = bob.recv().await;
    assert_eq!(join_resp.ty, PacketType::JoinRoom);

    let history = bob.recv().await;
    assert_eq!(history.ty, PacketType::Message);
    assert_eq!(history.text_payload().unwrap(), "[alice] hi");

    // Alice sees bob's join notice.
    let notice = alice.recv().await;
    assert_eq!(notice.ty, PacketType::ServerNotice);
    assert!(notice.text_payload().unwrap().contains("bob"));

    // A message sent after bob joins reaches both members, in order.
    alice.send(PacketType::Message, "welcome".as_bytes().to_vec()).await;
    let alice_echo = alice.recv().await;
    assert_eq!(alice_echo.text_payload().unwrap(), "[alice] welcome");
    let bob_sees = bob.recv().await;
    assert_eq!(bob_sees.text_payload().unwrap(), "[alice] welcome");
}

#[tokio::test]
async fn kick_removes_member_and_notifies() {
    let server = TestServer::start().await;

    let mut alice = server.connect().await;
    alice.handshake("alice").await;
    alice.send(PacketType::CreateRoom, "lobby".as_bytes().to_vec()).await;
    let _ = alice.recv().await;

    let mut bob = server.connect().await;
    bob.handshake("bob").await;
    bob.send(PacketType::JoinRoom, "1".as_bytes().to_vec()).await;
    let _join = bob.recv().await;
    let _notice = alice.recv().await; // bob joined notice

    alice.send(PacketType::KickUser, "bob".as_bytes().to_vec()).await;

    let kicked = bob.recv().await;
    assert_eq!(kicked.ty, PacketType::KickUser);

    // The target's session tears down: its socket half reads end-of-stream.
    assert!(bob.recv_eof().await);
}

#[tokio::test]
async fn two_phase_account_deletion_requires_confirmation() {
    let server = TestServer::start().await;
    let mut bob = server.connect().await;
    bob.handshake("bob").await;

    bob.send(PacketType::DeleteAccount, Vec::new()).await;
    let prompt = bob.recv().await;
    assert_eq!(prompt.ty, PacketType::DeleteAccount);

    bob.send(PacketType::DeleteAccount, Vec::new()).await;
    let farewell = bob.recv().await;
    assert_eq!(farewell.ty, PacketType::ServerNotice);
}

#[tokio::test]
async fn rejects_message_outside_a_room() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    alice.handshake("alice").await;

    alice.send(PacketType::Message, "hi".as_bytes().to_vec()).await;
    let resp = alice.recv().await;
    assert_eq!(resp.ty, PacketType::Error);
}
