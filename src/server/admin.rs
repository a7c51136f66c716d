//! Operator console: a line-oriented loop over stdin, multiplexed alongside
//! the TCP accept loop via `tokio::select!` in [`super::Server::run`].
//!
//! Grounded on `examples/original_source/교수님코드/chat_server_1.c`'s
//! epoll-multiplexed admin loop (`users`, `rooms`, `quit`/`exit`).

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::state::Registry;

/// Spawns a task that reads lines from stdin and forwards them on a channel,
/// so the caller can `select!` on it alongside other readiness sources.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }
    });
    rx
}

/// Returns `true` if the operator requested shutdown.
pub fn handle_command(line: &str, registry: &Registry) -> bool {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("users") => {
            for row in registry.store().all_users().unwrap_or_default() {
                println!(
                    "{} connected={} since={}",
                    row.user_id, row.connected, row.timestamp
                );
            }
        }
        Some("rooms") => {
            for row in registry.store().all_rooms().unwrap_or_default() {
                println!(
                    "{} '{}' manager={} members={}",
                    row.room_no, row.room_name, row.manager_id, row.member_count
                );
            }
        }
        Some("user_info") => match parts.next() {
            Some(id) => match registry.store().user_info(id) {
                Ok(Some(row)) => println!(
                    "{} connected={} since={}",
                    row.user_id, row.connected, row.timestamp
                ),
                Ok(None) => println!("no such user"),
                Err(e) => println!("error: {e}"),
            },
            None => println!("usage: user_info <nickname>"),
        },
        Some("room_info") => match parts.next() {
            Some(name) => match registry.store().room_info_by_name(name) {
                Ok(Some(row)) => println!(
                    "{} '{}' manager={} members={}",
                    row.room_no, row.room_name, row.manager_id, row.member_count
                ),
                Ok(None) => println!("no such room"),
                Err(e) => println!("error: {e}"),
            },
            None => println!("usage: room_info <name>"),
        },
        Some("recent_users") => {
            let limit = parts.next().and_then(|s| s.parse().ok()).unwrap_or(10);
            for row in registry.store().recent_users(limit).unwrap_or_default() {
                println!("{} since={}", row.user_id, row.timestamp);
            }
        }
        Some("quit") | Some("exit") => return true,
        Some(other) => println!("unknown command '{other}'"),
        None => {}
    }
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
    false
}
