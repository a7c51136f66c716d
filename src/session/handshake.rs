use rand::Rng;

use crate::error::ChatError;
use crate::protocol::{Packet, PacketType};
use crate::state::Registry;

use super::conn::Conn;

const MIN_NICK_LEN: usize = 2;
const MAX_NICK_LEN: usize = 20;
const RANDOM_ATTEMPTS: u32 = 10;

/// Runs the nickname handshake, re-prompting on collision, until a unique
/// nickname is registered or the connection ends.
///
/// Grounded on `examples/original_source/교수님코드/chat_server_1.c`'s random
/// nickname generation (`User<rand%100000>`, falling back to a time-derived
/// `Guest<suffix>` after repeated collisions).
pub async fn run(conn: &mut Conn, registry: &Registry) -> Result<String, ChatError> {
    loop {
        conn.send_packet(Packet::notice("Welcome. Send SET_ID with your desired nickname."))
            .await?;

        let packet = match conn.read_packet().await? {
            Some(p) => p,
            None => return Err(ChatError::SessionEnded),
        };

        if packet.ty != PacketType::SetId {
            return Err(ChatError::UnexpectedDuringHandshake(packet.ty.into()));
        }

        let requested = packet.text_payload().unwrap_or("").trim().to_string();

        let nickname = if requested.is_empty() {
            random_nickname(registry)
        } else if requested.len() < MIN_NICK_LEN || requested.len() > MAX_NICK_LEN {
            conn.send_packet(Packet::error("Nickname must be 2-20 characters."))
                .await?;
            continue;
        } else {
            requested
        };

        match registry.nickname_taken(&nickname) {
            Ok(true) => {
                conn.send_packet(Packet::error(format!(
                    "Nickname '{nickname}' is already in use."
                )))
                .await?;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                return Err(ChatError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                )))
            }
        }

        return Ok(nickname);
    }
}

fn random_nickname(registry: &Registry) -> String {
    let mut rng = rand::thread_rng();
    for _ in 0..RANDOM_ATTEMPTS {
        let candidate = format!("User{}", rng.gen_range(0..100_000));
        if !registry.nickname_taken(&candidate).unwrap_or(true) {
            return candidate;
        }
    }
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
        % 100_000;
    format!("Guest{suffix}")
}
