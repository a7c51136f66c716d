use std::sync::Arc;

use shroom_chat::server::Server;
use shroom_chat::state::Registry;
use shroom_chat::store::Store;

const DEFAULT_DB_FILE: &str = "chat.db";
const DEFAULT_PORT: u16 = 9000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let db_file = std::env::var("CHAT_DB_FILE").unwrap_or_else(|_| DEFAULT_DB_FILE.to_string());
    let port: u16 = std::env::var("CHAT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    log::info!("opening store at '{db_file}'");
    let store = Arc::new(Store::open(&db_file)?);
    let max_room_no = store.reconcile_on_startup()?;

    let registry = Arc::new(Registry::new(store, max_room_no + 1));

    log::info!("listening on 0.0.0.0:{port}");
    let server = Server::bind(port, registry).await?;
    server.run().await?;

    Ok(())
}
