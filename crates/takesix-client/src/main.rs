//! Headless follower: joins or creates a game and logs what happens in it
//! until the game ends or Ctrl+C.

use tracing::{error, info, warn};

use takesix_client_lib::config::ClientConfig;
use takesix_client_lib::events::{ClientEvent, EventSink};
use takesix_client_lib::projection;
use takesix_client_lib::GameClient;
use takesix_shared::constants::APP_NAME;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration and tracing
    // -----------------------------------------------------------------------
    takesix_client_lib::init_tracing();
    info!("Starting {} client v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 2. Session
    // -----------------------------------------------------------------------
    let (events, mut rx) = EventSink::channel();
    let client = GameClient::connect(&config, events)?;
    let me = client.authenticate(config.credentials()).await?;

    // -----------------------------------------------------------------------
    // 3. Pick the game to follow
    // -----------------------------------------------------------------------
    match config.game_id {
        Some(game_id) => {
            let listed = client
                .list_games()
                .await?
                .into_iter()
                .find(|g| g.id == game_id);
            match listed {
                Some(game)
                    if projection::is_member(&game, me.id)
                        || projection::can_enter_game(&game, Some(&me), None) =>
                {
                    let outcome = client.actions().enter_game(&game).await?;
                    info!(game_id = %game_id, ?outcome, "Following configured game");
                }
                Some(game) => {
                    info!(game_id = %game_id, status = %game.status, "Game cannot be joined, watching it");
                    client.actions().show_game(game_id).await?;
                }
                None => {
                    warn!(game_id = %game_id, "Game not in the lobby, showing it anyway");
                    client.actions().show_game(game_id).await?;
                }
            }
        }
        None => {
            let game_id = client.actions().create_game().await?;
            info!(game_id = %game_id, owner = %me.username, "Created a new game");
        }
    }

    // -----------------------------------------------------------------------
    // 4. Report until the game ends
    // -----------------------------------------------------------------------
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => info!(event = %json, "{event}"),
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                }
                if let Some(view) = client.view() {
                    info!(
                        game_id = %view.game_id,
                        status = %view.status,
                        waiting_on = view.waiting_on.len(),
                        can_resolve_turn = view.can_resolve_turn,
                        "Game state"
                    );
                }
                if matches!(event, ClientEvent::GameFinished { .. } | ClientEvent::GameCleared) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}
