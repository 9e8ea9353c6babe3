//! One handle over the whole client: shared state, synchronizer and actions.

use std::sync::Arc;

use tracing::info;

use takesix_net::{ApiResult, GameApi, HttpGameApi};
use takesix_shared::constants::DEFAULT_GAMES_PAGE_LIMIT;
use takesix_shared::types::{Game, User};

use crate::config::ClientConfig;
use crate::events::EventSink;
use crate::gateway::ActionGateway;
use crate::projection::GameView;
use crate::state::{self, lock_state, SharedState};
use crate::sync::Synchronizer;

pub struct GameClient {
    api: Arc<dyn GameApi>,
    state: SharedState,
    sync: Arc<Synchronizer>,
    actions: ActionGateway,
}

impl GameClient {
    pub fn new(api: Arc<dyn GameApi>, config: &ClientConfig, events: EventSink) -> Self {
        let state = state::shared();
        let sync = Synchronizer::new(
            api.clone(),
            state.clone(),
            events.clone(),
            config.poll_interval,
        );
        let actions = ActionGateway::new(api.clone(), state.clone(), sync.clone(), events);
        Self {
            api,
            state,
            sync,
            actions,
        }
    }

    /// Client talking HTTP to `config.server_url`.
    pub fn connect(config: &ClientConfig, events: EventSink) -> ApiResult<Self> {
        let api = HttpGameApi::new(config.server_url.clone(), config.request_timeout)?;
        info!(server = %api.base_url(), "Game server configured");
        Ok(Self::new(Arc::new(api), config, events))
    }

    /// Log in when credentials are given, then load the current user.
    pub async fn authenticate(&self, credentials: Option<(&str, &str)>) -> ApiResult<User> {
        if let Some((username, password)) = credentials {
            self.api.login(username, password).await?;
        }
        let user = self.api.current_user().await?;
        info!(user_id = %user.id, username = %user.username, "Authenticated");
        lock_state(&self.state).current_user = Some(user.clone());
        Ok(user)
    }

    /// First page of the lobby.
    pub async fn list_games(&self) -> ApiResult<Vec<Game>> {
        self.api.list_games(0, DEFAULT_GAMES_PAGE_LIMIT).await
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn sync(&self) -> &Arc<Synchronizer> {
        &self.sync
    }

    pub fn actions(&self) -> &ActionGateway {
        &self.actions
    }

    pub fn view(&self) -> Option<GameView> {
        GameView::project(&lock_state(&self.state))
    }

    pub fn shutdown(&self) {
        self.sync.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use takesix_shared::types::{GameId, GameStatus, UserId};

    use crate::testing::{game, user, MockApi};

    #[tokio::test]
    async fn test_authenticate_logs_in_then_loads_user() {
        let api = MockApi::new(user(4));
        let client = GameClient::new(api.clone(), &ClientConfig::default(), EventSink::disabled());

        let me = client.authenticate(Some(("carol", "secret"))).await.unwrap();

        assert_eq!(me.username, "carol");
        assert_eq!(
            api.calls(),
            vec!["POST /login".to_string(), "GET /users/current".to_string()]
        );
        assert_eq!(lock_state(client.state()).current_user_id(), Some(UserId(4)));
    }

    #[tokio::test]
    async fn test_view_follows_selection() {
        let api = MockApi::new(user(1));
        api.insert_game(game(7, GameStatus::Created, &[1]));
        let client = GameClient::new(api.clone(), &ClientConfig::default(), EventSink::disabled());
        client.authenticate(None).await.unwrap();
        assert!(client.view().is_none());

        let lobby = client.list_games().await.unwrap();
        assert_eq!(lobby.len(), 1);
        client.actions().show_game(GameId(7)).await.unwrap();
        client.shutdown();

        let view = client.view().unwrap();
        assert!(view.is_owner);
        assert!(view.can_start_game);
        assert_eq!(api.count("GET /games?offset=0&limit=25"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_client_stops_polling() {
        let api = MockApi::new(user(2));
        api.insert_game(game(7, GameStatus::Created, &[1, 2]));
        let config = ClientConfig {
            poll_interval: std::time::Duration::from_secs(2),
            ..ClientConfig::default()
        };
        let client = GameClient::new(api.clone(), &config, EventSink::disabled());
        client.authenticate(None).await.unwrap();
        client.actions().show_game(GameId(7)).await.unwrap();
        assert!(client.sync().is_polling());

        drop(client);
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert_eq!(api.count("GET /games/7"), 1);
    }
}
