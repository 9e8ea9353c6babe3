//! `reqwest` implementation of [`GameApi`].
//!
//! The server authenticates with a session cookie, so the underlying client
//! keeps a cookie store: call [`GameApi::login`] once and every later request
//! carries the session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use takesix_shared::error::ApiError;
use takesix_shared::protocol::{
    BotsEnvelope, ChosenCardEnvelope, ChosenCardsEnvelope, ColumnsEnvelope, ErrorBody,
    GameEnvelope, GamesEnvelope, HandEnvelope, HeapEnvelope, LoginRequest, TurnResolution,
    UserEnvelope, UserStatusEnvelope,
};
use takesix_shared::types::{
    Card, CardId, ChosenCard, Column, ColumnId, Game, GameId, GameProgress, Heap, User,
    UserGameStatus, UserId,
};

use crate::api::{ApiResult, GameApi};

/// HTTP client for one game server.
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGameApi {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:5000`).
    ///
    /// `timeout` bounds every request end to end; an expired request surfaces
    /// as [`ApiError::Timeout`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send the request and reject non-success statuses.
    async fn send(&self, req: RequestBuilder) -> ApiResult<Response> {
        let resp = req.send().await.map_err(map_reqwest_error)?;
        let status = resp.status();

        debug!(url = %resp.url().path(), status = status.as_u16(), "Game API response");

        if status.is_success() {
            return Ok(resp);
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Error response without error payload");
                status
                    .canonical_reason()
                    .unwrap_or("unexpected server response")
                    .to_string()
            }
        };

        Err(ApiError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> ApiResult<T> {
        let resp = self.send(req).await?;
        resp.json::<T>().await.map_err(map_reqwest_error)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.fetch(self.request(Method::GET, path)).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.fetch(self.request(Method::POST, path)).await
    }

    async fn put<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.fetch(self.request(Method::PUT, path)).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn current_user(&self) -> ApiResult<User> {
        let env: UserEnvelope = self.get("/users/current").await?;
        Ok(env.user)
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<User> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let env: UserEnvelope = self
            .fetch(self.request(Method::POST, "/login").json(&body))
            .await?;
        Ok(env.user)
    }

    async fn list_games(&self, offset: u32, limit: u32) -> ApiResult<Vec<Game>> {
        let req = self
            .request(Method::GET, "/games")
            .query(&[("offset", offset), ("limit", limit)]);
        let env: GamesEnvelope = self.fetch(req).await?;
        Ok(env.games)
    }

    async fn get_game(&self, game_id: GameId) -> ApiResult<GameEnvelope> {
        self.get(&format!("/games/{game_id}")).await
    }

    async fn get_columns(&self, game_id: GameId) -> ApiResult<Vec<Column>> {
        let env: ColumnsEnvelope = self.get(&format!("/games/{game_id}/columns")).await?;
        Ok(env.columns)
    }

    async fn get_progress(&self, game_id: GameId) -> ApiResult<GameProgress> {
        self.get(&format!("/games/{game_id}/status")).await
    }

    async fn get_available_bots(&self, game_id: GameId) -> ApiResult<Vec<User>> {
        let env: BotsEnvelope = self.get(&format!("/games/{game_id}/users/bots")).await?;
        Ok(env.available_bots)
    }

    async fn get_user_status(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> ApiResult<UserGameStatus> {
        let env: UserStatusEnvelope = self
            .get(&format!("/games/{game_id}/users/{user_id}/status"))
            .await?;
        Ok(env.user)
    }

    async fn get_user_heap(&self, game_id: GameId, user_id: UserId) -> ApiResult<Heap> {
        let env: HeapEnvelope = self
            .get(&format!("/games/{game_id}/users/{user_id}/heap"))
            .await?;
        Ok(env.heap.unwrap_or_default())
    }

    async fn get_hand(&self, game_id: GameId) -> ApiResult<Vec<Card>> {
        let env: HandEnvelope = self
            .get(&format!("/games/{game_id}/users/current/hand"))
            .await?;
        Ok(env.into_cards())
    }

    async fn get_chosen_cards(&self, game_id: GameId) -> ApiResult<Vec<ChosenCard>> {
        let env: ChosenCardsEnvelope = self.get(&format!("/games/{game_id}/chosen_cards")).await?;
        Ok(env.chosen_cards)
    }

    async fn create_game(&self) -> ApiResult<Game> {
        let env: GameEnvelope = self.post("/games").await?;
        Ok(env.game)
    }

    async fn enter_game(&self, game_id: GameId) -> ApiResult<Game> {
        let env: GameEnvelope = self.post(&format!("/games/{game_id}/enter")).await?;
        Ok(env.game)
    }

    async fn start_game(&self, game_id: GameId) -> ApiResult<Game> {
        let env: GameEnvelope = self.put(&format!("/games/{game_id}/start")).await?;
        Ok(env.game)
    }

    async fn leave_game(&self, game_id: GameId) -> ApiResult<Game> {
        let env: GameEnvelope = self.put(&format!("/games/{game_id}/leave")).await?;
        Ok(env.game)
    }

    async fn add_bot(&self, game_id: GameId, bot_id: UserId) -> ApiResult<Game> {
        let env: GameEnvelope = self
            .post(&format!("/games/{game_id}/users/{bot_id}/add"))
            .await?;
        Ok(env.game)
    }

    async fn choose_card(&self, game_id: GameId, card_id: CardId) -> ApiResult<ChosenCard> {
        let env: ChosenCardEnvelope = self.post(&format!("/games/{game_id}/card/{card_id}")).await?;
        Ok(env.chosen_card)
    }

    async fn choose_cards_for_bots(&self, game_id: GameId) -> ApiResult<()> {
        // Empty JSON object on success; the body carries nothing we need.
        self.send(self.request(Method::POST, &format!("/games/{game_id}/bots/choose_cards")))
            .await?;
        Ok(())
    }

    async fn choose_column(
        &self,
        game_id: GameId,
        column_id: ColumnId,
    ) -> ApiResult<TurnResolution> {
        self.post(&format!("/games/{game_id}/columns/{column_id}/choose"))
            .await
    }

    async fn resolve_turn(&self, game_id: GameId) -> ApiResult<TurnResolution> {
        self.post(&format!("/games/{game_id}/turns/resolve")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_server(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn api_for(addr: SocketAddr) -> HttpGameApi {
        HttpGameApi::new(format!("http://{addr}/"), Duration::from_secs(5)).unwrap()
    }

    fn game_json(users: &[i64], status: u8) -> serde_json::Value {
        let users: Vec<_> = users
            .iter()
            .map(|id| json!({"id": id, "username": format!("user{id}"), "urole": 2}))
            .collect();
        json!({"id": 7, "owner_id": 1, "status": status, "users": users})
    }

    #[tokio::test]
    async fn test_get_game_decodes_envelope() {
        let router = Router::new().route(
            "/games/7",
            get(|| async {
                Json(json!({"game": game_json(&[1, 2], 1), "results": {"user1": 0}}))
            }),
        );
        let api = api_for(spawn_server(router).await);

        let env = api.get_game(GameId(7)).await.unwrap();
        assert_eq!(env.game.users.len(), 2);
        assert_eq!(env.results.get("user1"), Some(&0));
    }

    #[tokio::test]
    async fn test_enter_game_posts() {
        let router = Router::new().route(
            "/games/7/enter",
            post(|| async { (StatusCode::CREATED, Json(json!({"game": game_json(&[1, 2], 0)}))) }),
        );
        let api = api_for(spawn_server(router).await);

        let game = api.enter_game(GameId(7)).await.unwrap();
        assert_eq!(game.member_ids(), vec![UserId(1), UserId(2)]);
    }

    #[tokio::test]
    async fn test_server_error_is_surfaced_verbatim() {
        let router = Router::new().route(
            "/games/7/start",
            put(|| async {
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({"error": "User is not game owner"})),
                )
            }),
        );
        let api = api_for(spawn_server(router).await);

        let err = api.start_game(GameId(7)).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Server {
                status: 403,
                message: "User is not game owner".into()
            }
        );
    }

    #[tokio::test]
    async fn test_error_without_payload_uses_reason() {
        let router = Router::new().route(
            "/games/7/columns",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let api = api_for(spawn_server(router).await);

        let err = api.get_columns(GameId(7)).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_hand_heap_and_bots_choose() {
        let router = Router::new()
            .route(
                "/games/7/users/current/hand",
                get(|| async {
                    Json(json!({"hand": {"id": 1, "user_id": 2, "game_id": 7,
                        "cards": [{"id": 12, "number": 12, "cow_value": 1}]}}))
                }),
            )
            .route(
                "/games/7/users/2/heap",
                get(|| async { Json(json!({"heap": null})) }),
            )
            .route(
                "/games/7/bots/choose_cards",
                post(|| async { (StatusCode::CREATED, Json(json!({}))) }),
            );
        let api = api_for(spawn_server(router).await);

        let hand = api.get_hand(GameId(7)).await.unwrap();
        assert_eq!(hand.len(), 1);
        assert_eq!(hand[0].number, 12);

        let heap = api.get_user_heap(GameId(7), UserId(2)).await.unwrap();
        assert!(heap.cards.is_empty());

        api.choose_cards_for_bots(GameId(7)).await.unwrap();
    }

    #[tokio::test]
    async fn test_login_keeps_session_cookie() {
        async fn current(headers: HeaderMap) -> axum::response::Response {
            let has_session = headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("session=abc"))
                .unwrap_or(false);
            if has_session {
                Json(json!({"user": {"id": 2, "username": "bob", "urole": 2}})).into_response()
            } else {
                (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response()
            }
        }

        let router = Router::new()
            .route(
                "/login",
                post(|| async {
                    (
                        StatusCode::CREATED,
                        [(header::SET_COOKIE, "session=abc; Path=/")],
                        Json(json!({"user": {"id": 2, "username": "bob", "urole": 2}})),
                    )
                }),
            )
            .route("/users/current", get(current));
        let api = api_for(spawn_server(router).await);

        let err = api.current_user().await.unwrap_err();
        assert_eq!(err.status(), Some(401));

        let user = api.login("bob", "secret").await.unwrap();
        assert_eq!(user.id, UserId(2));

        let current = api.current_user().await.unwrap();
        assert_eq!(current.username, "bob");
    }

    #[tokio::test]
    async fn test_timeout_is_uniform_error() {
        let router = Router::new().route(
            "/games/7/status",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"can_place_card": true, "can_choose_cards_for_bots": false}))
            }),
        );
        let addr = spawn_server(router).await;
        let api = HttpGameApi::new(format!("http://{addr}"), Duration::from_millis(100)).unwrap();

        let err = api.get_progress(GameId(7)).await.unwrap_err();
        assert_eq!(err, ApiError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = api_for(addr);
        let err = api.get_columns(GameId(7)).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
