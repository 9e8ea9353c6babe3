//! In-memory game server for synchronizer and gateway tests.
//!
//! Records every call as `"METHOD /path"` and applies the same state changes
//! the real server would for the happy path. Failures are injected per call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use takesix_net::{ApiResult, GameApi};
use takesix_shared::error::ApiError;
use takesix_shared::protocol::{GameEnvelope, TurnResolution};
use takesix_shared::types::{
    Card, CardId, ChosenCard, Column, ColumnId, Game, GameId, GameProgress, GameStatus, Heap,
    Role, User, UserGameStatus, UserId,
};

pub fn user(id: i64) -> User {
    User {
        id: UserId(id),
        username: format!("user{id}"),
        urole: Role::Player,
        active: true,
    }
}

pub fn bot(id: i64) -> User {
    User {
        id: UserId(id),
        username: format!("bot{id}"),
        urole: Role::Bot,
        active: true,
    }
}

pub fn card(id: i64, cow_value: u32) -> Card {
    Card {
        id: CardId(id),
        number: id as u32,
        cow_value,
    }
}

/// Game `id` owned by the first member.
pub fn game(id: i64, status: GameStatus, members: &[i64]) -> Game {
    Game {
        id: GameId(id),
        owner_id: UserId(members[0]),
        status,
        users: members.iter().copied().map(user).collect(),
        is_resolving_turn: false,
    }
}

/// Handles for a call held back by [`MockApi::hold`].
pub struct Hold {
    /// Fires once the request reached the server. The response is already
    /// computed at that point.
    pub started: oneshot::Receiver<()>,
    /// Send to let the response through.
    pub release: oneshot::Sender<()>,
}

struct PendingHold {
    started: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
pub struct MockServer {
    pub calls: Vec<String>,
    pub current_user: Option<User>,
    pub games: HashMap<GameId, Game>,
    pub results: BTreeMap<String, u32>,
    pub columns: Vec<Column>,
    pub progress: GameProgress,
    pub bots: Vec<User>,
    pub statuses: HashMap<UserId, UserGameStatus>,
    pub heaps: HashMap<UserId, Vec<Card>>,
    pub hand: Vec<Card>,
    pub chosen: Vec<ChosenCard>,
    failures: HashMap<String, ApiError>,
    holds: HashMap<String, PendingHold>,
    next_game_id: i64,
}

impl MockServer {
    fn me(&self) -> ApiResult<User> {
        self.current_user.clone().ok_or_else(|| ApiError::Server {
            status: 401,
            message: "Unauthorized".into(),
        })
    }

    fn game_mut(&mut self, game_id: GameId) -> ApiResult<&mut Game> {
        self.games.get_mut(&game_id).ok_or_else(|| ApiError::Server {
            status: 404,
            message: "The game does not exist".into(),
        })
    }
}

#[derive(Default)]
pub struct MockApi {
    server: Mutex<MockServer>,
}

impl MockApi {
    /// A server where `current` is logged in.
    pub fn new(current: User) -> Arc<Self> {
        let api = Self::default();
        {
            let mut server = api.server();
            server.current_user = Some(current);
            server.next_game_id = 100;
        }
        Arc::new(api)
    }

    pub fn server(&self) -> MutexGuard<'_, MockServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_game(&self, game: Game) {
        self.server().games.insert(game.id, game);
    }

    pub fn calls(&self) -> Vec<String> {
        self.server().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.server().calls.iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.server().calls.clear();
    }

    /// Every later `call` fails with `error`.
    pub fn fail(&self, call: &str, error: ApiError) {
        self.server().failures.insert(call.to_string(), error);
    }

    /// Hold back the response to the next `call` until released. The
    /// server answers with its state at the time the request arrived.
    pub fn hold(&self, call: &str) -> Hold {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.server().holds.insert(
            call.to_string(),
            PendingHold {
                started: started_tx,
                release: release_rx,
            },
        );
        Hold {
            started: started_rx,
            release: release_tx,
        }
    }

    pub fn hold_game(&self, game_id: GameId) -> Hold {
        self.hold(&format!("GET /games/{game_id}"))
    }

    /// Record `call`, then answer it from the server state as it is now.
    async fn respond<T, F>(&self, call: String, handle: F) -> ApiResult<T>
    where
        T: Send,
        F: FnOnce(&mut MockServer) -> ApiResult<T> + Send,
    {
        let (response, pending) = {
            let mut server = self.server();
            let failure = server.failures.get(&call).cloned();
            let pending = server.holds.remove(&call);
            server.calls.push(call);
            let response = match failure {
                Some(err) => Err(err),
                None => handle(&mut server),
            };
            (response, pending)
        };
        if let Some(pending) = pending {
            let _ = pending.started.send(());
            let _ = pending.release.await;
        }
        response
    }
}

#[async_trait]
impl GameApi for MockApi {
    async fn current_user(&self) -> ApiResult<User> {
        self.respond("GET /users/current".into(), |server| server.me())
            .await
    }

    async fn login(&self, username: &str, _password: &str) -> ApiResult<User> {
        self.respond("POST /login".into(), |server| {
            let mut me = server.me().unwrap_or_else(|_| user(1));
            me.username = username.to_string();
            server.current_user = Some(me.clone());
            Ok(me)
        })
        .await
    }

    async fn list_games(&self, offset: u32, limit: u32) -> ApiResult<Vec<Game>> {
        self.respond(format!("GET /games?offset={offset}&limit={limit}"), |server| {
            let mut games: Vec<Game> = server.games.values().cloned().collect();
            games.sort_by_key(|g| g.id);
            Ok(games
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        })
        .await
    }

    async fn get_game(&self, game_id: GameId) -> ApiResult<GameEnvelope> {
        self.respond(format!("GET /games/{game_id}"), |server| {
            let results = server.results.clone();
            let game = server.game_mut(game_id)?.clone();
            Ok(GameEnvelope { game, results })
        })
        .await
    }

    async fn get_columns(&self, game_id: GameId) -> ApiResult<Vec<Column>> {
        self.respond(format!("GET /games/{game_id}/columns"), |server| {
            Ok(server.columns.clone())
        })
        .await
    }

    async fn get_progress(&self, game_id: GameId) -> ApiResult<GameProgress> {
        self.respond(format!("GET /games/{game_id}/status"), |server| {
            Ok(server.progress)
        })
        .await
    }

    async fn get_available_bots(&self, game_id: GameId) -> ApiResult<Vec<User>> {
        self.respond(format!("GET /games/{game_id}/users/bots"), |server| {
            Ok(server.bots.clone())
        })
        .await
    }

    async fn get_user_status(
        &self,
        game_id: GameId,
        user_id: UserId,
    ) -> ApiResult<UserGameStatus> {
        self.respond(format!("GET /games/{game_id}/users/{user_id}/status"), |server| {
            Ok(server.statuses.get(&user_id).copied().unwrap_or_default())
        })
        .await
    }

    async fn get_user_heap(&self, game_id: GameId, user_id: UserId) -> ApiResult<Heap> {
        self.respond(format!("GET /games/{game_id}/users/{user_id}/heap"), |server| {
            Ok(Heap {
                cards: server.heaps.get(&user_id).cloned().unwrap_or_default(),
            })
        })
        .await
    }

    async fn get_hand(&self, game_id: GameId) -> ApiResult<Vec<Card>> {
        self.respond(format!("GET /games/{game_id}/users/current/hand"), |server| {
            Ok(server.hand.clone())
        })
        .await
    }

    async fn get_chosen_cards(&self, game_id: GameId) -> ApiResult<Vec<ChosenCard>> {
        self.respond(format!("GET /games/{game_id}/chosen_cards"), |server| {
            Ok(server.chosen.clone())
        })
        .await
    }

    async fn create_game(&self) -> ApiResult<Game> {
        self.respond("POST /games".into(), |server| {
            let me = server.me()?;
            server.next_game_id += 1;
            let game = Game {
                id: GameId(server.next_game_id),
                owner_id: me.id,
                status: GameStatus::Created,
                users: vec![me],
                is_resolving_turn: false,
            };
            server.games.insert(game.id, game.clone());
            Ok(game)
        })
        .await
    }

    async fn enter_game(&self, game_id: GameId) -> ApiResult<Game> {
        self.respond(format!("POST /games/{game_id}/enter"), |server| {
            let me = server.me()?;
            let game = server.game_mut(game_id)?;
            game.users.push(me);
            Ok(game.clone())
        })
        .await
    }

    async fn start_game(&self, game_id: GameId) -> ApiResult<Game> {
        self.respond(format!("PUT /games/{game_id}/start"), |server| {
            let game = server.game_mut(game_id)?;
            game.status = GameStatus::Started;
            Ok(game.clone())
        })
        .await
    }

    async fn leave_game(&self, game_id: GameId) -> ApiResult<Game> {
        self.respond(format!("PUT /games/{game_id}/leave"), |server| {
            let me = server.me()?;
            let game = server.game_mut(game_id)?;
            game.users.retain(|u| u.id != me.id);
            Ok(game.clone())
        })
        .await
    }

    async fn add_bot(&self, game_id: GameId, bot_id: UserId) -> ApiResult<Game> {
        self.respond(format!("POST /games/{game_id}/users/{bot_id}/add"), |server| {
            let Some(pos) = server.bots.iter().position(|b| b.id == bot_id) else {
                return Err(ApiError::Server {
                    status: 404,
                    message: "The bot does not exist".into(),
                });
            };
            let added = server.bots.remove(pos);
            let game = server.game_mut(game_id)?;
            game.users.push(added);
            Ok(game.clone())
        })
        .await
    }

    async fn choose_card(&self, game_id: GameId, card_id: CardId) -> ApiResult<ChosenCard> {
        self.respond(format!("POST /games/{game_id}/card/{card_id}"), |server| {
            let me = server.me()?;
            let Some(pos) = server.hand.iter().position(|c| c.id == card_id) else {
                return Err(ApiError::Server {
                    status: 400,
                    message: "The card is not in your hand".into(),
                });
            };
            let card = server.hand.remove(pos);
            server.statuses.entry(me.id).or_default().has_chosen_card = true;
            let chosen = ChosenCard {
                user_id: me.id,
                card,
            };
            server.chosen.push(chosen.clone());
            Ok(chosen)
        })
        .await
    }

    async fn choose_cards_for_bots(&self, game_id: GameId) -> ApiResult<()> {
        self.respond(format!("POST /games/{game_id}/bots/choose_cards"), |server| {
            let bot_ids: Vec<UserId> = server
                .game_mut(game_id)?
                .users
                .iter()
                .filter(|u| u.is_bot())
                .map(|u| u.id)
                .collect();
            for id in bot_ids {
                server.statuses.entry(id).or_default().has_chosen_card = true;
            }
            Ok(())
        })
        .await
    }

    async fn choose_column(
        &self,
        game_id: GameId,
        column_id: ColumnId,
    ) -> ApiResult<TurnResolution> {
        self.respond(format!("POST /games/{game_id}/columns/{column_id}/choose"), |server| {
            let me = server.me()?;
            server.statuses.entry(me.id).or_default().needs_to_choose_column = false;
            let chosen_column = server.columns.iter().find(|c| c.id == column_id).cloned();
            Ok(TurnResolution {
                chosen_column,
                user_heap: None,
            })
        })
        .await
    }

    async fn resolve_turn(&self, game_id: GameId) -> ApiResult<TurnResolution> {
        self.respond(format!("POST /games/{game_id}/turns/resolve"), |server| {
            server.chosen.clear();
            for status in server.statuses.values_mut() {
                *status = UserGameStatus::default();
            }
            server.progress = GameProgress::default();
            Ok(TurnResolution::default())
        })
        .await
    }
}
