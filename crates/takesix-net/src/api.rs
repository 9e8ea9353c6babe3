use async_trait::async_trait;

use takesix_shared::error::ApiError;
use takesix_shared::protocol::{GameEnvelope, TurnResolution};
use takesix_shared::types::{
    Card, CardId, ChosenCard, Column, ColumnId, Game, GameId, GameProgress, Heap, User,
    UserGameStatus, UserId,
};

pub type ApiResult<T> = Result<T, ApiError>;

/// One method per game server endpoint.
///
/// Implementations must be cheap to share between the synchronizer's poll
/// task and the action gateway, hence `Send + Sync` and `&self` receivers.
#[async_trait]
pub trait GameApi: Send + Sync {
    /// `GET /users/current`
    async fn current_user(&self) -> ApiResult<User>;

    /// `POST /login`
    async fn login(&self, username: &str, password: &str) -> ApiResult<User>;

    /// `GET /games?offset=..&limit=..`
    async fn list_games(&self, offset: u32, limit: u32) -> ApiResult<Vec<Game>>;

    /// `GET /games/{id}`
    async fn get_game(&self, game_id: GameId) -> ApiResult<GameEnvelope>;

    /// `GET /games/{id}/columns`
    async fn get_columns(&self, game_id: GameId) -> ApiResult<Vec<Column>>;

    /// `GET /games/{id}/status` (owner only)
    async fn get_progress(&self, game_id: GameId) -> ApiResult<GameProgress>;

    /// `GET /games/{id}/users/bots`
    async fn get_available_bots(&self, game_id: GameId) -> ApiResult<Vec<User>>;

    /// `GET /games/{id}/users/{uid}/status`
    async fn get_user_status(&self, game_id: GameId, user_id: UserId)
        -> ApiResult<UserGameStatus>;

    /// `GET /games/{id}/users/{uid}/heap`
    async fn get_user_heap(&self, game_id: GameId, user_id: UserId) -> ApiResult<Heap>;

    /// `GET /games/{id}/users/current/hand`
    async fn get_hand(&self, game_id: GameId) -> ApiResult<Vec<Card>>;

    /// `GET /games/{id}/chosen_cards`
    async fn get_chosen_cards(&self, game_id: GameId) -> ApiResult<Vec<ChosenCard>>;

    /// `POST /games`
    async fn create_game(&self) -> ApiResult<Game>;

    /// `POST /games/{id}/enter`
    async fn enter_game(&self, game_id: GameId) -> ApiResult<Game>;

    /// `PUT /games/{id}/start`
    async fn start_game(&self, game_id: GameId) -> ApiResult<Game>;

    /// `PUT /games/{id}/leave`
    async fn leave_game(&self, game_id: GameId) -> ApiResult<Game>;

    /// `POST /games/{id}/users/{bot_id}/add`
    async fn add_bot(&self, game_id: GameId, bot_id: UserId) -> ApiResult<Game>;

    /// `POST /games/{id}/card/{card_id}`
    async fn choose_card(&self, game_id: GameId, card_id: CardId) -> ApiResult<ChosenCard>;

    /// `POST /games/{id}/bots/choose_cards`
    async fn choose_cards_for_bots(&self, game_id: GameId) -> ApiResult<()>;

    /// `POST /games/{id}/columns/{col_id}/choose`
    async fn choose_column(&self, game_id: GameId, column_id: ColumnId)
        -> ApiResult<TurnResolution>;

    /// `POST /games/{id}/turns/resolve`
    async fn resolve_turn(&self, game_id: GameId) -> ApiResult<TurnResolution>;
}
