//! Derived values the UI renders from. Pure, synchronous, no I/O.
//!
//! Everything here reads the model; nothing writes it. The server checks
//! every rule again, so these gates only decide what to offer the user.

use serde::Serialize;

use takesix_shared::constants::MAX_PLAYER_NUMBER;
use takesix_shared::types::{
    cow_sum, CardId, Column, ColumnId, Game, GameId, GameStatus, User, UserId,
};
use takesix_store::GameModel;

use crate::state::ClientState;

/// `user_id` is one of the game's members.
pub fn is_member(game: &Game, user_id: UserId) -> bool {
    game.has_member(user_id)
}

pub fn is_owner(game: &Game, user_id: UserId) -> bool {
    game.owner_id == user_id
}

/// Whether `game` may be entered by `user` from a game list, given the game
/// currently displayed (`shown`).
///
/// Always false for a game that already lists the user.
pub fn can_enter_game(game: &Game, user: Option<&User>, shown: Option<GameId>) -> bool {
    let Some(user) = user else {
        return false;
    };
    let is_shown = shown == Some(game.id);
    let is_full = game.users.len() >= MAX_PLAYER_NUMBER;
    !is_shown && !is_member(game, user.id) && game.status == GameStatus::Created && !is_full
}

pub fn can_show_game(game: &Game, user: Option<&User>, shown: Option<GameId>) -> bool {
    user.is_some() && shown != Some(game.id)
}

/// Status map lookup; false when no status is known for the user.
pub fn has_chosen_card(model: &GameModel, user_id: UserId) -> bool {
    model
        .user_status(user_id)
        .map(|s| s.has_chosen_card)
        .unwrap_or(false)
}

pub fn needs_to_choose_column(model: &GameModel, user_id: UserId) -> bool {
    model
        .user_status(user_id)
        .map(|s| s.needs_to_choose_column)
        .unwrap_or(false)
}

/// Every member has picked a card for the running turn.
pub fn all_members_chosen(model: &GameModel) -> bool {
    match model.game() {
        Some(game) if !game.users.is_empty() => {
            game.users.iter().all(|u| has_chosen_card(model, u.id))
        }
        _ => false,
    }
}

/// Members of a started game that still have to pick a card, in join order.
pub fn waiting_on(model: &GameModel) -> Vec<UserId> {
    match model.game() {
        Some(game) if game.status == GameStatus::Started => game
            .users
            .iter()
            .map(|u| u.id)
            .filter(|id| !has_chosen_card(model, *id))
            .collect(),
        _ => Vec::new(),
    }
}

/// Owner-only gate on turn resolution in a running game: every member has
/// chosen, or the server's summary says a card can be placed.
pub fn can_resolve_turn(model: &GameModel, user: Option<&User>) -> bool {
    let (Some(game), Some(user)) = (model.game(), user) else {
        return false;
    };
    if game.status != GameStatus::Started || !is_owner(game, user.id) {
        return false;
    }
    let server_allows = model.progress().map(|p| p.can_place_card).unwrap_or(false);
    all_members_chosen(model) || server_allows
}

/// Sum of cow values in the user's heap, 0 if none recorded yet.
pub fn heap_sum(model: &GameModel, user_id: UserId) -> u32 {
    model.heap(user_id).map(cow_sum).unwrap_or(0)
}

fn owner_of_status(model: &GameModel, user: Option<&User>, status: GameStatus) -> bool {
    match (model.game(), user) {
        (Some(game), Some(user)) => is_owner(game, user.id) && game.status == status,
        _ => false,
    }
}

pub fn can_start_game(model: &GameModel, user: Option<&User>) -> bool {
    owner_of_status(model, user, GameStatus::Created)
}

pub fn can_add_bot(model: &GameModel, user: Option<&User>) -> bool {
    owner_of_status(model, user, GameStatus::Created)
        && model
            .game()
            .map(|g| g.users.len() < MAX_PLAYER_NUMBER)
            .unwrap_or(false)
}

pub fn can_choose_cards_for_bots(model: &GameModel, user: Option<&User>) -> bool {
    owner_of_status(model, user, GameStatus::Started)
        && model
            .progress()
            .map(|p| p.can_choose_cards_for_bots)
            .unwrap_or(false)
}

/// The user may pick `card_id` now.
pub fn can_choose_card(model: &GameModel, user: Option<&User>, card_id: CardId) -> bool {
    let (Some(game), Some(user)) = (model.game(), user) else {
        return false;
    };
    game.status == GameStatus::Started
        && is_member(game, user.id)
        && !has_chosen_card(model, user.id)
        && hand_contains(model, card_id)
}

pub fn hand_contains(model: &GameModel, card_id: CardId) -> bool {
    model
        .hand()
        .map(|hand| hand.iter().any(|c| c.id == card_id))
        .unwrap_or(false)
}

/// One row of the score board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub username: String,
    pub is_bot: bool,
    pub has_chosen_card: bool,
    pub needs_to_choose_column: bool,
    pub heap_sum: u32,
}

/// One column of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnView {
    pub column_id: ColumnId,
    /// Number the next card placed here must beat.
    pub top: Option<u32>,
    pub cards: usize,
    /// Cow value taken by whoever sweeps the column.
    pub value: u32,
    /// The next card placed here sweeps it.
    pub is_full: bool,
}

impl ColumnView {
    fn of(column: &Column) -> Self {
        Self {
            column_id: column.id,
            top: column.top().map(|c| c.number),
            cards: column.cards.len(),
            value: column.value(),
            is_full: column.is_full(),
        }
    }
}

/// Everything a game screen needs, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameView {
    pub game_id: GameId,
    pub status: GameStatus,
    pub is_member: bool,
    pub is_owner: bool,
    pub can_start_game: bool,
    pub can_add_bot: bool,
    pub can_resolve_turn: bool,
    pub can_choose_cards_for_bots: bool,
    pub has_chosen_card: bool,
    pub needs_to_choose_column: bool,
    pub hand_size: usize,
    pub waiting_on: Vec<UserId>,
    pub members: Vec<MemberView>,
    /// Empty until the board is known.
    pub columns: Vec<ColumnView>,
}

impl GameView {
    /// `None` until a game header is known.
    pub fn project(state: &ClientState) -> Option<Self> {
        let model = &state.model;
        let game = model.game()?;
        let user = state.current_user.as_ref();
        let user_id = user.map(|u| u.id);

        let members = game
            .users
            .iter()
            .map(|u| MemberView {
                user_id: u.id,
                username: u.username.clone(),
                is_bot: u.is_bot(),
                has_chosen_card: has_chosen_card(model, u.id),
                needs_to_choose_column: needs_to_choose_column(model, u.id),
                heap_sum: heap_sum(model, u.id),
            })
            .collect();

        Some(Self {
            game_id: game.id,
            status: game.status,
            is_member: user_id.map(|id| is_member(game, id)).unwrap_or(false),
            is_owner: user_id.map(|id| is_owner(game, id)).unwrap_or(false),
            can_start_game: can_start_game(model, user),
            can_add_bot: can_add_bot(model, user),
            can_resolve_turn: can_resolve_turn(model, user),
            can_choose_cards_for_bots: can_choose_cards_for_bots(model, user),
            has_chosen_card: user_id.map(|id| has_chosen_card(model, id)).unwrap_or(false),
            needs_to_choose_column: user_id
                .map(|id| needs_to_choose_column(model, id))
                .unwrap_or(false),
            hand_size: model.hand().map(|h| h.len()).unwrap_or(0),
            waiting_on: waiting_on(model),
            members,
            columns: model
                .columns()
                .map(|cols| cols.iter().map(ColumnView::of).collect())
                .unwrap_or_default(),
        })
    }
}
