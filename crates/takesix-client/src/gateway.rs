//! User actions against the followed game.
//!
//! Each action checks its preconditions against the model without touching
//! the network, issues exactly one server call, then lets the synchronizer
//! fetch what the call changed. Nothing is written to the model before the
//! server has answered. A successful call advances the model's ticket, so
//! reads that were already out cannot bring back the state it replaced.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use takesix_net::{ApiResult, GameApi};
use takesix_shared::constants::MAX_PLAYER_NUMBER;
use takesix_shared::error::ApiError;
use takesix_shared::protocol::TurnResolution;
use takesix_shared::types::{CardId, ColumnId, Game, GameId, GameStatus, User, UserId};
use takesix_store::Ticket;

use crate::events::{ClientEvent, EventSink};
use crate::projection;
use crate::state::{lock_state, SharedState};
use crate::sync::Synchronizer;

/// An action refused locally. No request was sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    #[error("not logged in")]
    NotAuthenticated,

    #[error("no game selected")]
    NoGameSelected,

    #[error("the game has already started")]
    NotCreated,

    #[error("the game is not running")]
    NotStarted,

    #[error("the game is full")]
    GameFull,

    #[error("only the game owner can do this")]
    NotOwner,

    #[error("you are not in this game")]
    NotMember,

    #[error("you already chose a card this turn")]
    AlreadyChosen,

    #[error("card {0} is not in your hand")]
    CardNotInHand(CardId),

    #[error("unknown column {0}")]
    UnknownColumn(ColumnId),

    #[error("no column to choose")]
    NoColumnChoicePending,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error(transparent)]
    Rejected(#[from] Precondition),

    /// The server call failed. Displays the server's message verbatim.
    #[error("{0}")]
    Failed(#[from] ApiError),
}

/// How [`ActionGateway::enter_game`] got the user into the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Already a member: the game is only displayed.
    Shown,
    /// Joined through the server.
    Entered,
}

pub struct ActionGateway {
    api: Arc<dyn GameApi>,
    state: SharedState,
    sync: Arc<Synchronizer>,
    events: EventSink,
}

/// Current user and followed game, read under one lock.
struct Context {
    user: User,
    game: Game,
    /// The selection the action is issued under.
    ticket: Ticket,
}

impl Context {
    fn is_owner(&self) -> bool {
        projection::is_owner(&self.game, self.user.id)
    }

    fn is_member(&self) -> bool {
        projection::is_member(&self.game, self.user.id)
    }

    fn require_owner(&self) -> Result<(), Precondition> {
        if self.is_owner() {
            Ok(())
        } else {
            Err(Precondition::NotOwner)
        }
    }

    fn require_status(&self, status: GameStatus) -> Result<(), Precondition> {
        match (status, self.game.status) {
            (want, have) if want == have => Ok(()),
            (GameStatus::Created, _) => Err(Precondition::NotCreated),
            _ => Err(Precondition::NotStarted),
        }
    }
}

impl ActionGateway {
    pub fn new(
        api: Arc<dyn GameApi>,
        state: SharedState,
        sync: Arc<Synchronizer>,
        events: EventSink,
    ) -> Self {
        Self {
            api,
            state,
            sync,
            events,
        }
    }

    fn current_user(&self) -> Result<User, Precondition> {
        lock_state(&self.state)
            .current_user
            .clone()
            .ok_or(Precondition::NotAuthenticated)
    }

    fn context(&self) -> Result<Context, Precondition> {
        let state = lock_state(&self.state);
        let user = state
            .current_user
            .clone()
            .ok_or(Precondition::NotAuthenticated)?;
        let game = state
            .model
            .game()
            .cloned()
            .ok_or(Precondition::NoGameSelected)?;
        let ticket = state.model.ticket().ok_or(Precondition::NoGameSelected)?;
        Ok(Context { user, game, ticket })
    }

    /// Await the one server call of an action. A failure is reported on the
    /// event stream and leaves the model as it was.
    async fn call<T>(
        &self,
        action: &'static str,
        request: impl Future<Output = ApiResult<T>>,
    ) -> Result<T, ActionError> {
        match request.await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(action, error = %e, "Action failed");
                self.events.emit(ClientEvent::ActionFailed {
                    message: e.message(),
                });
                Err(ActionError::Failed(e))
            }
        }
    }

    /// The action issued under `ticket` changed the game. Returns the ticket
    /// to fetch its outcome under, `None` when another game is followed by
    /// now and there is nothing to refresh.
    fn advance(&self, action: &'static str, ticket: &Ticket) -> Option<Ticket> {
        let advanced = self.sync.advance(ticket);
        if advanced.is_none() {
            debug!(action, game_id = %ticket.game_id, "Selection changed during the action, not refreshing");
        }
        advanced
    }

    /// The action itself succeeded; a failed follow-up fetch is retried by
    /// the poller.
    fn settle(action: &'static str, follow_up: ApiResult<()>) {
        if let Err(e) = follow_up {
            warn!(action, error = %e, "Refresh after action failed");
        }
    }

    // ------------------------------------------------------------------
    // Lobby
    // ------------------------------------------------------------------

    /// Create a game and follow it.
    pub async fn create_game(&self) -> Result<GameId, ActionError> {
        let game = self.call("create_game", self.api.create_game()).await?;
        let game_id = game.id;
        info!(game_id = %game_id, "Game created");
        Self::settle("create_game", self.sync.follow(game).await);
        Ok(game_id)
    }

    /// Join `game`, or just display it when the user is already listed.
    pub async fn enter_game(&self, game: &Game) -> Result<EnterOutcome, ActionError> {
        let user = self.current_user()?;
        if projection::is_member(game, user.id) {
            Self::settle("enter_game", self.sync.select_game(game.id).await);
            return Ok(EnterOutcome::Shown);
        }
        if game.status != GameStatus::Created {
            return Err(Precondition::NotCreated.into());
        }
        if game.users.len() >= MAX_PLAYER_NUMBER {
            return Err(Precondition::GameFull.into());
        }

        let entered = self.call("enter_game", self.api.enter_game(game.id)).await?;
        info!(game_id = %game.id, user_id = %user.id, "Entered game");
        Self::settle("enter_game", self.sync.follow(entered).await);
        Ok(EnterOutcome::Entered)
    }

    /// Display `game_id` without joining it.
    pub async fn show_game(&self, game_id: GameId) -> Result<(), ActionError> {
        self.current_user()?;
        Self::settle("show_game", self.sync.select_game(game_id).await);
        Ok(())
    }

    /// Leave the followed game. A user who is not a member only stops
    /// following it.
    ///
    /// Another game selected while the request was out stays selected.
    pub async fn leave_game(&self) -> Result<(), ActionError> {
        let ctx = self.context()?;
        if ctx.is_member() {
            self.call("leave_game", self.api.leave_game(ctx.game.id))
                .await?;
            info!(game_id = %ctx.game.id, user_id = %ctx.user.id, "Left game");
        }
        self.sync.deselect_if(&ctx.ticket);
        Ok(())
    }

    /// Stop following the current game. Never contacts the server.
    pub fn hide_game(&self) {
        self.sync.deselect();
    }

    // ------------------------------------------------------------------
    // Owner
    // ------------------------------------------------------------------

    pub async fn start_game(&self) -> Result<(), ActionError> {
        let ctx = self.context()?;
        ctx.require_owner()?;
        ctx.require_status(GameStatus::Created)?;

        let game = self.call("start_game", self.api.start_game(ctx.game.id)).await?;
        info!(game_id = %game.id, "Game started");
        if let Some(ticket) = self.advance("start_game", &ctx.ticket) {
            self.sync.merge_snapshot(&ticket, game);
            Self::settle("start_game", self.sync.refresh().await);
        }
        Ok(())
    }

    pub async fn add_bot(&self, bot_id: UserId) -> Result<(), ActionError> {
        let ctx = self.context()?;
        ctx.require_owner()?;
        ctx.require_status(GameStatus::Created)?;
        if ctx.game.users.len() >= MAX_PLAYER_NUMBER {
            return Err(Precondition::GameFull.into());
        }

        let game = self
            .call("add_bot", self.api.add_bot(ctx.game.id, bot_id))
            .await?;
        info!(game_id = %game.id, bot_id = %bot_id, "Bot added");
        if let Some(ticket) = self.advance("add_bot", &ctx.ticket) {
            self.sync.merge_snapshot(&ticket, game);
            Self::settle("add_bot", self.sync.refresh_bots().await);
        }
        Ok(())
    }

    /// Let the server pick for every bot of the game.
    pub async fn choose_cards_for_bots(&self) -> Result<(), ActionError> {
        let ctx = self.context()?;
        ctx.require_owner()?;
        ctx.require_status(GameStatus::Started)?;

        self.call(
            "choose_cards_for_bots",
            self.api.choose_cards_for_bots(ctx.game.id),
        )
        .await?;
        if self.advance("choose_cards_for_bots", &ctx.ticket).is_some() {
            Self::settle("choose_cards_for_bots", self.sync.refresh().await);
        }
        Ok(())
    }

    pub async fn resolve_turn(&self) -> Result<(), ActionError> {
        let ctx = self.context()?;
        ctx.require_owner()?;

        let resolution = self
            .call("resolve_turn", self.api.resolve_turn(ctx.game.id))
            .await?;
        info!(game_id = %ctx.game.id, "Turn resolved");
        log_resolution(ctx.game.id, &resolution);
        if self.advance("resolve_turn", &ctx.ticket).is_some() {
            Self::settle("resolve_turn", self.sync.refresh().await);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Player
    // ------------------------------------------------------------------

    /// Play `card_id` from the hand for the running turn.
    ///
    /// The hand is not re-read here; the next refresh picks it up.
    pub async fn choose_card(&self, card_id: CardId) -> Result<(), ActionError> {
        let ctx = self.context()?;
        ctx.require_status(GameStatus::Started)?;
        if !ctx.is_member() {
            return Err(Precondition::NotMember.into());
        }
        {
            let state = lock_state(&self.state);
            if projection::has_chosen_card(&state.model, ctx.user.id) {
                return Err(Precondition::AlreadyChosen.into());
            }
            if !projection::hand_contains(&state.model, card_id) {
                return Err(Precondition::CardNotInHand(card_id).into());
            }
        }

        self.call("choose_card", self.api.choose_card(ctx.game.id, card_id))
            .await?;
        info!(game_id = %ctx.game.id, card_id = %card_id, "Card chosen");
        if self.advance("choose_card", &ctx.ticket).is_some() {
            Self::settle("choose_card", self.sync.refresh_choices().await);
        }
        Ok(())
    }

    /// Take `column_id` when the current user's card fits no column.
    pub async fn choose_column(&self, column_id: ColumnId) -> Result<(), ActionError> {
        let ctx = self.context()?;
        {
            let state = lock_state(&self.state);
            if !projection::needs_to_choose_column(&state.model, ctx.user.id) {
                return Err(Precondition::NoColumnChoicePending.into());
            }
            let known = state
                .model
                .columns()
                .map(|cols| cols.iter().any(|c| c.id == column_id))
                .unwrap_or(false);
            if !known {
                return Err(Precondition::UnknownColumn(column_id).into());
            }
        }

        let resolution = self
            .call(
                "choose_column",
                self.api.choose_column(ctx.game.id, column_id),
            )
            .await?;
        info!(game_id = %ctx.game.id, column_id = %column_id, "Column chosen");
        log_resolution(ctx.game.id, &resolution);
        if self.advance("choose_column", &ctx.ticket).is_some() {
            Self::settle("choose_column", self.sync.refresh().await);
        }
        Ok(())
    }
}

/// The model picks the new columns and heaps up on refresh; the immediate
/// answer is only logged.
fn log_resolution(game_id: GameId, resolution: &TurnResolution) {
    if let Some(column) = &resolution.chosen_column {
        info!(
            game_id = %game_id,
            column_id = %column.id,
            cards = column.cards.len(),
            value = column.value(),
            "Column swept"
        );
    }
    if let Some(heap) = &resolution.user_heap {
        debug!(game_id = %game_id, cards = heap.cards.len(), value = heap.value(), "Heap after turn");
    }
}
