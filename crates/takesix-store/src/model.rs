//! The client-side copy of the current game.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use takesix_shared::types::{
    Card, ChosenCard, Column, Game, GameId, GameProgress, GameStatus, User, UserGameStatus,
    UserId,
};

use crate::error::{Result, StoreError};
use crate::ticket::{Field, Merge, SnapshotMerge, Ticket};

/// Everything the client knows about the game it is following.
///
/// Every `apply_*` merge takes the [`Ticket`] its request was issued under
/// and only touches its own field. Fields a response does not carry are
/// never cleared by it.
#[derive(Debug, Default)]
pub struct GameModel {
    selected: Option<GameId>,
    generation: u64,
    revision: u64,

    game: Option<Game>,
    results: BTreeMap<String, u32>,
    progress: Option<GameProgress>,
    available_bots: Option<Vec<User>>,
    columns: Option<Vec<Column>>,
    hand: Option<Vec<Card>>,
    statuses: HashMap<UserId, UserGameStatus>,
    heaps: HashMap<UserId, Vec<Card>>,
    chosen_cards: HashMap<UserId, Card>,

    /// Final heaps of an ended game have been fetched.
    finalized: bool,

    freshness: HashMap<Field, DateTime<Utc>>,
}

impl GameModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Follow `game_id`.
    ///
    /// Switching to a different id drops every per-game field at once and
    /// invalidates outstanding tickets. Re-selecting the current game keeps
    /// what is known.
    pub fn select(&mut self, game_id: GameId) -> Ticket {
        if self.selected != Some(game_id) {
            self.reset(game_id);
        }
        Ticket {
            game_id,
            generation: self.generation,
            revision: self.revision,
        }
    }

    /// Unconditionally start over on `game_id`.
    pub fn reset(&mut self, game_id: GameId) {
        self.wipe();
        self.selected = Some(game_id);
        debug!(game_id = %game_id, generation = self.generation, "Model reset");
    }

    /// Stop following any game (leave / hide / navigate away).
    pub fn clear(&mut self) {
        self.wipe();
        self.selected = None;
        debug!(generation = self.generation, "Model cleared");
    }

    fn wipe(&mut self) {
        self.generation += 1;
        self.game = None;
        self.results.clear();
        self.progress = None;
        self.available_bots = None;
        self.columns = None;
        self.hand = None;
        self.statuses.clear();
        self.heaps.clear();
        self.chosen_cards.clear();
        self.finalized = false;
        self.freshness.clear();
    }

    /// Ticket for a request issued now, `None` when no game is selected.
    pub fn ticket(&self) -> Option<Ticket> {
        self.selected.map(|game_id| Ticket {
            game_id,
            generation: self.generation,
            revision: self.revision,
        })
    }

    /// Whether a response issued under `ticket` may still be merged.
    pub fn accepts(&self, ticket: &Ticket) -> bool {
        self.is_current(ticket) && self.revision == ticket.revision
    }

    /// Whether `ticket` was issued for the game still selected, whatever
    /// happened to that game since.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.selected == Some(ticket.game_id) && self.generation == ticket.generation
    }

    /// Record that an action issued under `ticket` changed the game on the
    /// server. Reads sent before now are dropped when they come back.
    ///
    /// Returns the ticket to fetch the outcome under, `None` when the
    /// selection changed while the action was out.
    pub fn advance(&mut self, ticket: &Ticket) -> Option<Ticket> {
        if !self.is_current(ticket) {
            return None;
        }
        self.revision += 1;
        debug!(game_id = %ticket.game_id, revision = self.revision, "Model advanced");
        self.ticket()
    }

    // ------------------------------------------------------------------
    // Merges
    // ------------------------------------------------------------------

    /// Merge a game header.
    ///
    /// A snapshot whose status is behind the one already observed is older
    /// than what we hold and is dropped. Per-user entries of users that are
    /// no longer members are pruned.
    pub fn apply_game_snapshot(&mut self, ticket: &Ticket, game: Game) -> Result<SnapshotMerge> {
        if !self.accepts(ticket) {
            return Ok(SnapshotMerge::Stale);
        }
        if game.id != ticket.game_id {
            return Err(StoreError::GameMismatch {
                expected: ticket.game_id,
                got: game.id,
            });
        }

        let previous = self.game.as_ref().map(|g| g.status);
        if let Some(prev) = previous {
            if game.status < prev {
                debug!(
                    game_id = %game.id,
                    observed = %prev,
                    offered = %game.status,
                    "Dropping snapshot with regressed status"
                );
                return Ok(SnapshotMerge::Stale);
            }
        }

        let current = game.status;
        self.statuses.retain(|id, _| game.has_member(*id));
        self.heaps.retain(|id, _| game.has_member(*id));
        self.chosen_cards.retain(|id, _| game.has_member(*id));
        self.game = Some(game);
        self.touch(Field::Game);

        Ok(SnapshotMerge::Applied { previous, current })
    }

    /// Merge final or running scores (username to heap value).
    pub fn apply_results(&mut self, ticket: &Ticket, results: BTreeMap<String, u32>) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        if results.is_empty() && !self.results.is_empty() {
            return Merge::Stale;
        }
        self.results = results;
        self.touch(Field::Results);
        Merge::Applied
    }

    pub fn apply_progress(&mut self, ticket: &Ticket, progress: GameProgress) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        self.progress = Some(progress);
        self.touch(Field::Progress);
        Merge::Applied
    }

    pub fn apply_available_bots(&mut self, ticket: &Ticket, bots: Vec<User>) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        self.available_bots = Some(bots);
        self.touch(Field::AvailableBots);
        Merge::Applied
    }

    /// Merge one user's flags. A user reported as not having chosen has no
    /// chosen card: that is how the previous turn's picks are cleared.
    pub fn apply_user_status(
        &mut self,
        ticket: &Ticket,
        user_id: UserId,
        status: UserGameStatus,
    ) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        if !status.has_chosen_card {
            self.chosen_cards.remove(&user_id);
        }
        self.statuses.insert(user_id, status);
        self.touch(Field::Status(user_id));
        Merge::Applied
    }

    /// Merge one user's heap. Heaps only grow during a game, so a heap
    /// smaller than the one held is an older response.
    pub fn apply_heap(&mut self, ticket: &Ticket, user_id: UserId, cards: Vec<Card>) -> Result<Merge> {
        if !self.accepts(ticket) {
            return Ok(Merge::Stale);
        }
        self.require_started(ticket.game_id)?;
        if let Some(known) = self.heaps.get(&user_id) {
            if cards.len() < known.len() {
                return Ok(Merge::Stale);
            }
        }
        self.heaps.insert(user_id, cards);
        self.touch(Field::Heap(user_id));
        Ok(Merge::Applied)
    }

    /// Merge the current user's hand. Hands only shrink during a game.
    pub fn apply_hand(&mut self, ticket: &Ticket, cards: Vec<Card>) -> Result<Merge> {
        if !self.accepts(ticket) {
            return Ok(Merge::Stale);
        }
        self.require_started(ticket.game_id)?;
        if let Some(known) = &self.hand {
            if cards.len() > known.len() {
                return Ok(Merge::Stale);
            }
        }
        self.hand = Some(cards);
        self.touch(Field::Hand);
        Ok(Merge::Applied)
    }

    pub fn apply_columns(&mut self, ticket: &Ticket, columns: Vec<Column>) -> Result<Merge> {
        if !self.accepts(ticket) {
            return Ok(Merge::Stale);
        }
        self.require_started(ticket.game_id)?;
        self.columns = Some(columns);
        self.touch(Field::Columns);
        Ok(Merge::Applied)
    }

    /// Merge revealed picks, keyed by user. At most one card per user is
    /// kept; users absent from `list` keep what is known about them.
    pub fn apply_chosen_cards(&mut self, ticket: &Ticket, list: Vec<ChosenCard>) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        for chosen in list {
            self.chosen_cards.insert(chosen.user_id, chosen.card);
        }
        self.touch(Field::ChosenCards);
        Merge::Applied
    }

    /// Record that the final heaps of an ended game are in.
    pub fn mark_finalized(&mut self, ticket: &Ticket) -> Merge {
        if !self.accepts(ticket) {
            return Merge::Stale;
        }
        self.finalized = true;
        Merge::Applied
    }

    fn require_started(&self, game_id: GameId) -> Result<()> {
        match &self.game {
            Some(game) if game.status == GameStatus::Created => Err(StoreError::NotStarted(game_id)),
            _ => Ok(()),
        }
    }

    fn touch(&mut self, field: Field) {
        self.freshness.insert(field, Utc::now());
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn selected(&self) -> Option<GameId> {
        self.selected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn status(&self) -> Option<GameStatus> {
        self.game.as_ref().map(|g| g.status)
    }

    pub fn results(&self) -> &BTreeMap<String, u32> {
        &self.results
    }

    pub fn progress(&self) -> Option<GameProgress> {
        self.progress
    }

    pub fn available_bots(&self) -> Option<&[User]> {
        self.available_bots.as_deref()
    }

    pub fn columns(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    pub fn hand(&self) -> Option<&[Card]> {
        self.hand.as_deref()
    }

    pub fn user_status(&self, user_id: UserId) -> Option<&UserGameStatus> {
        self.statuses.get(&user_id)
    }

    pub fn heap(&self, user_id: UserId) -> Option<&[Card]> {
        self.heaps.get(&user_id).map(Vec::as_slice)
    }

    pub fn chosen_card(&self, user_id: UserId) -> Option<&Card> {
        self.chosen_cards.get(&user_id)
    }

    pub fn chosen_cards(&self) -> &HashMap<UserId, Card> {
        &self.chosen_cards
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// When `field` was last merged, `None` if never since the selection.
    pub fn updated_at(&self, field: Field) -> Option<DateTime<Utc>> {
        self.freshness.get(&field).copied()
    }
}
