//! Keeps the model of the selected game current.
//!
//! Two entry points feed the model: explicit refreshes (on selection and
//! after actions) and a periodic poller. Every request carries the
//! [`Ticket`] of the selection it was issued under; the model drops
//! responses whose ticket has been superseded, either by a new selection or
//! by an action that changed the game. A slice that is already being fetched
//! under the same ticket is not requested a second time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use futures::future::{join, join_all};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use takesix_net::{ApiResult, GameApi};
use takesix_shared::types::{Game, GameId, GameStatus, UserId};
use takesix_store::{Field, Merge, SnapshotMerge, Ticket};

use crate::events::{ClientEvent, EventSink};
use crate::state::{lock_state, SharedState};

/// What one poll step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No game selected.
    Idle,
    /// Header and cheap slices only.
    Polled,
    /// The whole phase was fetched again.
    FullRefresh,
    /// The game ended and its final heaps are in.
    Finished,
}

struct Poller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

type InFlightSet = Mutex<HashSet<(Ticket, Field)>>;

/// Claim on a slice being fetched. Released on drop, including when the
/// request future is dropped mid-flight.
struct InFlight<'a> {
    set: &'a InFlightSet,
    key: (Ticket, Field),
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Phase facts read from the model at the start of a step.
struct Phase {
    status: Option<GameStatus>,
    user_id: Option<UserId>,
    is_owner: bool,
    is_member: bool,
    finalized: bool,
}

pub struct Synchronizer {
    api: Arc<dyn GameApi>,
    state: SharedState,
    events: EventSink,
    poll_interval: Duration,
    in_flight: InFlightSet,
    poller: Mutex<Option<Poller>>,
}

impl Synchronizer {
    pub fn new(
        api: Arc<dyn GameApi>,
        state: SharedState,
        events: EventSink,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            state,
            events,
            poll_interval,
            in_flight: Mutex::new(HashSet::new()),
            poller: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Follow `game_id`: fetch everything its phase needs, then poll.
    ///
    /// The returned error is the first failed fetch. Polling starts anyway
    /// and retries on the next tick.
    pub async fn select_game(self: &Arc<Self>, game_id: GameId) -> ApiResult<()> {
        self.stop_polling();
        let ticket = lock_state(&self.state).model.select(game_id);
        info!(game_id = %game_id, "Following game");

        let result = match self.fetch_game(ticket).await {
            Ok(_) => self.fetch_phase(ticket).await,
            Err(e) => Err(e),
        };
        self.resume(ticket);
        result
    }

    /// Follow `game`, a header an action just returned. It is merged as the
    /// first snapshot instead of being fetched again.
    pub async fn follow(self: &Arc<Self>, game: Game) -> ApiResult<()> {
        self.stop_polling();
        let game_id = game.id;
        let ticket = lock_state(&self.state).model.select(game_id);
        info!(game_id = %game_id, "Following game");

        self.merge_snapshot(&ticket, game);
        let result = self.fetch_phase(ticket).await;
        self.resume(ticket);
        result
    }

    /// Stop following any game. Responses still in flight are discarded.
    pub fn deselect(&self) {
        self.stop_polling();
        lock_state(&self.state).model.clear();
        self.events.emit(ClientEvent::GameCleared);
    }

    /// Stop following the game `ticket` was issued for, unless another game
    /// has been selected since. Returns whether the selection was cleared.
    pub fn deselect_if(&self, ticket: &Ticket) -> bool {
        {
            let mut state = lock_state(&self.state);
            if !state.model.is_current(ticket) {
                debug!(game_id = %ticket.game_id, "Selection moved on, keeping it");
                return false;
            }
            state.model.clear();
        }
        self.stop_polling();
        self.events.emit(ClientEvent::GameCleared);
        true
    }

    /// Ticket for a request issued now.
    pub fn ticket(&self) -> Option<Ticket> {
        lock_state(&self.state).model.ticket()
    }

    /// An action issued under `ticket` succeeded and changed the game.
    /// Reads already out are dropped when they return, and slices they hold
    /// can be requested again at once.
    ///
    /// `None` when the selection changed while the action was out.
    pub fn advance(&self, ticket: &Ticket) -> Option<Ticket> {
        lock_state(&self.state).model.advance(ticket)
    }

    // ------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------

    /// Fetch the header, then every slice the current phase needs.
    pub async fn refresh(&self) -> ApiResult<()> {
        let Some(ticket) = self.ticket() else {
            return Ok(());
        };
        self.fetch_game(ticket).await?;
        self.fetch_phase(ticket).await
    }

    /// One poll step.
    pub async fn tick(&self) -> ApiResult<TickOutcome> {
        let Some(ticket) = self.ticket() else {
            return Ok(TickOutcome::Idle);
        };
        let phase = self.phase(&ticket);

        match phase.status {
            Some(GameStatus::Ended) if phase.finalized => Ok(TickOutcome::Finished),
            Some(GameStatus::Ended) => {
                self.fetch_final_heaps(ticket).await?;
                Ok(self.after_refresh(&ticket))
            }
            None | Some(GameStatus::Created) => {
                let merge = self.fetch_game(ticket).await?;
                if merge.entered().is_some() {
                    self.fetch_phase(ticket).await?;
                    return Ok(self.after_refresh(&ticket));
                }
                if phase.is_owner {
                    self.fetch_bots(ticket).await?;
                }
                Ok(TickOutcome::Polled)
            }
            Some(GameStatus::Started) => {
                // `/status` answers the owner only.
                let progressed = if phase.is_owner {
                    self.fetch_progress(ticket).await?
                } else {
                    false
                };
                let merge = self.fetch_game(ticket).await?;
                let transitioned = merge.entered().is_some();

                if progressed || transitioned || !phase.is_owner {
                    trace!(game_id = %ticket.game_id, progressed, transitioned, "Full refresh");
                    self.fetch_phase(ticket).await?;
                    Ok(self.after_refresh(&ticket))
                } else {
                    self.fetch_statuses(ticket).await?;
                    Ok(TickOutcome::Polled)
                }
            }
        }
    }

    fn after_refresh(&self, ticket: &Ticket) -> TickOutcome {
        let state = lock_state(&self.state);
        if state.model.accepts(ticket) && state.model.is_finalized() {
            TickOutcome::Finished
        } else {
            TickOutcome::FullRefresh
        }
    }

    /// Owner: re-read the bots that can still be added.
    pub async fn refresh_bots(&self) -> ApiResult<()> {
        match self.ticket() {
            Some(ticket) => self.fetch_bots(ticket).await,
            None => Ok(()),
        }
    }

    /// Re-read the current user's flags and, when visible, the chosen cards.
    pub async fn refresh_choices(&self) -> ApiResult<()> {
        let Some(ticket) = self.ticket() else {
            return Ok(());
        };
        if let Some(user_id) = self.phase(&ticket).user_id {
            self.fetch_status(ticket, user_id).await?;
        }
        if self.chosen_cards_visible(&ticket) {
            self.fetch_chosen_cards(ticket).await?;
        }
        Ok(())
    }

    /// Merge a header returned by an action, issued under `ticket`.
    pub fn merge_snapshot(&self, ticket: &Ticket, game: Game) -> SnapshotMerge {
        let merge = {
            let mut state = lock_state(&self.state);
            match state.model.apply_game_snapshot(ticket, game) {
                Ok(merge) => merge,
                Err(e) => {
                    warn!(game_id = %ticket.game_id, error = %e, "Rejected game snapshot");
                    return SnapshotMerge::Stale;
                }
            }
        };
        match merge {
            SnapshotMerge::Stale => {
                debug!(game_id = %ticket.game_id, "Dropped stale game snapshot");
            }
            SnapshotMerge::Applied { .. } => {
                if let Some(status) = merge.entered() {
                    info!(game_id = %ticket.game_id, status = %status, "Game phase changed");
                    self.events.emit(ClientEvent::PhaseChanged {
                        game_id: ticket.game_id,
                        status,
                    });
                }
            }
        }
        merge
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the poll task. A tick in progress is abandoned.
    pub fn stop_polling(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            let _ = poller.stop_tx.send(true);
            debug!("Polling stopped");
        }
    }

    /// Start polling, unless the selection changed meanwhile or there is
    /// nothing left to fetch.
    fn resume(self: &Arc<Self>, ticket: Ticket) {
        {
            let state = lock_state(&self.state);
            if !state.model.is_current(&ticket) || state.model.is_finalized() {
                return;
            }
        }
        self.start_polling();
    }

    /// The task only holds a weak handle between ticks, so dropping the
    /// last `Arc<Synchronizer>` ends it.
    fn start_polling(self: &Arc<Self>) {
        self.stop_polling();

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.poll_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the selection just fetched.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let Some(sync) = weak.upgrade() else {
                    debug!("Synchronizer dropped, polling stopped");
                    break;
                };
                let outcome = tokio::select! {
                    outcome = sync.tick() => outcome,
                    _ = stop_rx.changed() => break,
                };
                drop(sync);

                match outcome {
                    Ok(TickOutcome::Idle) => {
                        debug!("No game selected, polling stopped");
                        break;
                    }
                    Ok(TickOutcome::Finished) => {
                        info!("Game finished, polling stopped");
                        break;
                    }
                    Ok(outcome) => trace!(?outcome, "Poll tick"),
                    Err(e) => warn!(error = %e, "Poll failed, retrying on next tick"),
                }
            }
        });

        *self.poller.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Poller { stop_tx, handle });
        debug!(interval_ms = period.as_millis() as u64, "Polling started");
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn phase(&self, ticket: &Ticket) -> Phase {
        let state = lock_state(&self.state);
        let user_id = state.current_user_id();
        let game = state.model.game().filter(|_| state.model.accepts(ticket));
        Phase {
            status: game.map(|g| g.status),
            user_id,
            is_owner: matches!((game, user_id), (Some(g), Some(id)) if g.owner_id == id),
            is_member: matches!((game, user_id), (Some(g), Some(id)) if g.has_member(id)),
            finalized: state.model.is_finalized(),
        }
    }

    async fn fetch_phase(&self, ticket: Ticket) -> ApiResult<()> {
        let phase = self.phase(&ticket);
        match phase.status {
            None => Ok(()),
            Some(GameStatus::Created) if phase.is_owner => self.fetch_bots(ticket).await,
            Some(GameStatus::Created) => Ok(()),
            Some(GameStatus::Started) => self.fetch_started(ticket, &phase).await,
            Some(GameStatus::Ended) if phase.finalized => Ok(()),
            Some(GameStatus::Ended) => self.fetch_final_heaps(ticket).await,
        }
    }

    async fn fetch_started(&self, ticket: Ticket, phase: &Phase) -> ApiResult<()> {
        let members = self.members(&ticket);

        let mut results = vec![self.fetch_columns(ticket).await];

        let statuses = join_all(members.iter().map(|&id| self.fetch_status(ticket, id)));
        let heaps = join_all(members.iter().map(|&id| self.fetch_heap(ticket, id)));
        let (statuses, heaps) = join(statuses, heaps).await;
        results.extend(statuses);
        results.extend(heaps);

        if phase.is_member {
            results.push(self.fetch_hand(ticket).await);
        }
        if self.chosen_cards_visible(&ticket) {
            results.push(self.fetch_chosen_cards(ticket).await);
        }

        if lock_state(&self.state).model.accepts(&ticket) {
            self.events.emit(ClientEvent::ModelUpdated {
                game_id: ticket.game_id,
            });
        }
        first_error(results)
    }

    /// Final heaps of an ended game, fetched once.
    async fn fetch_final_heaps(&self, ticket: Ticket) -> ApiResult<()> {
        let members = self.members(&ticket);
        let heaps = join_all(members.iter().map(|&id| self.fetch_heap(ticket, id))).await;
        first_error(heaps)?;

        let results = {
            let mut state = lock_state(&self.state);
            if !state.model.mark_finalized(&ticket).is_applied() {
                return Ok(());
            }
            state.model.results().clone()
        };
        info!(game_id = %ticket.game_id, "Game finished");
        self.events.emit(ClientEvent::GameFinished {
            game_id: ticket.game_id,
            results,
        });
        Ok(())
    }

    async fn fetch_statuses(&self, ticket: Ticket) -> ApiResult<()> {
        let members = self.members(&ticket);
        let statuses = join_all(members.iter().map(|&id| self.fetch_status(ticket, id))).await;
        first_error(statuses)
    }

    fn members(&self, ticket: &Ticket) -> Vec<UserId> {
        let state = lock_state(&self.state);
        match state.model.game() {
            Some(game) if state.model.accepts(ticket) => game.member_ids(),
            _ => Vec::new(),
        }
    }

    /// The server only reveals picks while a turn resolves or once the
    /// current user has picked, and there is nothing to show before anyone
    /// has.
    fn chosen_cards_visible(&self, ticket: &Ticket) -> bool {
        let state = lock_state(&self.state);
        let model = &state.model;
        let Some(game) = model.game().filter(|_| model.accepts(ticket)) else {
            return false;
        };
        let chosen = |id: UserId| {
            model
                .user_status(id)
                .map(|s| s.has_chosen_card)
                .unwrap_or(false)
        };
        let anyone = game.users.iter().any(|u| chosen(u.id));
        let me = state.current_user_id().map(chosen).unwrap_or(false);
        anyone && (game.is_resolving_turn || me)
    }

    // ------------------------------------------------------------------
    // Slices
    // ------------------------------------------------------------------

    fn claim(&self, ticket: Ticket, field: Field) -> Option<InFlight<'_>> {
        let key = (ticket, field);
        let fresh = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        if fresh {
            Some(InFlight {
                set: &self.in_flight,
                key,
            })
        } else {
            trace!(game_id = %ticket.game_id, field = ?field, "Already in flight, skipping");
            None
        }
    }

    async fn fetch_game(&self, ticket: Ticket) -> ApiResult<SnapshotMerge> {
        let Some(_claim) = self.claim(ticket, Field::Game) else {
            return Ok(SnapshotMerge::Stale);
        };
        let envelope = self.api.get_game(ticket.game_id).await?;
        let merge = self.merge_snapshot(&ticket, envelope.game);
        if merge != SnapshotMerge::Stale {
            lock_state(&self.state)
                .model
                .apply_results(&ticket, envelope.results);
        }
        Ok(merge)
    }

    async fn fetch_bots(&self, ticket: Ticket) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::AvailableBots) else {
            return Ok(());
        };
        let bots = self.api.get_available_bots(ticket.game_id).await?;
        let merge = lock_state(&self.state)
            .model
            .apply_available_bots(&ticket, bots);
        log_merge(&ticket, Field::AvailableBots, merge);
        Ok(())
    }

    /// Returns whether the summary moved or allows a placement.
    async fn fetch_progress(&self, ticket: Ticket) -> ApiResult<bool> {
        let Some(_claim) = self.claim(ticket, Field::Progress) else {
            return Ok(false);
        };
        let progress = self.api.get_progress(ticket.game_id).await?;
        let mut state = lock_state(&self.state);
        let previous = state.model.progress();
        let merge = state.model.apply_progress(&ticket, progress);
        log_merge(&ticket, Field::Progress, merge);
        Ok(merge.is_applied() && (previous != Some(progress) || progress.can_place_card))
    }

    async fn fetch_columns(&self, ticket: Ticket) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::Columns) else {
            return Ok(());
        };
        let columns = self.api.get_columns(ticket.game_id).await?;
        let merge = lock_state(&self.state).model.apply_columns(&ticket, columns);
        log_store_merge(&ticket, Field::Columns, merge);
        Ok(())
    }

    async fn fetch_status(&self, ticket: Ticket, user_id: UserId) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::Status(user_id)) else {
            return Ok(());
        };
        let status = self.api.get_user_status(ticket.game_id, user_id).await?;
        let merge = lock_state(&self.state)
            .model
            .apply_user_status(&ticket, user_id, status);
        log_merge(&ticket, Field::Status(user_id), merge);
        Ok(())
    }

    async fn fetch_heap(&self, ticket: Ticket, user_id: UserId) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::Heap(user_id)) else {
            return Ok(());
        };
        let heap = self.api.get_user_heap(ticket.game_id, user_id).await?;
        let merge = lock_state(&self.state)
            .model
            .apply_heap(&ticket, user_id, heap.cards);
        log_store_merge(&ticket, Field::Heap(user_id), merge);
        Ok(())
    }

    async fn fetch_hand(&self, ticket: Ticket) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::Hand) else {
            return Ok(());
        };
        let hand = self.api.get_hand(ticket.game_id).await?;
        let merge = lock_state(&self.state).model.apply_hand(&ticket, hand);
        log_store_merge(&ticket, Field::Hand, merge);
        Ok(())
    }

    async fn fetch_chosen_cards(&self, ticket: Ticket) -> ApiResult<()> {
        let Some(_claim) = self.claim(ticket, Field::ChosenCards) else {
            return Ok(());
        };
        let chosen = self.api.get_chosen_cards(ticket.game_id).await?;
        let merge = lock_state(&self.state)
            .model
            .apply_chosen_cards(&ticket, chosen);
        log_merge(&ticket, Field::ChosenCards, merge);
        Ok(())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

fn log_merge(ticket: &Ticket, field: Field, merge: Merge) {
    if merge == Merge::Stale {
        debug!(game_id = %ticket.game_id, field = ?field, "Dropped stale response");
    }
}

fn log_store_merge(ticket: &Ticket, field: Field, merge: takesix_store::Result<Merge>) {
    match merge {
        Ok(merge) => log_merge(ticket, field, merge),
        Err(e) => warn!(game_id = %ticket.game_id, field = ?field, error = %e, "Rejected response"),
    }
}

/// Log every failure, keep the first.
fn first_error(results: Vec<ApiResult<()>>) -> ApiResult<()> {
    let mut first = None;
    for err in results.into_iter().filter_map(Result::err) {
        warn!(error = %err, "Fetch failed");
        first.get_or_insert(err);
    }
    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
