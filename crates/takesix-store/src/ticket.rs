//! Request tags and merge outcomes.

use takesix_shared::types::{GameId, GameStatus, UserId};

/// Identifies the selection a request was issued under.
///
/// Taken from the model before a request goes out and handed back with the
/// response. The model bumps its generation whenever the selection changes,
/// and its revision whenever an action changed the game on the server. A
/// ticket from before either bump no longer matches and the response is
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub game_id: GameId,
    pub generation: u64,
    pub revision: u64,
}

/// Outcome of a field merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Applied,
    /// The data was older than what the model holds, or its ticket was
    /// superseded. Nothing changed.
    Stale,
}

impl Merge {
    pub fn is_applied(self) -> bool {
        matches!(self, Merge::Applied)
    }
}

/// Outcome of merging a game header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMerge {
    Stale,
    Applied {
        /// Status observed before this snapshot, `None` for the first one.
        previous: Option<GameStatus>,
        current: GameStatus,
    },
}

impl SnapshotMerge {
    /// `Some(current)` when the snapshot moved the game to a new phase
    /// (including the first snapshot after a selection).
    pub fn entered(&self) -> Option<GameStatus> {
        match *self {
            SnapshotMerge::Applied { previous, current } if previous != Some(current) => {
                Some(current)
            }
            _ => None,
        }
    }

    pub fn current(&self) -> Option<GameStatus> {
        match *self {
            SnapshotMerge::Applied { current, .. } => Some(current),
            SnapshotMerge::Stale => None,
        }
    }
}

/// Independently merged parts of the model. Each carries its own freshness
/// timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Game,
    Results,
    Progress,
    AvailableBots,
    Columns,
    Hand,
    ChosenCards,
    Status(UserId),
    Heap(UserId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entered_only_on_change() {
        let first = SnapshotMerge::Applied {
            previous: None,
            current: GameStatus::Created,
        };
        assert_eq!(first.entered(), Some(GameStatus::Created));

        let same = SnapshotMerge::Applied {
            previous: Some(GameStatus::Started),
            current: GameStatus::Started,
        };
        assert_eq!(same.entered(), None);
        assert_eq!(same.current(), Some(GameStatus::Started));

        assert_eq!(SnapshotMerge::Stale.entered(), None);
        assert_eq!(SnapshotMerge::Stale.current(), None);
    }
}
