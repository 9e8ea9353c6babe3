use serde::{Deserialize, Serialize};

use crate::constants::COLUMN_CARD_SIZE;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Server-assigned user id (players, bots and admins share one space).
    UserId
);
id_type!(GameId);
id_type!(CardId);
id_type!(ColumnId);

/// User role, carried on the wire as the integer `urole`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Role {
    Bot = 1,
    Player = 2,
    Admin = 3,
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            1 => Ok(Self::Bot),
            2 => Ok(Self::Player),
            3 => Ok(Self::Admin),
            other => Err(format!("unknown user role: {other}")),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role as u8
    }
}

/// Lifecycle of a game. Ordered: a game only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum GameStatus {
    Created = 0,
    Started = 1,
    Ended = 2,
}

impl TryFrom<u8> for GameStatus {
    type Error = String;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Self::Created),
            1 => Ok(Self::Started),
            2 => Ok(Self::Ended),
            other => Err(format!("unknown game status: {other}")),
        }
    }
}

impl From<GameStatus> for u8 {
    fn from(status: GameStatus) -> Self {
        status as u8
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GameStatus::Created => "created",
            GameStatus::Started => "started",
            GameStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_role")]
    pub urole: Role,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_role() -> Role {
    Role::Player
}

impl User {
    pub fn is_bot(&self) -> bool {
        self.urole == Role::Bot
    }
}

/// A dealt card. `number` orders placement, `cow_value` weighs the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub number: u32,
    pub cow_value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub id: ColumnId,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Column {
    /// Highest-numbered card of the column, the one the next card must beat.
    pub fn top(&self) -> Option<&Card> {
        self.cards.iter().max_by_key(|c| c.number)
    }

    /// Whether the next card placed here sweeps the column.
    pub fn is_full(&self) -> bool {
        self.cards.len() >= COLUMN_CARD_SIZE
    }

    pub fn value(&self) -> u32 {
        cow_sum(&self.cards)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub id: GameId,
    pub owner_id: UserId,
    pub status: GameStatus,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub is_resolving_turn: bool,
}

impl Game {
    /// Whether `user_id` is in the member list.
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.users.iter().any(|u| u.id == user_id)
    }

    pub fn member_ids(&self) -> Vec<UserId> {
        self.users.iter().map(|u| u.id).collect()
    }
}

/// A face-down pick for the turn in progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChosenCard {
    pub user_id: UserId,
    pub card: Card,
}

/// Per (game, user) transient flags. The server sends them alongside the
/// user's public fields, which are ignored here.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserGameStatus {
    #[serde(default)]
    pub has_chosen_card: bool,
    #[serde(default)]
    pub needs_to_choose_column: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Heap {
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Heap {
    pub fn value(&self) -> u32 {
        cow_sum(&self.cards)
    }
}

/// Owner-only summary returned by `GET /games/{id}/status`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameProgress {
    #[serde(default)]
    pub can_place_card: bool,
    #[serde(default)]
    pub can_choose_cards_for_bots: bool,
}

/// Sum of the cow values of `cards`.
pub fn cow_sum(cards: &[Card]) -> u32 {
    cards.iter().map(|c| c.cow_value).sum()
}
