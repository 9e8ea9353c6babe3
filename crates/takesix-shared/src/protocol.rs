//! JSON envelopes of the game server's REST endpoints.
//!
//! Every endpoint wraps its payload in a single named field
//! (`{ "game": ... }`, `{ "columns": [...] }`, ...). Errors are always
//! `{ "error": "<message>" }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Card, ChosenCard, Column, Game, Heap, User, UserGameStatus};

/// `GET /games/{id}`, `POST /games`, `POST /games/{id}/enter`, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEnvelope {
    pub game: Game,
    /// Username to heap value. Empty while the game has not started.
    #[serde(default)]
    pub results: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesEnvelope {
    pub games: Vec<Game>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsEnvelope {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotsEnvelope {
    pub available_bots: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusEnvelope {
    pub user: UserGameStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapEnvelope {
    /// `null` when the user has no heap in this game yet.
    #[serde(default)]
    pub heap: Option<Heap>,
}

/// The hand endpoint has been observed returning both a bare card list and
/// the hand record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandPayload {
    Cards(Vec<Card>),
    Record { cards: Vec<Card> },
}

impl HandPayload {
    pub fn into_cards(self) -> Vec<Card> {
        match self {
            HandPayload::Cards(cards) | HandPayload::Record { cards } => cards,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandEnvelope {
    #[serde(default)]
    pub hand: Option<HandPayload>,
}

impl HandEnvelope {
    pub fn into_cards(self) -> Vec<Card> {
        self.hand.map(HandPayload::into_cards).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenCardsEnvelope {
    pub chosen_cards: Vec<ChosenCard>,
}

/// `POST /games/{id}/card/{card_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChosenCardEnvelope {
    pub chosen_card: ChosenCard,
}

/// Body of `POST /games/{id}/turns/resolve` and `.../columns/{cid}/choose`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnResolution {
    #[serde(default)]
    pub chosen_column: Option<Column>,
    #[serde(default)]
    pub user_heap: Option<Heap>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hand_as_card_list() {
        let json = r#"{"hand": [{"id": 4, "number": 4, "cow_value": 1}]}"#;
        let env: HandEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.into_cards().len(), 1);
    }

    #[test]
    fn test_hand_as_record() {
        let json = r#"{"hand": {"id": 1, "user_id": 2, "game_id": 7,
                       "cards": [{"id": 4, "number": 4, "cow_value": 1},
                                 {"id": 55, "number": 55, "cow_value": 7}]}}"#;
        let env: HandEnvelope = serde_json::from_str(json).unwrap();
        let cards = env.into_cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].cow_value, 7);
    }

    #[test]
    fn test_null_hand_is_empty() {
        let env: HandEnvelope = serde_json::from_str(r#"{"hand": null}"#).unwrap();
        assert!(env.into_cards().is_empty());
    }

    #[test]
    fn test_game_envelope_without_results() {
        let json = r#"{"game": {"id": 7, "owner_id": 1, "status": 1, "users": []}}"#;
        let env: GameEnvelope = serde_json::from_str(json).unwrap();
        assert!(env.results.is_empty());
    }

    #[test]
    fn test_turn_resolution_partial() {
        let json = r#"{"chosen_column": {"id": 2, "cards": []}, "user_heap": null}"#;
        let res: TurnResolution = serde_json::from_str(json).unwrap();
        assert!(res.chosen_column.is_some());
        assert!(res.user_heap.is_none());
    }
}
