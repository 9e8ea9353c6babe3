//! # takesix-store
//!
//! In-memory model of the one game the client is currently following.
//!
//! The server only ever hands out slices of a game (header, a user's
//! status, a user's heap, the hand, the columns, ...). [`GameModel`] merges
//! each slice into its own field so that responses arriving in any order
//! never clobber one another, and rejects responses that belong to a game
//! selection that has since been replaced (see [`Ticket`]).
//!
//! Nothing here performs I/O or blocks.

pub mod model;
pub mod ticket;

mod error;

pub use error::{Result, StoreError};
pub use model::GameModel;
pub use ticket::{Field, Merge, SnapshotMerge, Ticket};
