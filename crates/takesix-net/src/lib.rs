//! # takesix-net
//!
//! Typed access to the take-six game server.
//!
//! [`GameApi`] is the seam the rest of the client talks to; [`HttpGameApi`]
//! is the production implementation over `reqwest`. The crate carries no
//! game logic: it only builds requests and decodes envelopes.

pub mod api;
pub mod http;

pub use api::{ApiResult, GameApi};
pub use http::HttpGameApi;
