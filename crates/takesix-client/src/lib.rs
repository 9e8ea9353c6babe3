//! # takesix-client
//!
//! Headless client for the take-six game server. It follows one game at a
//! time: the [`sync::Synchronizer`] keeps a local model of it current by
//! polling, the [`gateway::ActionGateway`] sends the user's moves, and
//! [`projection`] derives what the UI may offer from the model.

pub mod client;
pub mod config;
pub mod events;
pub mod gateway;
pub mod projection;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;

pub use client::GameClient;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("takesix_client_lib=debug,takesix_client=debug,takesix_net=info,takesix_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
