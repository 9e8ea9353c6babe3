/// Application name
pub const APP_NAME: &str = "Take Six";

/// Maximum number of members in one game (players and bots)
pub const MAX_PLAYER_NUMBER: usize = 5;

/// Cards dealt to each member when a game starts
pub const HAND_SIZE: usize = 10;

/// A column holding this many cards is swept by the next card placed on it
pub const COLUMN_CARD_SIZE: usize = 5;

/// Default refresh cadence of the turn synchronizer in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default game server base URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";

/// Page size used when listing games
pub const DEFAULT_GAMES_PAGE_LIMIT: u32 = 25;
