pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod notifier;
pub mod reporter;
pub mod state;
pub mod types;

/// Grass REST API base URL.
pub const API_BASE: &str = "https://api.getgrass.io";

/// Account profile (`result.data` holds the user object).
pub const PROFILE_PATH: &str = "/retrieveUser";

/// Per-epoch earnings (`result.data.data` holds the list).
pub const EARNINGS_PATH: &str = "/epochEarnings";

/// Devices attached to the account (`result.data.data` holds the list).
pub const DEVICES_PATH: &str = "/activeDevices";
