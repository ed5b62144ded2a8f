//! uoccin-core library.
//!
//! Leaderless synchronization of a media watchlist/collection state across
//! devices that only share a folder. Each device appends commands to a
//! diff log ([`agent::DeviceAgent`]), folds it into `uoccin.json`
//! ([`reduce`]) and copies it into every sibling's inbox. Siblings fold
//! the logs they receive with [`inbox::scan`] / [`inbox::Inbox::apply`].
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module, each with a `code()` into
//!   [`error::ErrorCode`]. Config loading uses `anyhow::Result`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`). The library
//!   never installs a subscriber.

pub mod agent;
pub mod command;
pub mod config;
pub mod diff_log;
pub mod error;
pub mod inbox;
pub mod layout;
pub mod lock;
pub mod reduce;
pub mod store;
pub mod sync;
