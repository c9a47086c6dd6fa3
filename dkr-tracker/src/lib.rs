//! # dkr-tracker
//!
//! Client for the DKR Rando auto-tracker server.
//!
//! The server publishes the game's save data, gold balloon pickups, warp map
//! and error state as JSON documents on a local port. [`DkrRandoAutoTracker`]
//! polls it, tracks whether it is reachable, and invokes the application's
//! callbacks when the connection changes or a document's content changes.
//!
//! # Architecture
//!
//! ```text
//! DkrRandoAutoTracker ── restart/stop ──► polling loop (tokio task)
//!        │                                     │
//!     setters                          probe ──┼── ConnectionMonitor
//!        │                                     │
//!        ▼                        fetch (joined) ── ContentCache ──► Callbacks
//!   shared state ◄─────────────────────────────┘
//! ```

mod callbacks;
mod config;
mod connection;
mod error;
pub mod logging;
pub mod payload;
mod poller;
mod resource;
mod tracker;
mod transport;

pub use callbacks::*;
pub use config::*;
pub use connection::*;
pub use error::*;
pub use poller::StopReason;
pub use resource::*;
pub use tracker::*;
pub use transport::*;
