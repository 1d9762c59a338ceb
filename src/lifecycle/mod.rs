//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HTTP server stops accepting → in-flight requests finish → exit
//! ```
//!
//! # Design Decisions
//! - A restart already running in the background is not awaited on exit;
//!   the daemon restart itself is owned by systemd
//! - Writes to `dockerd.json` are atomic, so exiting mid-request never
//!   leaves a torn file

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
