//! Collaborators around the daemon service itself.
//!
//! # Data Flow
//! ```text
//! HTTP layer
//!     → status.rs (is the daemon running?)
//!     → system.rs (DSM / docker versions for the status page)
//!     → probe.rs (can a mirror or proxy be reached?)
//!     → restart.rs (restart the service, stream its log)
//!           → command.rs (shell commands with timeouts)
//! ```
//!
//! # Design Decisions
//! - Nothing here touches `dockerd.json` or the backup directory
//! - Every external command runs with a timeout and is killed on drop
//! - Command strings come from configuration and run through `sh -c`

pub mod command;
pub mod probe;
pub mod restart;
pub mod status;
pub mod system;

pub use restart::{RestartCoordinator, RestartError, RestartEvent};
pub use status::DaemonStatus;
