//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine, restart coordinator, HTTP layer
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (operation counters, backup gauge)
//!
//! Consumers:
//!     → stdout / journald
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Metrics are recorded unconditionally; without an installed exporter
//!   the `metrics` facade discards them

pub mod logging;
pub mod metrics;
