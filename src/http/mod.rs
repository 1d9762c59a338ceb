//! HTTP surface: web UI, JSON API and the restart log stream.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → handlers.rs (JSON API → ConfigEngine / service)
//!     → stream.rs (SSE restart log)
//!     → error.rs (failures → status code + JSON body)
//! ```

pub mod error;
pub mod handlers;
pub mod pages;
pub mod server;
pub mod stream;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
