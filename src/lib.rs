//! Web manager for the container daemon's `dockerd.json`.

pub mod config;
pub mod daemon;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod service;

pub use config::ManagerConfig;
pub use daemon::ConfigEngine;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
