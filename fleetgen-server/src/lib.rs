//! HTTP control surface for the fleet record generator.
//!
//! Exposes Start/Stop/Status over REST and streams the view-update channel
//! and the generated-record bus topic over Server-Sent Events.

pub mod access;
pub mod config;
pub mod routes;

pub use access::{PermissionCheck, RoleValidator};
pub use config::ServerConfig;
pub use routes::{create_router, AppState};
