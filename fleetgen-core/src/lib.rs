//! Generation control loop for synthetic fleet records.
//!
//! A [`GenerationController`] owns a start/stop state machine and at most one
//! timer-driven loop. Each tick samples a vehicle ([`factory`]), derives its
//! content identifier ([`identity`]) and fans the record out to a bus topic
//! and a view-update channel ([`publisher`]). Status is read through
//! [`StatusQuery`] without touching the transition lock.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fleetgen_core::{GenerationController, GeneratorConfig, MemoryBus};
//!
//! # async fn demo() -> Result<(), fleetgen_core::ConfigError> {
//! let controller = GenerationController::new(GeneratorConfig::default(), Arc::new(MemoryBus::default()))?;
//! controller.start().await;
//! let status = controller.status();
//! assert!(status.is_generating);
//! controller.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod factory;
pub mod identity;
pub mod publisher;
pub mod status;
pub mod types;

pub use bus::{BusMessage, BusPublisher, MemoryBus};
pub use config::GeneratorConfig;
pub use controller::GenerationController;
pub use error::{ConfigError, PublishError};
pub use factory::RecordFactory;
pub use publisher::{EventPublisher, LogErrorSink, PublishErrorSink, PublisherStats};
pub use status::{GenerationState, StatusQuery};
pub use types::*;
