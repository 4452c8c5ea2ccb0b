//! # Custom Fields Engine
//!
//! Loads a dynamic custom-field hierarchy for one entity, resolves typed
//! values, mirror relationships and orphaned fields, and turns user edits
//! into a minimal update batch.
//!
//! ## Architecture
//!
//! The engine follows a Load-Reduce-Submit pattern:
//!
//! 1. **Load**: Fetches hierarchy, values and optional listings concurrently
//! 2. **Reduce**: Pure reducers turn each edit into the next [`state::EngineState`]
//! 3. **Render**: Projects the state into a serializable [`render::RenderModel`]
//! 4. **Submit**: Diffs against the load snapshot and sends only what changed
//!
//! ## Modules
//!
//! - [`schema`]: Hierarchy index and orphaned-field reconciliation
//! - [`values`]: Typed value extraction and change detection
//! - [`relationships`]: Mirror-field fallback, propagation and grouping
//! - [`compliance`]: Compliance cards and action routing
//! - [`validation`]: Submit-time input validation
//! - [`state`]: Engine state and reducers
//! - [`render`]: Render model projection
//! - [`session`]: Async session over a [`custom_fields_repository::FieldsService`]
//! - [`config`]: Configuration and dependency initialization
//! - [`errors`]: Error types for the engine

pub mod compliance;
pub mod config;
pub mod errors;
pub mod relationships;
pub mod render;
pub mod schema;
pub mod session;
pub mod state;
pub mod validation;
pub mod values;

pub use config::{Dependencies, EngineConfig};
pub use errors::EngineError;
pub use render::RenderModel;
pub use session::{EngineSession, SessionOptions, SubmitOutcome};

use thiserror::Error;

/// Errors that can occur while running the inspect binary.
#[derive(Error, Debug)]
pub enum InspectError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The render model could not be written out.
    #[error("Output error: {0}")]
    Output(String),
}

impl InspectError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
