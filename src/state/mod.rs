//! # Application state store.
//!
//! The durable per-application build status lives outside the worker.
//! The pipeline reads it once for the idempotency gate (and once more before
//! pushing) and writes it at most twice per request: `building`, then `failed`
//! on a user-attributable failure.
//!
//! [`MemoryStore`] is the only in-tree backend (`database.driver: memory`).

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::ApplicationState;

pub use memory::MemoryStore;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No application with this id.
    #[error("application {0} not found")]
    NotFound(String),

    /// The backend failed.
    #[error("state store: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "store_not_found",
            StoreError::Backend(_) => "store_backend",
        }
    }
}

#[async_trait]
pub trait ApplicationStateStore: Send + Sync + 'static {
    async fn get_state(&self, application_id: &str) -> Result<ApplicationState, StoreError>;

    async fn update_state(
        &self,
        application_id: &str,
        state: ApplicationState,
    ) -> Result<(), StoreError>;
}
