use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ApplicationStateStore, StoreError};
use crate::model::ApplicationState;

/// Process-local state store.
///
/// Updating an unknown application inserts it.
#[derive(Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<String, ApplicationState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store; used at startup and in tests.
    pub fn with_states<I, K>(states: I) -> Self
    where
        I: IntoIterator<Item = (K, ApplicationState)>,
        K: Into<String>,
    {
        Self {
            states: RwLock::new(states.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Current state without going through the trait.
    pub async fn snapshot(&self, application_id: &str) -> Option<ApplicationState> {
        self.states.read().await.get(application_id).cloned()
    }
}

#[async_trait]
impl ApplicationStateStore for MemoryStore {
    async fn get_state(&self, application_id: &str) -> Result<ApplicationState, StoreError> {
        self.states
            .read()
            .await
            .get(application_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(application_id.to_string()))
    }

    async fn update_state(
        &self,
        application_id: &str,
        state: ApplicationState,
    ) -> Result<(), StoreError> {
        self.states
            .write()
            .await
            .insert(application_id.to_string(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            store.get_state("nope").await,
            Err(StoreError::NotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn update_then_read() {
        let store = MemoryStore::with_states([("app", ApplicationState::NotBuilding)]);
        store
            .update_state("app", ApplicationState::Building)
            .await
            .unwrap();
        assert_eq!(store.get_state("app").await, Ok(ApplicationState::Building));
    }
}
