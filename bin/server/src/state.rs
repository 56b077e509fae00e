//! Shared application state.

use crate::db::PgSessionStore;
use async_trait::async_trait;
use std::sync::Arc;
use switchboard_conversation::SessionStoreError;
use switchboard_router::Router;

/// Prerequisite check behind `GET /health`.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Returns true if the sessions table exists.
    async fn table_exists(&self) -> Result<bool, SessionStoreError>;
}

#[async_trait]
impl StoreHealth for PgSessionStore {
    async fn table_exists(&self) -> Result<bool, SessionStoreError> {
        PgSessionStore::table_exists(self).await
    }
}

/// Shared application state.
pub struct AppState {
    /// Routes inbound messages.
    pub router: Router,
    /// Store health check.
    pub health: Arc<dyn StoreHealth>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(router: Router, health: Arc<dyn StoreHealth>) -> Self {
        Self { router, health }
    }
}
