//! `OnboardingStore` trait — single async interface for persistence.
//!
//! The engine is the only writer for a given client while its workflow is
//! active; the store is the system of record that survives restarts and
//! serves list queries.

use async_trait::async_trait;
use uuid::Uuid;

use crate::client::{Client, ClientStatus};
use crate::error::StoreError;
use crate::workflow::OnboardingProgress;

/// One page of a client listing.
#[derive(Debug, Clone)]
pub struct ClientPage {
    pub clients: Vec<Client>,
    /// Total matching records before pagination.
    pub total: usize,
}

/// Backend-agnostic store for clients and their onboarding progress.
#[async_trait]
pub trait OnboardingStore: Send + Sync {
    /// Insert or update a client record.
    async fn upsert_client(&self, client: &Client) -> Result<(), StoreError>;

    /// Get a client by id.
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError>;

    /// List clients, optionally filtered by status, newest first.
    async fn list_clients(
        &self,
        status: Option<ClientStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<ClientPage, StoreError>;

    /// Delete a client and its progress. Returns false if unknown.
    async fn delete_client(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Insert or update a progress record.
    async fn upsert_progress(&self, progress: &OnboardingProgress) -> Result<(), StoreError>;

    /// Get the progress record for a client.
    async fn get_progress(&self, client_id: Uuid)
    -> Result<Option<OnboardingProgress>, StoreError>;
}
