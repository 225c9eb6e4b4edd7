//! In-memory store backend — default for tests and credential-free demos.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::client::{Client, ClientStatus};
use crate::error::StoreError;
use crate::workflow::OnboardingProgress;

use super::traits::{ClientPage, OnboardingStore};

/// `HashMap`-backed store guarded by an `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    clients: RwLock<HashMap<Uuid, Client>>,
    progress: RwLock<HashMap<Uuid, OnboardingProgress>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OnboardingStore for MemoryStore {
    async fn upsert_client(&self, client: &Client) -> Result<(), StoreError> {
        self.clients
            .write()
            .await
            .insert(client.id, client.clone());
        Ok(())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.read().await.get(&id).cloned())
    }

    async fn list_clients(
        &self,
        status: Option<ClientStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<ClientPage, StoreError> {
        let clients = self.clients.read().await;
        let mut matching: Vec<Client> = clients
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok(ClientPage {
            clients: page,
            total,
        })
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.clients.write().await.remove(&id).is_some();
        self.progress.write().await.remove(&id);
        Ok(removed)
    }

    async fn upsert_progress(&self, progress: &OnboardingProgress) -> Result<(), StoreError> {
        self.progress
            .write()
            .await
            .insert(progress.client_id, progress.clone());
        Ok(())
    }

    async fn get_progress(
        &self,
        client_id: Uuid,
    ) -> Result<Option<OnboardingProgress>, StoreError> {
        Ok(self.progress.read().await.get(&client_id).cloned())
    }
}
