//! Save/load orchestration
//!
//! Invoked by the HTTP control surface; every operation is scoped to the
//! avatar identity currently tracked by the shared state. The remote query
//! client attaches once the startup path finishes discovery, so requests
//! arriving earlier fail with NotReady instead of blocking.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::avatar::AvatarState;
use crate::error::{Error, Result};
use crate::osc::ParameterSender;
use crate::oscquery::OscQueryClient;
use crate::store::{ParameterRecord, Snapshot, SnapshotStore};

/// One row of the snapshot listing
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEntry {
    pub key: String,
    pub display_name: String,
    /// Whether this entry belongs to the currently active avatar
    pub current: bool,
}

/// Orchestrates snapshot save/load/copy against the discovered remote
pub struct SyncService {
    store: SnapshotStore,
    sender: ParameterSender,
    avatar: Arc<AvatarState>,
    remote: RwLock<Option<OscQueryClient>>,
}

impl SyncService {
    pub fn new(store: SnapshotStore, sender: ParameterSender, avatar: Arc<AvatarState>) -> Self {
        Self {
            store,
            sender,
            avatar,
            remote: RwLock::new(None),
        }
    }

    /// Attach the query client once discovery has resolved the remote root
    pub async fn attach_remote(&self, client: OscQueryClient) {
        info!("remote query root attached: {}", client.root());
        *self.remote.write().await = Some(client);
    }

    /// Whether the remote query root has been discovered
    pub async fn is_connected(&self) -> bool {
        self.remote.read().await.is_some()
    }

    /// Query root of the attached remote, if any
    pub async fn remote_root(&self) -> Option<String> {
        self.remote
            .read()
            .await
            .as_ref()
            .map(|c| c.root().to_string())
    }

    async fn remote(&self) -> Result<OscQueryClient> {
        self.remote
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::NotReady("remote service not yet discovered".to_string()))
    }

    /// Identity save/load operations are scoped to
    pub async fn current_avatar(&self) -> Result<String> {
        self.avatar
            .current()
            .await
            .ok_or_else(|| Error::NotReady("avatar identity not yet known".to_string()))
    }

    /// Capture the current avatar's replayable parameters into its snapshot slot
    ///
    /// Returns the number of parameters captured. Descriptors without a
    /// value are skipped, not fatal; a failed tree query aborts the save
    /// with the previous snapshot untouched.
    pub async fn save(&self, display_name: Option<String>) -> Result<usize> {
        let current = self.current_avatar().await?;
        let remote = self.remote().await?;

        let descriptors = remote.fetch_readwrite_parameters().await?;
        let mut parameters = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match descriptor.value {
                Some(value) => parameters.push(ParameterRecord {
                    name: descriptor.name,
                    value,
                }),
                None => warn!("parameter {} has no value, skipping", descriptor.name),
            }
        }

        let snapshot = Snapshot {
            name: display_name.filter(|n| !n.trim().is_empty()),
            parameters,
        };
        let count = snapshot.parameters.len();
        self.store.write(&current, &snapshot)?;
        info!("saved {count} parameters for {current}");
        Ok(count)
    }

    /// Replay a stored snapshot's values for the current avatar
    ///
    /// Datagrams go out in snapshot order, one per parameter, best-effort.
    /// Returns the number of parameters sent.
    pub async fn load(&self, key: &str) -> Result<usize> {
        let current = self.current_avatar().await?;
        let snapshot = self.store.read(key)?;

        if SnapshotStore::storage_key(key)? == SnapshotStore::storage_key(&current)? {
            debug!("replaying {key} onto its own avatar");
        }

        for record in &snapshot.parameters {
            self.sender
                .send_parameter(&record.name, record.value)
                .await?;
        }
        info!(
            "replayed {} parameters from {key} for {current}",
            snapshot.parameters.len()
        );
        Ok(snapshot.parameters.len())
    }

    /// Duplicate a stored snapshot into the current avatar's slot
    pub async fn copy_to_current(&self, from: &str) -> Result<()> {
        let current = self.current_avatar().await?;
        self.store.copy(from, &current)?;
        info!("copied snapshot {from} to {current}");
        Ok(())
    }

    /// Remove a stored snapshot
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)?;
        info!("deleted snapshot {key}");
        Ok(())
    }

    /// Enumerate stored snapshots, marking the current avatar's slot
    pub async fn list(&self) -> Result<Vec<SnapshotEntry>> {
        let current_key = match self.avatar.current().await {
            Some(identity) => Some(SnapshotStore::storage_key(&identity)?),
            None => None,
        };
        let entries = self.store.list()?;
        Ok(entries
            .into_iter()
            .map(|(key, display_name)| SnapshotEntry {
                current: current_key.as_deref() == Some(key.as_str()),
                key,
                display_name,
            })
            .collect())
    }
}
