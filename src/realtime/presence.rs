//! Who is online, and on which connection.
//!
//! Every flip goes through the identity store first, then the in-memory
//! record, then a `status-changed` broadcast to every open connection. Flips
//! for one identity queue on that identity's sequencer so they land (and are
//! announced) in arrival order; flips for different identities interleave.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as Sequencer;
use tracing::info;

use crate::{
    db::IdentityStore,
    error::HelplineError,
    models::{PsychiatristIdentity, PsychiatristKey},
};

use super::{
    protocol::{ServerEvent, StatusChange},
    registry::{ConnectionId, ConnectionRegistry},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub identity: PsychiatristIdentity,
    pub online: bool,
    /// Lookup only. The registry owns the connection.
    pub connection: Option<ConnectionId>,
}

pub struct PresenceStore {
    identities: Arc<dyn IdentityStore>,
    registry: Arc<ConnectionRegistry>,
    records: RwLock<HashMap<PsychiatristKey, PresenceRecord>>,
    sequencers: Mutex<HashMap<PsychiatristKey, Arc<Sequencer<()>>>>,
}

impl PresenceStore {
    pub fn new(identities: Arc<dyn IdentityStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            identities,
            registry,
            records: RwLock::new(HashMap::new()),
            sequencers: Mutex::new(HashMap::new()),
        }
    }

    fn sequencer(&self, key: &PsychiatristKey) -> Arc<Sequencer<()>> {
        Arc::clone(self.sequencers.lock().entry(key.clone()).or_default())
    }

    /// Drops the sequencer of a key the store never resolved, once nobody
    /// else is queued on it. Clones are only taken under the map lock, so the
    /// count read here is stable.
    fn retire(&self, key: &PsychiatristKey, sequencer: Arc<Sequencer<()>>) {
        let mut sequencers = self.sequencers.lock();
        if Arc::strong_count(&sequencer) == 2 && !self.records.read().contains_key(key) {
            sequencers.remove(key);
        }
    }

    pub async fn set_online(
        &self,
        key: &PsychiatristKey,
        connection: ConnectionId,
    ) -> Result<PresenceRecord, HelplineError> {
        let sequencer = self.sequencer(key);
        let result = {
            let _turn = sequencer.lock().await;
            self.apply(key, true, Some(connection)).await
        };
        self.retire(key, sequencer);
        result
    }

    pub async fn set_offline(&self, key: &PsychiatristKey) -> Result<PresenceRecord, HelplineError> {
        let sequencer = self.sequencer(key);
        let result = {
            let _turn = sequencer.lock().await;
            self.apply(key, false, None).await
        };
        self.retire(key, sequencer);
        result
    }

    /// Offline on behalf of a closing connection. Skipped when the identity has
    /// since moved to another connection or already went offline.
    pub async fn release(
        &self,
        key: &PsychiatristKey,
        connection: ConnectionId,
    ) -> Result<Option<PresenceRecord>, HelplineError> {
        let sequencer = self.sequencer(key);
        let result = {
            let _turn = sequencer.lock().await;

            let current = self
                .records
                .read()
                .get(key)
                .is_some_and(|r| r.online && r.connection == Some(connection));
            if current {
                self.apply(key, false, None).await.map(Some)
            } else {
                Ok(None)
            }
        };
        self.retire(key, sequencer);
        result
    }

    async fn apply(
        &self,
        key: &PsychiatristKey,
        online: bool,
        connection: Option<ConnectionId>,
    ) -> Result<PresenceRecord, HelplineError> {
        let identity = self.identities.set_online(key, online).await?;

        let record = PresenceRecord { identity, online, connection };
        self.records.write().insert(key.clone(), record.clone());

        let recipients = self.registry.broadcast(&ServerEvent::StatusChanged(StatusChange {
            psychiatrist_key: key.clone(),
            online,
        }));
        info!(key = %key, online, recipients, "presence changed");

        Ok(record)
    }

    pub fn is_online(&self, key: &PsychiatristKey) -> bool {
        self.records.read().get(key).is_some_and(|r| r.online)
    }

    /// The connection an online identity is reachable on.
    pub fn connection_of(&self, key: &PsychiatristKey) -> Option<ConnectionId> {
        self.records
            .read()
            .get(key)
            .filter(|r| r.online)
            .and_then(|r| r.connection)
    }

    pub fn record(&self, key: &PsychiatristKey) -> Option<PresenceRecord> {
        self.records.read().get(key).cloned()
    }

    pub fn online(&self) -> Vec<PsychiatristIdentity> {
        let mut online: Vec<_> = self
            .records
            .read()
            .values()
            .filter(|r| r.online)
            .map(|r| r.identity.clone())
            .collect();
        online.sort_by(|a, b| a.key.cmp(&b.key));
        online
    }
}
