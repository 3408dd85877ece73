use std::sync::Arc;

use tracing::{error, warn};

use crate::{
    db::{HelpRequestStore, IdentityStore},
    models::{ChatMessage, HelpRequestDraft, PsychiatristKey},
};

use super::{
    lifecycle::HelpDesk,
    presence::PresenceStore,
    protocol::{ChatSignal, ClientSignal, DeliveryReport, PresenceSignal, ServerEvent},
    registry::{Connection, ConnectionId, ConnectionRegistry, Outbox},
    routing::RoutingEngine,
};

/// One deployment's worth of realtime state. Cheap to build, so tests make
/// their own.
pub struct Switchboard {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceStore>,
    routing: Arc<RoutingEngine>,
    desk: HelpDesk,
}

impl Switchboard {
    pub fn new(identities: Arc<dyn IdentityStore>, requests: Arc<dyn HelpRequestStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = Arc::new(PresenceStore::new(identities, Arc::clone(&registry)));
        let routing = Arc::new(RoutingEngine::new(Arc::clone(&registry), Arc::clone(&presence)));
        let desk = HelpDesk::new(requests, Arc::clone(&routing));
        Self { registry, presence, routing, desk }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    pub fn desk(&self) -> &HelpDesk {
        &self.desk
    }

    /// Registers a connection, announcing `psychiatrist` online if given.
    pub async fn connect(&self, outbox: Outbox, psychiatrist: Option<PsychiatristKey>) -> Arc<Connection> {
        let connection = self.registry.open(outbox);
        if let Some(key) = psychiatrist {
            self.announce_online(&connection, key).await;
        }
        connection
    }

    pub async fn disconnect(&self, id: ConnectionId) {
        let Some(key) = self.registry.close(id) else {
            return;
        };
        if let Err(e) = self.presence.release(&key, id).await {
            warn!(conn_id = %id, key = %key, error = %e, "could not mark closed connection offline");
        }
    }

    /// Parses and handles one inbound frame. Bad frames are dropped.
    pub async fn handle_frame(&self, connection: &Connection, frame: &[u8]) {
        match ClientSignal::parse(frame) {
            Ok(signal) => self.handle_signal(connection, signal).await,
            Err(e) => warn!(conn_id = %connection.id, error = %e, "dropping signal"),
        }
    }

    pub async fn handle_signal(&self, connection: &Connection, signal: ClientSignal) {
        match signal {
            ClientSignal::AnnounceOnline(PresenceSignal { psychiatrist_key }) => {
                self.announce_online(connection, psychiatrist_key).await
            }
            ClientSignal::AnnounceOffline(PresenceSignal { psychiatrist_key }) => {
                self.announce_offline(connection, psychiatrist_key).await
            }
            ClientSignal::SubmitHelpRequest(draft) => self.submit_help_request(connection, draft).await,
            ClientSignal::SendChatMessage(ChatSignal { text }) => {
                let sender = self.sender_label(connection);
                self.routing.broadcast_chat(ChatMessage { text, sender });
            }
        }
    }

    async fn announce_online(&self, connection: &Connection, key: PsychiatristKey) {
        if let Some(previous) = connection.psychiatrist().filter(|p| *p != key) {
            if let Err(e) = self.presence.release(&previous, connection.id).await {
                warn!(conn_id = %connection.id, key = %previous, error = %e, "could not release previous identity");
            }
        }

        match self.presence.set_online(&key, connection.id).await {
            Ok(_) => {
                self.registry.associate(connection.id, key);
            }
            Err(e) => warn!(conn_id = %connection.id, key = %key, error = %e, "ignoring announce-online"),
        }
    }

    async fn announce_offline(&self, connection: &Connection, key: PsychiatristKey) {
        match self.presence.set_offline(&key).await {
            Ok(_) => {
                if connection.psychiatrist().as_ref() == Some(&key) {
                    self.registry.dissociate(connection.id);
                }
            }
            Err(e) => warn!(conn_id = %connection.id, key = %key, error = %e, "ignoring announce-offline"),
        }
    }

    async fn submit_help_request(&self, connection: &Connection, draft: HelpRequestDraft) {
        let tracked = match self.desk.accept(draft) {
            Ok(tracked) => tracked,
            Err(e) => {
                warn!(conn_id = %connection.id, error = %e, "help request not accepted");
                return;
            }
        };

        let request_id = tracked.request().id;
        let report = match self.desk.file(tracked).await {
            Ok(tracked) => tracked.report(),
            Err(e) => {
                error!(conn_id = %connection.id, %request_id, error = %e, "help request not recorded");
                DeliveryReport::unrecorded(request_id)
            }
        };
        self.registry.send_to(connection.id, &ServerEvent::HelpRequestResult(report));
    }

    fn sender_label(&self, connection: &Connection) -> String {
        connection
            .psychiatrist()
            .and_then(|key| self.presence.record(&key))
            .map(|record| record.identity.name)
            .unwrap_or_else(|| connection.label.clone())
    }
}
