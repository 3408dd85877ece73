use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    error::HelplineError,
    models::{ChatMessage, HelpRequest},
};

use super::{
    presence::PresenceStore,
    protocol::ServerEvent,
    registry::{ConnectionId, ConnectionRegistry},
};

/// Chat and status go to everyone; help requests go to their target or nowhere.
pub struct RoutingEngine {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceStore>,
}

impl RoutingEngine {
    pub fn new(registry: Arc<ConnectionRegistry>, presence: Arc<PresenceStore>) -> Self {
        Self { registry, presence }
    }

    pub fn broadcast_chat(&self, message: ChatMessage) -> usize {
        self.registry.broadcast(&ServerEvent::ChatMessage(message))
    }

    /// Hands the request to its target's current connection. Presence is read
    /// now, not when the request was created.
    pub fn deliver(&self, request: &HelpRequest) -> Result<ConnectionId, HelplineError> {
        let Some(target) = &request.target_key else {
            debug!(request_id = %request.id, "help request has no target");
            return Err(HelplineError::NoRecipient);
        };
        let Some(connection) = self.presence.connection_of(target) else {
            debug!(request_id = %request.id, target_key = %target, "target offline");
            return Err(HelplineError::NoRecipient);
        };

        if self
            .registry
            .send_to(connection, &ServerEvent::HelpRequestReceived(request.clone()))
        {
            Ok(connection)
        } else {
            warn!(request_id = %request.id, target_key = %target, conn_id = %connection, "target connection already gone");
            Err(HelplineError::DeliveryFailed(target.clone()))
        }
    }
}
