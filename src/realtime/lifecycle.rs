//! A help request from submission to its one outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::HelpRequestStore,
    error::HelplineError,
    models::{HelpRequest, HelpRequestDraft},
};

use super::{protocol::DeliveryReport, routing::RoutingEngine};

const DELIVERED: &str = "help request delivered";
const NO_PSYCHIATRIST: &str = "no psychiatrist available";
const NOT_RECORDED: &str = "help request could not be recorded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpRequestState {
    Created,
    Delivered,
    Undeliverable,
}

impl HelpRequestState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, HelpRequestState::Created)
    }
}

/// The state lives here, never in the persisted record.
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    request: HelpRequest,
    state: HelpRequestState,
}

impl TrackedRequest {
    pub fn created(request: HelpRequest) -> Self {
        Self { request, state: HelpRequestState::Created }
    }

    pub fn request(&self) -> &HelpRequest {
        &self.request
    }

    pub fn state(&self) -> HelpRequestState {
        self.state
    }

    /// Moves out of `Created`. Terminal states stay put.
    fn transition(&mut self, next: HelpRequestState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = next;
        true
    }

    pub fn report(&self) -> DeliveryReport {
        let message = match self.state {
            HelpRequestState::Delivered => DELIVERED,
            HelpRequestState::Created | HelpRequestState::Undeliverable => NO_PSYCHIATRIST,
        };
        DeliveryReport::new(self.request.id, self.state, message)
    }
}

impl DeliveryReport {
    fn new(request_id: Uuid, state: HelpRequestState, message: &str) -> Self {
        Self { request_id, state, message: message.to_owned() }
    }

    /// For a request that was accepted but never reached the audit log.
    pub fn unrecorded(request_id: Uuid) -> Self {
        Self::new(request_id, HelpRequestState::Undeliverable, NOT_RECORDED)
    }
}

/// Takes submissions, records them, and routes them once. No retries.
pub struct HelpDesk {
    requests: Arc<dyn HelpRequestStore>,
    routing: Arc<RoutingEngine>,
}

impl HelpDesk {
    pub fn new(requests: Arc<dyn HelpRequestStore>, routing: Arc<RoutingEngine>) -> Self {
        Self { requests, routing }
    }

    pub async fn submit(&self, draft: HelpRequestDraft) -> Result<TrackedRequest, HelplineError> {
        let tracked = self.accept(draft)?;
        self.file(tracked).await
    }

    /// Validates and stamps a draft. Nothing is recorded or routed yet.
    pub fn accept(&self, draft: HelpRequestDraft) -> Result<TrackedRequest, HelplineError> {
        draft.validate()?;
        Ok(TrackedRequest::created(draft.into_request()))
    }

    /// Records the request at `Created`, then routes it. A request that
    /// cannot be recorded is never routed.
    pub async fn file(&self, tracked: TrackedRequest) -> Result<TrackedRequest, HelplineError> {
        self.requests.record(tracked.request()).await?;
        Ok(self.dispatch(tracked))
    }

    pub(crate) fn dispatch(&self, mut tracked: TrackedRequest) -> TrackedRequest {
        match self.routing.deliver(tracked.request()) {
            Ok(connection) => {
                tracked.transition(HelpRequestState::Delivered);
                info!(request_id = %tracked.request.id, conn_id = %connection, "help request delivered");
            }
            Err(e) => {
                tracked.transition(HelpRequestState::Undeliverable);
                info!(request_id = %tracked.request.id, reason = %e, "help request undeliverable");
            }
        }
        tracked
    }
}
