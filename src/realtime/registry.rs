//! Live connections and fan-out.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::PsychiatristKey;

use super::protocol::ServerEvent;

pub type ConnectionId = Uuid;

/// Serialized frames waiting to be written to one socket.
pub type Outbox = mpsc::UnboundedSender<Arc<String>>;

const ADJECTIVES: [&str; 24] = [
    "Quiet", "Gentle", "Calm", "Brave", "Kind", "Bright", "Steady", "Warm",
    "Patient", "Hopeful", "Curious", "Soft", "Bold", "Shy", "Proud", "Happy",
    "Eager", "Golden", "Silver", "Lucky", "Clever", "Witty", "Silent", "Wild",
];

const NOUNS: [&str; 24] = [
    "Fox", "Bear", "Eagle", "Wolf", "Heron", "Tiger", "Lion", "Owl",
    "Rabbit", "Falcon", "Hawk", "Otter", "Panda", "Kitten", "Puppy", "Phoenix",
    "Sparrow", "Turtle", "Dolphin", "Whale", "Elephant", "Giraffe", "Zebra", "Badger",
];

pub(crate) fn anonymous_alias() -> String {
    let mut rng = rand::rng();
    format!(
        "{} {}",
        ADJECTIVES.choose(&mut rng).unwrap_or(&"Quiet"),
        NOUNS.choose(&mut rng).unwrap_or(&"Owl"),
    )
}

/// One live bidirectional session.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Shown as the sender of chat lines from this connection.
    pub label: String,
    outbox: Outbox,
    psychiatrist: RwLock<Option<PsychiatristKey>>,
}

impl Connection {
    pub fn new(outbox: Outbox) -> Self {
        Self {
            id: Uuid::now_v7(),
            label: anonymous_alias(),
            outbox,
            psychiatrist: RwLock::new(None),
        }
    }

    pub fn psychiatrist(&self) -> Option<PsychiatristKey> {
        self.psychiatrist.read().clone()
    }

    /// Queues a frame; false once the socket writer is gone.
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.outbox.send(frame).is_ok()
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(event = event.name(), error = %e, "failed to serialize event");
            None
        }
    }
}

/// Every open connection, ordered by open time.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<BTreeMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, outbox: Outbox) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(outbox));
        self.connections.write().insert(connection.id, Arc::clone(&connection));
        debug!(conn_id = %connection.id, label = %connection.label, "connection opened");
        connection
    }

    /// Binds a connection to an identity. Last write wins.
    pub fn associate(&self, id: ConnectionId, key: PsychiatristKey) -> bool {
        let Some(connection) = self.get(id) else {
            return false;
        };
        let previous = connection.psychiatrist.write().replace(key.clone());
        if previous.as_ref().is_some_and(|p| *p != key) {
            debug!(conn_id = %id, from = ?previous, to = %key, "connection re-associated");
        }
        true
    }

    pub fn dissociate(&self, id: ConnectionId) -> Option<PsychiatristKey> {
        self.get(id)?.psychiatrist.write().take()
    }

    /// Drops the connection, handing back the identity it spoke for.
    pub fn close(&self, id: ConnectionId) -> Option<PsychiatristKey> {
        let connection = self.connections.write().remove(&id)?;
        debug!(conn_id = %id, "connection closed");
        connection.psychiatrist()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().get(&id).cloned()
    }

    pub fn send_to(&self, id: ConnectionId, event: &ServerEvent) -> bool {
        let Some(connection) = self.get(id) else {
            return false;
        };
        let Some(frame) = encode(event) else {
            return false;
        };
        connection.send(frame)
    }

    /// Fans an event out to every open connection. Returns how many took it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let connections = self.connections.read();
        let mut recipients = 0;
        for connection in connections.values() {
            if connection.send(Arc::clone(&frame)) {
                recipients += 1;
            } else {
                debug!(conn_id = %connection.id, event = event.name(), "dropped frame for closed connection");
            }
        }
        debug!(event = event.name(), recipients, "broadcast event");
        recipients
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;
    use crate::realtime::protocol::StatusChange;

    fn chat(text: &str) -> ServerEvent {
        ServerEvent::ChatMessage(ChatMessage { text: text.into(), sender: "Calm Owl".into() })
    }

    fn open(registry: &ConnectionRegistry) -> (Arc<Connection>, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.open(tx), rx)
    }

    fn recv(rx: &mut mpsc::UnboundedReceiver<Arc<String>>) -> ServerEvent {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn alias_has_two_words() {
        let alias = anonymous_alias();
        assert_eq!(alias.split(' ').count(), 2);
    }

    #[test]
    fn open_and_close() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = open(&registry);
        let (_c2, _rx2) = open(&registry);
        assert_eq!(registry.len(), 2);
        assert!(c1.psychiatrist().is_none());

        assert_eq!(registry.close(c1.id), None);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(c1.id).is_none());
    }

    #[test]
    fn close_unknown_is_noop() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.close(Uuid::now_v7()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn associate_is_last_write_wins() {
        let registry = ConnectionRegistry::new();
        let (c, _rx) = open(&registry);

        assert!(registry.associate(c.id, "doc-1".into()));
        assert!(registry.associate(c.id, "doc-1".into()));
        assert_eq!(c.psychiatrist(), Some("doc-1".into()));

        assert!(registry.associate(c.id, "doc-2".into()));
        assert_eq!(c.psychiatrist(), Some("doc-2".into()));

        assert_eq!(registry.close(c.id), Some("doc-2".into()));
    }

    #[test]
    fn associate_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.associate(Uuid::now_v7(), "doc-1".into()));
    }

    #[test]
    fn dissociate_clears_binding() {
        let registry = ConnectionRegistry::new();
        let (c, _rx) = open(&registry);
        registry.associate(c.id, "doc-1".into());
        assert_eq!(registry.dissociate(c.id), Some("doc-1".into()));
        assert_eq!(c.psychiatrist(), None);
        assert_eq!(registry.close(c.id), None);
    }

    #[test]
    fn broadcast_reaches_everyone() {
        let registry = ConnectionRegistry::new();
        let (_c1, mut rx1) = open(&registry);
        let (_c2, mut rx2) = open(&registry);

        assert_eq!(registry.broadcast(&chat("hello")), 2);
        assert_eq!(recv(&mut rx1), chat("hello"));
        assert_eq!(recv(&mut rx2), chat("hello"));
    }

    #[test]
    fn broadcast_to_nobody() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.broadcast(&chat("anyone?")), 0);
    }

    #[test]
    fn broadcast_skips_closed_outbox() {
        let registry = ConnectionRegistry::new();
        let (_gone, rx_gone) = open(&registry);
        let (_alive, mut rx_alive) = open(&registry);
        drop(rx_gone);

        let event = ServerEvent::StatusChanged(StatusChange { psychiatrist_key: "doc-1".into(), online: true });
        assert_eq!(registry.broadcast(&event), 1);
        assert_eq!(recv(&mut rx_alive), event);
    }

    #[test]
    fn broadcast_shares_one_frame() {
        let registry = ConnectionRegistry::new();
        let (_c1, mut rx1) = open(&registry);
        let (_c2, mut rx2) = open(&registry);
        registry.broadcast(&chat("shared"));

        let f1 = rx1.try_recv().unwrap();
        let f2 = rx2.try_recv().unwrap();
        assert!(Arc::ptr_eq(&f1, &f2));
    }

    #[test]
    fn send_to_targets_one() {
        let registry = ConnectionRegistry::new();
        let (c1, mut rx1) = open(&registry);
        let (_c2, mut rx2) = open(&registry);

        assert!(registry.send_to(c1.id, &chat("just you")));
        assert_eq!(recv(&mut rx1), chat("just you"));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn send_to_closed_or_unknown_fails() {
        let registry = ConnectionRegistry::new();
        let (c, rx) = open(&registry);
        drop(rx);
        assert!(!registry.send_to(c.id, &chat("hello?")));
        assert!(!registry.send_to(Uuid::now_v7(), &chat("hello?")));
    }
}
