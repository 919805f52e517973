//! Fan-out boundary.
//!
//! The engine decides *who* should see an event and hands it to a
//! [`Broadcaster`]; getting bytes onto sockets is someone else's job.
//! Publishing is fire-and-forget: a closed or slow peer never blocks or
//! fails the engine.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use bingohall_protocol::{ConnectionId, Recipient, ServerEvent};
use tokio::sync::mpsc;

/// Delivers outbound events.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, recipient: Recipient, event: ServerEvent);

    /// Adds a connection to the round audience.
    fn subscribe(&self, connection: ConnectionId);

    /// Removes a connection from the round audience.
    fn unsubscribe(&self, connection: ConnectionId);
}

impl<T: Broadcaster + ?Sized> Broadcaster for Arc<T> {
    fn publish(&self, recipient: Recipient, event: ServerEvent) {
        (**self).publish(recipient, event);
    }

    fn subscribe(&self, connection: ConnectionId) {
        (**self).subscribe(connection);
    }

    fn unsubscribe(&self, connection: ConnectionId) {
        (**self).unsubscribe(connection);
    }
}

/// Receiving end of one connection's outbound queue.
pub type Outbox = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Default)]
struct Audience {
    outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    round: HashSet<ConnectionId>,
}

/// A [`Broadcaster`] backed by one unbounded channel per connection.
///
/// The server [`attach`](Self::attach)es each connection after its
/// handshake and drains the returned [`Outbox`] in a writer task. The
/// engine's `subscribe`/`unsubscribe` only decide round membership;
/// `Recipient::All` and `Recipient::Connection` reach any attached
/// connection.
#[derive(Default)]
pub struct ChannelBroadcaster {
    audience: Mutex<Audience>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and returns its outbox. Re-attaching the same
    /// id replaces the old outbox.
    pub fn attach(&self, connection: ConnectionId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().outboxes.insert(connection, tx);
        rx
    }

    /// Forgets a connection entirely; its outbox closes.
    pub fn detach(&self, connection: ConnectionId) {
        let mut audience = self.lock();
        audience.outboxes.remove(&connection);
        audience.round.remove(&connection);
    }

    pub fn attached_count(&self) -> usize {
        self.lock().outboxes.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().round.len()
    }

    pub fn is_subscribed(&self, connection: ConnectionId) -> bool {
        self.lock().round.contains(&connection)
    }

    // A panic while holding the lock leaves the maps consistent, so a
    // poisoned lock is safe to keep using.
    fn lock(&self) -> std::sync::MutexGuard<'_, Audience> {
        self.audience.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, recipient: Recipient, event: ServerEvent) {
        let audience = self.lock();
        let send = |connection: &ConnectionId| {
            if let Some(tx) = audience.outboxes.get(connection) {
                // A closed outbox means the writer is already gone.
                let _ = tx.send(event.clone());
            }
        };
        match recipient {
            Recipient::All => audience.outboxes.keys().for_each(send),
            Recipient::Round => audience.round.iter().for_each(send),
            Recipient::RoundExcept(excluded) => audience
                .round
                .iter()
                .filter(|c| **c != excluded)
                .for_each(send),
            Recipient::Connection(connection) => send(&connection),
        }
    }

    fn subscribe(&self, connection: ConnectionId) {
        self.lock().round.insert(connection);
    }

    fn unsubscribe(&self, connection: ConnectionId) {
        self.lock().round.remove(&connection);
    }
}
