//! Change notification bridge - Invalidation hints for observers.
//!
//! After every committed mutation the facade publishes a [`ChangeEvent`] naming the
//! collection and entity that changed. Observers register with [`ChangeNotifier::subscribe`]
//! and get a [`Subscription`] whose lifetime bounds the registration: dropping it
//! or calling [`Subscription::unsubscribe`] stops delivery.
//!
//! Events carry identifiers only. Observers must re-read authoritative state when
//! notified, since ordering relative to other writers is not guaranteed. An observer
//! that falls behind the channel receives [`Notification::Resync`] instead of the
//! events it missed.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_CAPACITY: usize = 256;

/// Store collections that emit change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// `offers`
    Offers,
    /// `applications`
    Applications,
    /// `transactions`
    Transactions,
    /// `time_balances`
    TimeBalances,
}

/// One committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Collection that changed
    pub collection: Collection,
    /// Primary key of the changed row, as text
    pub entity_id: String,
    /// Users whose views include this row
    pub users: Vec<String>,
}

impl ChangeEvent {
    /// Builds an event for a row visible to the given users.
    pub fn new(collection: Collection, entity_id: impl ToString, users: &[&str]) -> Self {
        Self {
            collection,
            entity_id: entity_id.to_string(),
            users: users.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Which events of a collection an observer wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFilter {
    /// Every event
    All,
    /// Events for one row
    Entity(String),
    /// Events for rows visible to one user
    User(String),
}

impl ChangeFilter {
    fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            Self::All => true,
            Self::Entity(id) => event.entity_id == *id,
            Self::User(user) => event.users.iter().any(|u| u == user),
        }
    }
}

/// What an observer callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A matching row changed
    Changed(ChangeEvent),
    /// Events were dropped; re-read everything in this collection
    Resync(Collection),
}

/// Fan-out point for change events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeNotifier {
    /// Creates a notifier buffering up to `capacity` events per observer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event. Fire-and-forget: having no observers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            collection = ?event.collection,
            entity_id = %event.entity_id,
            "publishing change"
        );
        if self.sender.send(event).is_err() {
            tracing::trace!("no observers registered");
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Registers `callback` for events in `collection` that pass `filter`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<F>(
        &self,
        collection: Collection,
        filter: ChangeFilter,
        callback: F,
    ) -> Subscription
    where
        F: Fn(Notification) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if event.collection == collection && filter.matches(&event) {
                            callback(Notification::Changed(event));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(?collection, skipped, "observer lagged, requesting resync");
                        callback(Notification::Resync(collection));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Subscription { collection, task }
    }
}

/// Live registration of one observer. Delivery stops when this is dropped.
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Collection this subscription watches.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Stops delivery and releases the observer.
    pub fn unsubscribe(self) {
        tracing::debug!(collection = ?self.collection, "unsubscribing observer");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
