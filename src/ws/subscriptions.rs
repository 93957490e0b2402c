//! Subscription registry with one-shot confirmation slots.
//!
//! Every subscribe request creates an inactive entry plus a single-use
//! confirmation slot keyed by the channel's canonical key. The
//! dispatcher posts exactly once into the slot when the matching
//! `subscribed/...` or scoped `error` envelope arrives; the awaiting
//! caller either receives that result or times out. Active entries are
//! what gets replayed after a reconnect.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::error::{Error, Result};

use super::channel::Channel;

/// One registered subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    /// The subscribed channel.
    pub channel: Channel,
    /// Auth token sent with the subscribe request, for private channels.
    pub auth_token: Option<String>,
    /// True once the server confirmed the subscription.
    pub active: bool,
    /// When the confirmation arrived.
    pub subscribed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, SubscriptionEntry>,
    pending: HashMap<String, oneshot::Sender<Result<()>>>,
}

/// Registry of in-flight and confirmed subscriptions.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    inner: RwLock<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-flight subscription and return the slot the
    /// confirmation will be delivered into.
    ///
    /// A pending (inactive) entry under the same key is replaced and its
    /// previous waiter's slot dropped.
    ///
    /// # Errors
    ///
    /// [`Error::AuthTokenRequired`] for a private channel without a
    /// token; [`Error::AlreadySubscribed`] when an *active* entry holds
    /// the key.
    pub fn add(
        &self,
        channel: Channel,
        auth_token: Option<String>,
    ) -> Result<oneshot::Receiver<Result<()>>> {
        let key = channel.key();

        // An empty token counts as missing.
        if channel.requires_auth() && auth_token.as_deref().map_or(true, str::is_empty) {
            return Err(Error::AuthTokenRequired(key));
        }

        let mut inner = self.inner.write().expect("registry lock poisoned");

        if inner.entries.get(&key).is_some_and(|e| e.active) {
            return Err(Error::AlreadySubscribed(key));
        }

        let (tx, rx) = oneshot::channel();
        inner.entries.insert(
            key.clone(),
            SubscriptionEntry {
                channel,
                auth_token,
                active: false,
                subscribed_at: None,
            },
        );
        inner.pending.insert(key, tx);
        Ok(rx)
    }

    /// Deliver a confirmation result into the pending slot for `key`.
    ///
    /// On success the entry is promoted to active; on failure it is
    /// dropped. No-op when nothing is pending under the key, which is
    /// how replayed confirmations after a reconnect are absorbed.
    pub fn confirm(&self, key: &str, result: Result<()>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let Some(slot) = inner.pending.remove(key) else {
            return;
        };

        if result.is_ok() {
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.active = true;
                entry.subscribed_at = Some(Utc::now());
            }
        } else {
            inner.entries.remove(key);
        }
        let _ = slot.send(result);
    }

    /// Drop the entry and any pending slot for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::NotSubscribed`] when the key is unknown.
    pub fn remove(&self, key: &str) -> Result<SubscriptionEntry> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.pending.remove(key);
        inner
            .entries
            .remove(key)
            .ok_or_else(|| Error::NotSubscribed(key.to_string()))
    }

    /// True when an entry exists under `key` and is active.
    pub fn is_subscribed(&self, key: &str) -> bool {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.entries.get(key).is_some_and(|e| e.active)
    }

    /// Snapshot of the active entries, for reconnect replay.
    pub fn active(&self) -> Vec<SubscriptionEntry> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .entries
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect()
    }

    /// Number of entries, active or pending.
    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").entries.len()
    }

    /// Drop every entry and pending slot, waking all waiters with a
    /// closed channel.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.entries.clear();
        inner.pending.clear();
    }
}
