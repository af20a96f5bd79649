// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Publish/subscribe registry mapping topics to subscriber callbacks.
//!
//! The registry is the single source of truth for what the channel announces to the
//! server. A topic exists in the registry only while it has at least one callback:
//! removing the last callback removes the topic entirely.
//!
//! # Thread Safety
//!
//! All operations are thread-safe. Callbacks are invoked outside of any internal lock,
//! so a callback may subscribe or unsubscribe without deadlocking.

use std::{
    fmt::Debug,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use serde_json::Value;
use ustr::Ustr;

/// What a subscriber receives for one topic.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// Payloads accumulated for the topic during one flush window, in arrival order.
    Batch(Vec<Value>),
    /// A single passthrough event, delivered as soon as it arrives.
    Event(Value),
}

impl Delivery {
    /// Returns the delivered payloads as a slice.
    #[must_use]
    pub fn payloads(&self) -> &[Value] {
        match self {
            Self::Batch(payloads) => payloads,
            Self::Event(payload) => std::slice::from_ref(payload),
        }
    }
}

/// Function type for subscriber callbacks, called with the topic and its delivery.
pub type EventCallback = Arc<dyn Fn(&str, &Delivery) + Send + Sync>;

/// Identifies one `subscribe` call so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Returns the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    callback: EventCallback,
}

/// Topic to callbacks registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    topics: Arc<DashMap<Ustr, Vec<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SubscriptionRegistry))
            .field("topics", &self.topics.len())
            .field("subscribers", &self.subscriber_total())
            .finish()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers `callback` for every topic in `topics`.
    ///
    /// Returns the subscriber id and whether any topic went from zero to one callback
    /// (caller should re-announce the topic set to the server).
    pub fn subscribe<S: AsRef<str>>(
        &self,
        topics: &[S],
        callback: EventCallback,
    ) -> (SubscriberId, bool) {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut added_topic = false;

        for topic in topics {
            let mut entry = self.topics.entry(Ustr::from(topic.as_ref())).or_default();
            if entry.is_empty() {
                added_topic = true;
            }
            // The same id may appear at most once per topic
            if !entry.iter().any(|subscriber| subscriber.id == id) {
                entry.push(Subscriber {
                    id,
                    callback: callback.clone(),
                });
            }
        }

        (id, added_topic)
    }

    /// Removes the subscriber `id` from `topics`, or every subscriber if `id` is `None`.
    ///
    /// Returns `true` if any topic was left without callbacks and removed.
    pub fn unsubscribe<S: AsRef<str>>(&self, topics: &[S], id: Option<SubscriberId>) -> bool {
        self.remove_where(topics, |subscriber| {
            id.is_none_or(|id| subscriber.id == id)
        })
    }

    /// Removes `callback` (matched by identity) from `topics`.
    ///
    /// Returns `true` if any topic was left without callbacks and removed.
    pub fn unsubscribe_callback<S: AsRef<str>>(&self, topics: &[S], callback: &EventCallback) -> bool {
        self.remove_where(topics, |subscriber| {
            Arc::ptr_eq(&subscriber.callback, callback)
        })
    }

    fn remove_where<S: AsRef<str>>(
        &self,
        topics: &[S],
        predicate: impl Fn(&Subscriber) -> bool,
    ) -> bool {
        let mut removed_topic = false;

        for topic in topics {
            // Topics never subscribed were never interned
            let Some(key) = Ustr::from_existing(topic.as_ref()) else {
                continue;
            };
            let mut now_empty = false;

            if let Some(mut entry) = self.topics.get_mut(&key) {
                entry.retain(|subscriber| !predicate(subscriber));
                now_empty = entry.is_empty();
            }

            if now_empty {
                // Re-check under the shard lock in case a subscriber arrived in between
                if self
                    .topics
                    .remove_if(&key, |_, subscribers| subscribers.is_empty())
                    .is_some()
                {
                    removed_topic = true;
                }
            }
        }

        removed_topic
    }

    /// Invokes every callback registered for `topic`, in subscription order.
    ///
    /// A panicking callback is logged and skipped; delivery continues with the
    /// remaining callbacks. Returns the number of callbacks invoked.
    ///
    /// Lookups never intern `topic`, so server-chosen topic names without
    /// subscribers leave no trace in the interner.
    pub fn publish(&self, topic: &str, delivery: &Delivery) -> usize {
        let Some(key) = Ustr::from_existing(topic) else {
            return 0;
        };
        let callbacks: Vec<Subscriber> = match self.topics.get(&key) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        for subscriber in &callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| {
                (subscriber.callback)(topic, delivery);
            }));

            if result.is_err() {
                tracing::error!(
                    topic,
                    subscriber = subscriber.id.value(),
                    "Subscriber callback panicked"
                );
            }
        }

        callbacks.len()
    }

    /// Returns all topics that currently have at least one callback, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .topics
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().to_string())
            .collect();
        topics.sort_unstable();
        topics
    }

    /// Returns the number of callbacks registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        Ustr::from_existing(topic)
            .and_then(|key| self.topics.get(&key).map(|entry| entry.len()))
            .unwrap_or(0)
    }

    fn subscriber_total(&self) -> usize {
        self.topics.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns the number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns true if no topic has a callback.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Removes every topic and callback.
    pub fn clear(&self) {
        self.topics.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
