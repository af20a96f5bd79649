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

//! Time-windowed batching of inbound events.
//!
//! Inbound Exchange events are not delivered one by one. They are queued for a fixed
//! window measured from the first queued item, then flushed together: the queue is
//! inverted into a per-topic list of payloads so each subscriber is called once per
//! window with everything that arrived for its topic.

use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::time::Instant;

/// One queued inbound event: the topics it touches and its raw payload.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub topics: Vec<String>,
    pub payload: Value,
}

impl BatchEntry {
    /// Creates a new [`BatchEntry`] instance.
    #[must_use]
    pub const fn new(topics: Vec<String>, payload: Value) -> Self {
        Self { topics, payload }
    }
}

/// A queue that arms a flush deadline when its first item arrives.
#[derive(Debug)]
pub struct BatchQueue<T> {
    window: Duration,
    items: Vec<T>,
    deadline: Option<Instant>,
}

impl<T> BatchQueue<T> {
    /// Creates a new empty queue flushing `window` after its first item.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            items: Vec::new(),
            deadline: None,
        }
    }

    /// Appends an item.
    ///
    /// Returns `true` if this item armed the flush deadline (the queue was idle).
    pub fn push(&mut self, item: T) -> bool {
        self.items.push(item);

        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.window);
            return true;
        }

        false
    }

    /// Returns the pending flush deadline, if any item is queued.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drains the queue and disarms the deadline.
    pub fn take(&mut self) -> Vec<T> {
        self.deadline = None;
        std::mem::take(&mut self.items)
    }

    /// Drops every queued item and disarms the deadline, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        self.take().len()
    }

    /// Returns the number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Inverts queued entries into a topic to payloads mapping.
///
/// Payload order per topic is arrival order; topics appear in the order they were
/// first seen.
#[must_use]
pub fn invert_batch(entries: Vec<BatchEntry>) -> IndexMap<String, Vec<Value>> {
    let mut by_topic: IndexMap<String, Vec<Value>> = IndexMap::new();

    for BatchEntry { topics, payload } in entries {
        for topic in topics {
            by_topic.entry(topic).or_default().push(payload.clone());
        }
    }

    by_topic
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
