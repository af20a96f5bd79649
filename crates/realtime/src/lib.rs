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

//! Realtime event channel for Beacon event servers.
//!
//! The `beacon-realtime` crate maintains one persistent WebSocket connection to an
//! event server and fans typed server events out to local subscribers by topic:
//!
//! - Topic naming with `<EventType>:<key>` strings and grouping by event type.
//! - A thread-safe subscription registry with per-callback unsubscribe handles.
//! - Throttled announcement of the subscribed Exchange keys to the server.
//! - Windowed batching of Exchange events, delivered as one batch per topic.
//! - Heartbeat liveness detection with silent reconnection.
//! - Bounded retries with a fixed delay after connection errors.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use beacon_realtime::{ChannelConfig, Delivery, RealtimeChannel};
//!
//! # async fn run() -> beacon_realtime::ChannelResult<()> {
//! let channel = RealtimeChannel::new(ChannelConfig::default());
//! channel.connect("wss://events.example.com/ws").await?;
//!
//! let handle = channel.subscribe(
//!     &["Exchange:order-1"],
//!     Arc::new(|topic: &str, delivery: &Delivery| {
//!         println!("{topic}: {} events", delivery.payloads().len());
//!     }),
//! )?;
//!
//! handle.unsubscribe();
//! channel.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod batch;
pub mod channel;
pub mod config;
pub mod error;
pub mod global;
pub mod logging;
pub mod messages;
pub mod registry;
pub mod state;
pub mod tls;
pub mod topic;

pub use crate::{
    channel::{RealtimeChannel, SubscriptionHandle},
    config::ChannelConfig,
    error::{ChannelError, ChannelResult},
    registry::{Delivery, EventCallback, SubscriberId, SubscriptionRegistry},
    state::ConnectionState,
};
