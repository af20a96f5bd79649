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

//! Process-wide shared channel.
//!
//! Applications that want a single connection per process can use [`channel`]
//! instead of passing a [`RealtimeChannel`] around. Code that needs isolation
//! (tests, multiple servers) constructs its own channels directly.

use std::sync::OnceLock;

use crate::{channel::RealtimeChannel, config::ChannelConfig};

static CHANNEL: OnceLock<RealtimeChannel> = OnceLock::new();

/// Initializes the shared channel with `config`.
///
/// Only the first initialization takes effect; later calls return the existing
/// channel unchanged.
pub fn init(config: ChannelConfig) -> &'static RealtimeChannel {
    let mut initialized = false;
    let channel = CHANNEL.get_or_init(|| {
        initialized = true;
        RealtimeChannel::new(config)
    });

    if !initialized {
        tracing::debug!("Shared channel already initialized, ignoring config");
    }
    channel
}

/// Returns the shared channel, creating it with the default config on first use.
pub fn channel() -> &'static RealtimeChannel {
    CHANNEL.get_or_init(RealtimeChannel::default)
}
