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

use strum::{AsRefStr, Display, EnumString};

/// Lifecycle state of a realtime channel.
///
/// ```text
/// Idle -> Connecting -> Open -> Closing -> Closed
///              ^          |
///              |          v
///          Retrying <- Erroring -> Failed
/// ```
#[derive(Clone, Copy, Debug, Default, Display, Hash, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ConnectionState {
    /// No connection has been requested yet.
    #[default]
    Idle,
    /// A handshake with the server is in progress.
    Connecting,
    /// The socket is open; heartbeats and deliveries are running.
    Open,
    /// A socket error or server-side close is being handled.
    Erroring,
    /// Waiting to reconnect after an error or a missed heartbeat.
    Retrying,
    /// The client requested a close and the driver is shutting down.
    Closing,
    /// Closed by the client; `connect` may be called again.
    Closed,
    /// The retry budget was exhausted; `connect` may be called again.
    Failed,
    /// Destroyed; the channel cannot be used again.
    Destroyed,
}

impl ConnectionState {
    /// Returns true if the socket is open.
    #[inline]
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true while a connection is being established or re-established.
    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting | Self::Erroring | Self::Retrying)
    }

    /// Returns true if a driver is (or should be) running for this state.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_open() || self.is_connecting()
    }

    /// Returns true if `connect` may start a new connection from this state.
    #[inline]
    #[must_use]
    pub const fn can_connect(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }

    /// Returns true if the channel has been destroyed.
    #[inline]
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
