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

//! Configuration for the realtime channel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum consecutive reconnection attempts after connection errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Delay before each reconnection attempt (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Coalescing window for subscription announcements (milliseconds).
pub const DEFAULT_THROTTLE_WINDOW_MS: u64 = 300;
/// Flush window for batched Exchange deliveries (milliseconds).
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 10_000;
/// Heartbeat ping interval, and the time allowed for the reply (milliseconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;
/// Upper bound on a single connection handshake (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for a [`RealtimeChannel`](crate::channel::RealtimeChannel).
///
/// The defaults are the protocol constants the server expects. Overriding them is
/// intended for tests and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Maximum consecutive reconnection attempts after connection errors.
    pub max_retries: u32,
    /// The delay (milliseconds) before each reconnection attempt.
    pub retry_delay_ms: u64,
    /// The window (milliseconds) for coalescing subscription announcements.
    pub throttle_window_ms: u64,
    /// The window (milliseconds) over which Exchange events are batched.
    pub batch_window_ms: u64,
    /// The heartbeat interval (milliseconds).
    pub heartbeat_interval_ms: u64,
    /// The timeout (milliseconds) for a single connection handshake.
    pub connect_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            throttle_window_ms: DEFAULT_THROTTLE_WINDOW_MS,
            batch_window_ms: DEFAULT_BATCH_WINDOW_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ChannelConfig {
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub const fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_window_ms)
    }

    #[must_use]
    pub const fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_defaults_match_protocol_constants() {
        let config = ChannelConfig::default();

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.throttle_window(), Duration::from_millis(300));
        assert_eq!(config.batch_window(), Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[rstest]
    fn test_deserialize_partial_uses_defaults() {
        let config: ChannelConfig =
            serde_json::from_str(r#"{"batch_window_ms": 250, "max_retries": 1}"#).unwrap();

        assert_eq!(config.batch_window(), Duration::from_millis(250));
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
    }

    #[rstest]
    fn test_deserialize_rejects_unknown_fields() {
        let result: Result<ChannelConfig, _> = serde_json::from_str(r#"{"retries": 5}"#);
        assert!(result.is_err());
    }
}
