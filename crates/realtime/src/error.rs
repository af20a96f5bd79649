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

//! Error types for realtime channel operations.

use std::time::Duration;

use thiserror::Error;

/// Result alias for realtime channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Error type for realtime channel failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Underlying transport error from the WebSocket implementation.
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    /// The connection handshake did not complete in time.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionLost,

    /// Every reconnection attempt failed.
    #[error("Connection failed after {retries} retries: {reason}")]
    RetriesExhausted { retries: u32, reason: String },

    /// `connect` was called with a different URL while a connection is active.
    #[error("Channel already connected to {url}")]
    AlreadyConnected { url: String },

    /// The channel was closed before the operation completed.
    #[error("Channel closed")]
    Closed,

    /// The channel has been destroyed and cannot be used.
    #[error("Channel destroyed")]
    Destroyed,

    /// Failed to serialize an outbound frame.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
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
    fn test_retries_exhausted_display() {
        let error = ChannelError::RetriesExhausted {
            retries: 3,
            reason: "Connection closed by server".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Connection failed after 3 retries: Connection closed by server"
        );
    }

    #[rstest]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ChannelError::from(json_error);
        assert!(matches!(error, ChannelError::Json(_)));
    }

    #[rstest]
    fn test_from_tungstenite_error() {
        let error = ChannelError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(error, ChannelError::Transport(_)));
    }
}
