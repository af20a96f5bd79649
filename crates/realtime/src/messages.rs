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

//! Wire protocol for the realtime channel.
//!
//! Every frame is a JSON text message with an `event_type` discriminator and a
//! `payload`. The two event types the channel acts on are modelled as [`EventType`];
//! anything else is carried through as [`InboundEvent::Other`] so newer servers can
//! add event types without breaking older clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Payload sent with every client heartbeat.
pub const HEARTBEAT_PING: &str = "ping";

/// Event types with protocol meaning for the channel.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum EventType {
    /// Entity change notifications, and the client's subscription announcement.
    Exchange,
    /// Liveness ping (client) and pong (server).
    Heartbeat,
}

/// A raw frame before classification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WsFrame {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of an Exchange frame in either direction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePayload {
    pub entity_key: Vec<String>,
}

/// A classified inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundEvent {
    /// Entities identified by `keys` changed; `payload` is the raw frame payload.
    Exchange { keys: Vec<String>, payload: Value },
    /// Server heartbeat reply.
    Heartbeat(Value),
    /// Any event type the channel does not interpret.
    Other { event_type: String, payload: Value },
}

impl InboundEvent {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON frame, or if an Exchange frame
    /// has no `entity_key` list.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let frame: WsFrame = serde_json::from_str(text)?;
        Self::from_frame(frame)
    }

    /// Classifies an already decoded frame.
    ///
    /// # Errors
    ///
    /// Returns an error if an Exchange frame has no `entity_key` list.
    pub fn from_frame(frame: WsFrame) -> Result<Self, serde_json::Error> {
        match frame.event_type.parse::<EventType>() {
            Ok(EventType::Exchange) => {
                let ExchangePayload { entity_key } = ExchangePayload::deserialize(&frame.payload)?;
                Ok(Self::Exchange {
                    keys: entity_key,
                    payload: frame.payload,
                })
            }
            Ok(EventType::Heartbeat) => Ok(Self::Heartbeat(frame.payload)),
            Err(_) => Ok(Self::Other {
                event_type: frame.event_type,
                payload: frame.payload,
            }),
        }
    }

    /// Returns the event type name as it appeared on the wire.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Exchange { .. } => EventType::Exchange.as_ref(),
            Self::Heartbeat(_) => EventType::Heartbeat.as_ref(),
            Self::Other { event_type, .. } => event_type,
        }
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a, P: Serialize> {
    event_type: EventType,
    payload: &'a P,
}

fn encode<P: Serialize>(event_type: EventType, payload: &P) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundFrame {
        event_type,
        payload,
    })
}

/// Builds the client heartbeat frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn heartbeat_ping() -> Result<String, serde_json::Error> {
    encode(EventType::Heartbeat, &HEARTBEAT_PING)
}

/// Builds the Exchange subscription announcement for the given entity keys.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn exchange_subscribe(keys: &[String]) -> Result<String, serde_json::Error> {
    encode(
        EventType::Exchange,
        &ExchangePayload {
            entity_key: keys.to_vec(),
        },
    )
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
