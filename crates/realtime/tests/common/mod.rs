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

//! In-process WebSocket event server for channel integration tests.

#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use beacon_realtime::ChannelConfig;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::{self, JoinHandle},
    time::Instant,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Default)]
struct Shared {
    connections: AtomicUsize,
    heartbeats: AtomicUsize,
    reply_heartbeats: bool,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

/// Event server that records client frames and pushes frames on demand.
#[derive(Debug)]
pub struct TestServer {
    pub port: u16,
    task: JoinHandle<()>,
    shared: Arc<Shared>,
    received_rx: mpsc::UnboundedReceiver<Value>,
}

impl TestServer {
    /// Starts a server; `reply_heartbeats` controls whether client pings are answered.
    pub async fn setup(reply_heartbeats: bool) -> Self {
        Self::setup_on(0, reply_heartbeats).await
    }

    /// Starts a server listening on `port` (0 picks a free port).
    pub async fn setup_on(port: u16, reply_heartbeats: bool) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let shared = Arc::new(Shared {
            reply_heartbeats,
            ..Default::default()
        });
        let (received_tx, received_rx) = mpsc::unbounded_channel();

        let server_shared = shared.clone();
        let task = task::spawn(async move {
            loop {
                let (conn, _) = listener.accept().await.unwrap();
                task::spawn(serve(conn, server_shared.clone(), received_tx.clone()));
            }
        });

        Self {
            port,
            task,
            shared,
            received_rx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Number of accepted WebSocket connections so far.
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of client heartbeat pings received so far.
    pub fn heartbeats(&self) -> usize {
        self.shared.heartbeats.load(Ordering::SeqCst)
    }

    /// Sends a frame on the most recent connection.
    pub fn send(&self, message: Message) {
        let outbound = self.shared.outbound.lock().unwrap();
        outbound
            .as_ref()
            .expect("no client connected")
            .send(message)
            .unwrap();
    }

    pub fn send_json(&self, value: &Value) {
        self.send(Message::Text(value.to_string().into()));
    }

    pub fn send_exchange(&self, keys: &[&str], payload: Value) {
        let mut payload = payload;
        payload["entity_key"] = json!(keys);
        self.send_json(&json!({"event_type": "Exchange", "payload": payload}));
    }

    /// Closes the most recent connection from the server side.
    pub fn close_connection(&self) {
        self.send(Message::Close(None));
    }

    /// Waits for the next Exchange announcement, skipping heartbeats.
    ///
    /// Returns the announced keys, sorted.
    pub async fn next_announcement(&mut self, within: Duration) -> Option<Vec<String>> {
        let deadline = Instant::now() + within;

        loop {
            let frame = tokio::time::timeout_at(deadline, self.received_rx.recv())
                .await
                .ok()??;

            if frame["event_type"] == "Exchange" {
                let mut keys: Vec<String> =
                    serde_json::from_value(frame["payload"]["entity_key"].clone()).unwrap();
                keys.sort();
                return Some(keys);
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(conn: TcpStream, shared: Arc<Shared>, received_tx: mpsc::UnboundedSender<Value>) {
    // Frames sent before the handshake completes queue until the loop starts
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    *shared.outbound.lock().unwrap() = Some(outbound_tx);

    let Ok(websocket) = accept_async(conn).await else {
        return;
    };
    let (mut writer, mut reader) = websocket.split();
    shared.connections.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);

                    if frame["event_type"] == "Heartbeat" {
                        shared.heartbeats.fetch_add(1, Ordering::SeqCst);
                        if shared.reply_heartbeats {
                            let pong = json!({"event_type": "Heartbeat", "payload": "pong"});
                            if writer.send(Message::Text(pong.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    let _ = received_tx.send(frame);
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            msg = outbound_rx.recv() => match msg {
                Some(msg) => {
                    if writer.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

/// Returns a free local port with nothing listening on it.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Returns a URL nothing listens on.
pub async fn unreachable_url() -> String {
    format!("ws://127.0.0.1:{}", free_port().await)
}

/// Config with windows short enough for tests.
pub fn fast_config() -> ChannelConfig {
    ChannelConfig {
        max_retries: 3,
        retry_delay_ms: 50,
        throttle_window_ms: 50,
        batch_window_ms: 200,
        heartbeat_interval_ms: 10_000,
        connect_timeout_ms: 2_000,
    }
}

/// Polls `condition` until it holds or `within` elapses.
pub async fn eventually(within: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
