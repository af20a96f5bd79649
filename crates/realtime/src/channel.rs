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

//! Realtime event channel over a single WebSocket connection.
//!
//! **Key features**:
//! - One persistent connection multiplexing many topic subscriptions.
//! - Throttled re-announcement of the subscribed Exchange keys to the server.
//! - Exchange events batched per topic over a fixed window before delivery.
//! - Application-level heartbeat with liveness detection.
//! - Bounded reconnection after connection errors.
//!
//! **Design**:
//! - A driver task exclusively owns the socket, every timer and the batch queue, and
//!   multiplexes them in one `select!` loop, so each transition runs to completion.
//! - The [`RealtimeChannel`] handle talks to the driver over a command channel.
//! - The [`SubscriptionRegistry`] is the only shared state; the driver reads it when
//!   announcing and dispatching.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use arc_swap::ArcSwapOption;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, sleep, sleep_until},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::{
    batch::{BatchEntry, BatchQueue, invert_batch},
    config::ChannelConfig,
    error::{ChannelError, ChannelResult},
    messages::{self, EventType, InboundEvent},
    registry::{Delivery, EventCallback, SubscriberId, SubscriptionRegistry},
    state::ConnectionState,
    tls,
    topic::{encode_topic, group_topics},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Time allowed for the driver to shut down gracefully on `close`.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents a command for the driver task.
#[derive(Debug)]
enum DriverCommand {
    /// Re-announce the subscribed topics (throttled).
    Announce,
    /// Reply once the connection is open, or with the error that ends the attempt.
    AwaitOpen(oneshot::Sender<ChannelResult<()>>),
    /// Close the connection and stop the driver.
    Close,
}

#[derive(Debug)]
struct DriverControl {
    url: String,
    cmd_tx: mpsc::UnboundedSender<DriverCommand>,
    task: JoinHandle<()>,
}

struct ChannelInner {
    config: ChannelConfig,
    registry: SubscriptionRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    commands: ArcSwapOption<mpsc::UnboundedSender<DriverCommand>>,
    driver: Mutex<Option<DriverControl>>,
    destroyed: AtomicBool,
}

impl ChannelInner {
    fn request_announce(&self) {
        if let Some(cmd_tx) = self.commands.load_full()
            && cmd_tx.send(DriverCommand::Announce).is_err()
        {
            tracing::trace!("Driver stopped, announcement deferred to next connection");
        }
    }

    fn ensure_usable(&self) -> ChannelResult<()> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(ChannelError::Destroyed);
        }
        Ok(())
    }
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        if let Some(control) = self.driver.get_mut().take()
            && !control.task.is_finished()
        {
            control.task.abort();
            tracing::debug!("Aborted task 'driver'");
        }
    }
}

/// Realtime event channel.
///
/// Cloning is cheap; clones share the same connection and registry.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RealtimeChannel))
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Default for RealtimeChannel {
    fn default() -> Self {
        Self::new(ChannelConfig::default())
    }
}

impl RealtimeChannel {
    /// Creates a new idle channel.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(ChannelInner {
                config,
                registry: SubscriptionRegistry::new(),
                state: Arc::new(state),
                commands: ArcSwapOption::empty(),
                driver: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the channel configuration.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns a receiver notified on every lifecycle transition.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns true if the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Returns the URL of the active connection, if any.
    pub async fn url(&self) -> Option<String> {
        let driver = self.inner.driver.lock().await;
        driver
            .as_ref()
            .filter(|control| !control.task.is_finished())
            .map(|control| control.url.clone())
    }

    /// Returns the subscribed topics.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.inner.registry.topics()
    }

    /// Connects to `url` and waits until the socket is open.
    ///
    /// Calling `connect` while a connection to the same URL is open returns
    /// immediately; while it is being established, the call waits for the same
    /// outcome as the attempt in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The retry budget is exhausted ([`ChannelError::RetriesExhausted`]).
    /// - The channel is closed before the socket opens.
    /// - A connection to a different URL is active.
    /// - The channel has been destroyed.
    pub async fn connect(&self, url: &str) -> ChannelResult<()> {
        let rx = {
            let mut driver = self.inner.driver.lock().await;
            self.inner.ensure_usable()?;

            let (tx, rx) = oneshot::channel();
            match driver.as_ref() {
                Some(control) if !control.task.is_finished() && !self.state().can_connect() => {
                    if control.url != url {
                        return Err(ChannelError::AlreadyConnected {
                            url: control.url.clone(),
                        });
                    }
                    if let Err(mpsc::error::SendError(DriverCommand::AwaitOpen(tx))) =
                        control.cmd_tx.send(DriverCommand::AwaitOpen(tx))
                    {
                        // Driver stopped between the state check and the send
                        *driver = Some(self.spawn_driver(url, tx));
                    }
                }
                _ => *driver = Some(self.spawn_driver(url, tx)),
            }
            rx
        };

        rx.await.unwrap_or(Err(ChannelError::Closed))
    }

    fn spawn_driver(&self, url: &str, waiter: oneshot::Sender<ChannelResult<()>>) -> DriverControl {
        tracing::debug!(url, "Connecting");
        tls::prepare_for(url);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.inner.commands.store(Some(Arc::new(cmd_tx.clone())));
        set_state(&self.inner.state, ConnectionState::Connecting);

        let driver = Driver {
            url: url.to_string(),
            config: self.inner.config.clone(),
            registry: self.inner.registry.clone(),
            state: Arc::clone(&self.inner.state),
            cmd_rx,
            waiters: vec![waiter],
        };

        DriverControl {
            url: url.to_string(),
            cmd_tx,
            task: tokio::spawn(driver.run()),
        }
    }

    /// Registers `callback` for every topic in `topics`.
    ///
    /// If any topic had no callbacks before, the topic set is re-announced to the
    /// server after the throttle window.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Destroyed`] if the channel has been destroyed.
    pub fn subscribe<S: AsRef<str>>(
        &self,
        topics: &[S],
        callback: EventCallback,
    ) -> ChannelResult<SubscriptionHandle> {
        self.inner.ensure_usable()?;

        let (id, added_topic) = self.inner.registry.subscribe(topics, callback);
        if added_topic {
            self.inner.request_announce();
        }

        Ok(SubscriptionHandle {
            channel: self.clone(),
            topics: topics.iter().map(|t| t.as_ref().to_string()).collect(),
            id,
        })
    }

    /// Removes `callback` from `topics`, or every callback if `None`.
    ///
    /// Topics left without callbacks are dropped from the next announcement.
    pub fn unsubscribe<S: AsRef<str>>(&self, topics: &[S], callback: Option<&EventCallback>) {
        let removed_topic = match callback {
            Some(callback) => self.inner.registry.unsubscribe_callback(topics, callback),
            None => self.inner.registry.unsubscribe(topics, None),
        };

        if removed_topic {
            self.inner.request_announce();
        }
    }

    fn unsubscribe_id(&self, topics: &[String], id: SubscriberId) {
        if self.inner.registry.unsubscribe(topics, Some(id)) {
            self.inner.request_announce();
        }
    }

    /// Closes the connection and cancels every pending timer.
    ///
    /// Subscriptions are kept, so a later `connect` restores them.
    pub async fn close(&self) {
        let mut driver = self.inner.driver.lock().await;
        self.shutdown(&mut driver).await;

        if !self.inner.destroyed.load(Ordering::SeqCst) {
            set_state(&self.inner.state, ConnectionState::Closed);
        }
    }

    /// Closes the connection and clears every subscription.
    ///
    /// The channel cannot be used afterwards.
    pub async fn destroy(&self) {
        let mut driver = self.inner.driver.lock().await;
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.shutdown(&mut driver).await;

        self.inner.registry.clear();
        set_state(&self.inner.state, ConnectionState::Destroyed);
        tracing::debug!("Destroyed");
    }

    async fn shutdown(&self, driver: &mut Option<DriverControl>) {
        self.inner.commands.store(None);

        let Some(control) = driver.take() else {
            return;
        };

        if control.task.is_finished() {
            return;
        }

        tracing::debug!(url = %control.url, "Closing");
        set_state(&self.inner.state, ConnectionState::Closing);

        if control.cmd_tx.send(DriverCommand::Close).is_err() {
            tracing::debug!("Driver already stopped");
        }

        let mut task = control.task;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(_) => tracing::debug!("Completed task 'driver'"),
            Err(_) => {
                tracing::error!("Timeout waiting for driver task to finish");
                task.abort();
            }
        }
    }
}

/// Handle returned by [`RealtimeChannel::subscribe`].
#[derive(Debug)]
pub struct SubscriptionHandle {
    channel: RealtimeChannel,
    topics: Vec<String>,
    id: SubscriberId,
}

impl SubscriptionHandle {
    /// Returns the subscriber id.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Returns the subscribed topics.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Removes this subscription's callback from its topics.
    pub fn unsubscribe(self) {
        self.channel.unsubscribe_id(&self.topics, self.id);
    }
}

fn set_state(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        tracing::trace!("State {current} -> {next}");
        *current = next;
        true
    });
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Application-level heartbeat timing.
///
/// One timer is armed at a time: the next ping, or the deadline for the reply to
/// the ping just sent.
#[derive(Debug)]
struct Heartbeat {
    interval: Duration,
    deadline: Instant,
    awaiting_reply: bool,
}

impl Heartbeat {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + interval,
            awaiting_reply: false,
        }
    }

    fn ping_sent(&mut self) {
        self.awaiting_reply = true;
        self.deadline = Instant::now() + self.interval;
    }

    fn reply_received(&mut self) {
        self.awaiting_reply = false;
        self.deadline = Instant::now() + self.interval;
    }
}

/// Why a session with an open socket ended.
#[derive(Debug)]
enum SessionExit {
    Closed,
    HeartbeatTimeout,
    Error(ChannelError),
}

struct Driver {
    url: String,
    config: ChannelConfig,
    registry: SubscriptionRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    cmd_rx: mpsc::UnboundedReceiver<DriverCommand>,
    waiters: Vec<oneshot::Sender<ChannelResult<()>>>,
}

impl Driver {
    async fn run(mut self) {
        tracing::debug!("Started task 'driver'");
        let mut retries: u32 = 0;

        loop {
            set_state(&self.state, ConnectionState::Connecting);

            let attempt = tokio::time::timeout(
                self.config.connect_timeout(),
                connect_async(self.url.clone()),
            );

            let outcome = match self.until_closed(attempt).await {
                None => return self.finish_closed(),
                Some(Err(_)) => Err(ChannelError::Timeout(self.config.connect_timeout())),
                Some(Ok(Err(e))) => Err(ChannelError::from(e)),
                Some(Ok(Ok((ws, _)))) => Ok(ws),
            };

            let error = match outcome {
                Ok(ws) => {
                    retries = 0;
                    tracing::debug!(url = %self.url, "Connected");
                    set_state(&self.state, ConnectionState::Open);
                    self.resolve_waiters(&Ok(()));

                    match self.session(ws).await {
                        SessionExit::Closed => return self.finish_closed(),
                        SessionExit::HeartbeatTimeout => {
                            // Liveness misses do not consume the error retry budget
                            tracing::warn!(url = %self.url, "Heartbeat timed out, reconnecting");
                            retries = 0;
                            set_state(&self.state, ConnectionState::Retrying);
                            continue;
                        }
                        SessionExit::Error(e) => e,
                    }
                }
                Err(e) => e,
            };

            set_state(&self.state, ConnectionState::Erroring);

            if retries >= self.config.max_retries {
                tracing::error!(
                    url = %self.url,
                    retries,
                    "Connection failed, retries exhausted: {error}"
                );
                return self.fail(&ChannelError::RetriesExhausted {
                    retries,
                    reason: error.to_string(),
                });
            }

            retries += 1;
            let delay = self.config.retry_delay();
            tracing::warn!(
                url = %self.url,
                "Connection error: {error}, retry {retries}/{} in {}s",
                self.config.max_retries,
                delay.as_secs_f64()
            );
            set_state(&self.state, ConnectionState::Retrying);

            if self.until_closed(sleep(delay)).await.is_none() {
                return self.finish_closed();
            }
        }
    }

    /// Awaits `fut` while servicing commands; returns `None` if a close was requested.
    async fn until_closed<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);

        loop {
            tokio::select! {
                output = &mut fut => return Some(output),
                cmd = self.cmd_rx.recv() => match cmd {
                    // The open transition always announces the current topics
                    Some(DriverCommand::Announce) => {}
                    Some(DriverCommand::AwaitOpen(tx)) => self.waiters.push(tx),
                    Some(DriverCommand::Close) | None => return None,
                },
            }
        }
    }

    async fn session(&mut self, mut ws: WsStream) -> SessionExit {
        let throttle_window = self.config.throttle_window();
        let mut heartbeat = Heartbeat::new(self.config.heartbeat_interval());
        let mut batch: BatchQueue<BatchEntry> = BatchQueue::new(self.config.batch_window());
        let mut announce_at = Some(Instant::now() + throttle_window);

        let exit = loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(DriverCommand::Announce) => {
                        if announce_at.is_none() {
                            announce_at = Some(Instant::now() + throttle_window);
                        }
                    }
                    Some(DriverCommand::AwaitOpen(tx)) => {
                        if tx.send(Ok(())).is_err() {
                            tracing::trace!("Connect waiter dropped");
                        }
                    }
                    Some(DriverCommand::Close) | None => {
                        if let Err(e) = ws.close(None).await {
                            tracing::debug!("Error closing socket: {e}");
                        }
                        break SessionExit::Closed;
                    }
                },
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!("Received message: {text}");
                        self.handle_text(text.as_str(), &mut heartbeat, &mut batch);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::trace!("Ignoring binary message ({} bytes)", data.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!("Received close message: {frame:?}");
                        break SessionExit::Error(ChannelError::ConnectionLost);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break SessionExit::Error(ChannelError::from(e)),
                    // Internally tungstenite considers the connection closed when polling
                    // for the next message in the stream returns None.
                    None => break SessionExit::Error(ChannelError::ConnectionLost),
                },
                () = wait_until(announce_at) => {
                    announce_at = None;
                    if let Err(e) = self.announce(&mut ws).await {
                        break SessionExit::Error(e);
                    }
                }
                () = wait_until(batch.deadline()) => self.flush(&mut batch),
                () = sleep_until(heartbeat.deadline) => {
                    if heartbeat.awaiting_reply {
                        if let Err(e) = ws.close(None).await {
                            tracing::debug!("Error closing socket: {e}");
                        }
                        break SessionExit::HeartbeatTimeout;
                    }
                    if let Err(e) = self.send_heartbeat(&mut ws).await {
                        break SessionExit::Error(e);
                    }
                    heartbeat.ping_sent();
                }
            }
        };

        let dropped = batch.clear();
        if dropped > 0 {
            tracing::debug!("Dropped {dropped} undelivered batched events");
        }

        exit
    }

    fn handle_text(&self, text: &str, heartbeat: &mut Heartbeat, batch: &mut BatchQueue<BatchEntry>) {
        let event = match InboundEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping malformed message: {e}");
                return;
            }
        };

        match event {
            InboundEvent::Exchange { keys, payload } => {
                let topics = keys
                    .iter()
                    .map(|key| encode_topic(EventType::Exchange.as_ref(), key))
                    .collect();
                if batch.push(BatchEntry::new(topics, payload)) {
                    tracing::trace!("Batch window armed");
                }
            }
            InboundEvent::Heartbeat(_) => heartbeat.reply_received(),
            InboundEvent::Other {
                event_type,
                payload,
            } => {
                self.registry
                    .publish(&event_type, &Delivery::Event(payload));
            }
        }
    }

    fn flush(&self, batch: &mut BatchQueue<BatchEntry>) {
        let entries = batch.take();
        let count = entries.len();

        for (topic, payloads) in invert_batch(entries) {
            self.registry.publish(&topic, &Delivery::Batch(payloads));
        }

        tracing::trace!("Flushed {count} batched events");
    }

    async fn announce(&self, ws: &mut WsStream) -> ChannelResult<()> {
        let topics = self.registry.topics();
        let keys = group_topics(topics.iter().map(String::as_str))
            .swap_remove(EventType::Exchange.as_ref())
            .unwrap_or_default();

        tracing::debug!("Announcing {} subscribed keys", keys.len());
        let text = messages::exchange_subscribe(&keys)?;
        ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn send_heartbeat(&self, ws: &mut WsStream) -> ChannelResult<()> {
        let text = messages::heartbeat_ping()?;
        tracing::trace!("Sending heartbeat");
        ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    fn resolve_waiters(&mut self, result: &ChannelResult<()>) {
        for waiter in self.waiters.drain(..) {
            if waiter.send(result.clone()).is_err() {
                tracing::trace!("Connect waiter dropped");
            }
        }
    }

    /// Stops accepting commands and rejects every waiter, including any still queued.
    fn fail(&mut self, error: &ChannelError) {
        set_state(&self.state, ConnectionState::Failed);

        self.cmd_rx.close();
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            if let DriverCommand::AwaitOpen(tx) = cmd {
                self.waiters.push(tx);
            }
        }

        self.resolve_waiters(&Err(error.clone()));
    }

    fn finish_closed(&mut self) {
        set_state(&self.state, ConnectionState::Closed);
        self.resolve_waiters(&Err(ChannelError::Closed));
        tracing::debug!("Completed task 'driver'");
    }
}
