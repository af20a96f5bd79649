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

use std::sync::Arc;

use beacon_realtime::{ChannelConfig, Delivery, EventCallback, RealtimeChannel};

use crate::opt::TailOpt;

/// Builds the channel config from the command line overrides.
pub(crate) fn channel_config(opt: &TailOpt) -> ChannelConfig {
    let mut config = ChannelConfig::default();
    if let Some(ms) = opt.batch_window_ms {
        config.batch_window_ms = ms;
    }
    if let Some(ms) = opt.heartbeat_interval_ms {
        config.heartbeat_interval_ms = ms;
    }
    config
}

/// Renders a delivery as a single JSON line.
pub(crate) fn render_delivery(topic: &str, delivery: &Delivery) -> String {
    let kind = match delivery {
        Delivery::Batch(_) => "batch",
        Delivery::Event(_) => "event",
    };

    serde_json::json!({
        "topic": topic,
        "kind": kind,
        "payloads": delivery.payloads(),
    })
    .to_string()
}

pub async fn run_tail_command(opt: TailOpt) -> anyhow::Result<()> {
    let channel = RealtimeChannel::new(channel_config(&opt));

    channel.connect(&opt.url).await?;
    tracing::info!("Connected to {}", opt.url);

    let printer: EventCallback = Arc::new(|topic: &str, delivery: &Delivery| {
        println!("{}", render_delivery(topic, delivery));
    });
    let _handle = channel.subscribe(&opt.topics, printer)?;
    tracing::info!("Subscribed to {} topics", opt.topics.len());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C, shutting down");

    channel.destroy().await;
    Ok(())
}
