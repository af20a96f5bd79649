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

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(version, about, author)]
pub struct BeaconCli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug)]
pub enum Commands {
    Tail(TailOpt),
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Subscribe to topics and print deliveries as JSON lines", long_about = None)]
pub struct TailOpt {
    /// WebSocket URL of the event server.
    #[arg(long, env = "BEACON_WS_URL")]
    pub url: String,
    /// Topic to subscribe to, e.g. `Exchange:order-1` (repeatable).
    #[arg(long = "topic", required = true)]
    pub topics: Vec<String>,
    /// Override for the Exchange batching window in milliseconds.
    #[arg(long)]
    pub batch_window_ms: Option<u64>,
    /// Override for the heartbeat interval in milliseconds.
    #[arg(long)]
    pub heartbeat_interval_ms: Option<u64>,
}
