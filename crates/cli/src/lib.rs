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

#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]

pub mod opt;
mod tail;

use crate::{
    opt::{BeaconCli, Commands},
    tail::run_tail_command,
};

/// Runs the parsed command line.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn run(opt: BeaconCli) -> anyhow::Result<()> {
    match opt.command {
        Commands::Tail(tail_opt) => run_tail_command(tail_opt).await?,
    }
    Ok(())
}
