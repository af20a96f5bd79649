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

//! TLS setup for secure (`wss://`) channel URLs.
//!
//! `tokio-tungstenite` picks up the process-wide rustls provider. Plain `ws://`
//! connections never touch it, so the provider is only installed on first use of
//! a secure URL.

use std::sync::Once;

use rustls::crypto::{CryptoProvider, aws_lc_rs};

const SECURE_SCHEME: &str = "wss://";

static INSTALL_PROVIDER: Once = Once::new();

/// Returns true if `url` uses the secure WebSocket scheme.
#[must_use]
pub fn requires_tls(url: &str) -> bool {
    url.get(..SECURE_SCHEME.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(SECURE_SCHEME))
}

/// Prepares the process for connecting to `url`.
///
/// For secure URLs this installs `aws_lc_rs` as the default rustls provider,
/// unless the application already installed one.
pub fn prepare_for(url: &str) {
    if !requires_tls(url) {
        return;
    }

    INSTALL_PROVIDER.call_once(|| {
        if CryptoProvider::get_default().is_some() {
            tracing::debug!("Using application rustls provider");
            return;
        }

        if let Err(e) = aws_lc_rs::default_provider().install_default() {
            tracing::debug!("Rustls provider installed concurrently: {e:?}");
        } else {
            tracing::debug!("Installed aws_lc_rs rustls provider for {SECURE_SCHEME} URLs");
        }
    });
}
