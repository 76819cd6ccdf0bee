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

//! Configuration types for the BOJ statistics client.

use std::{path::PathBuf, time::Duration};

use chrono::NaiveTime;

use crate::common::consts::BOJ_HTTP_URL;

/// Configuration for the BOJ statistics client.
#[derive(Clone, Debug)]
pub struct BojClientConfig {
    /// Optional override for the REST base URL.
    pub base_url: Option<String>,
    /// Optional proxy URL applied to all requests.
    pub proxy_url: Option<String>,
    /// When `true`, negotiate HTTP/2 with prior knowledge.
    pub http2: bool,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Minimum spacing between requests, expressed as requests per second.
    pub requests_per_second: f64,
    /// Maximum retry attempts for retriable body statuses (500/503) and
    /// HTTP 429 throttling.
    pub retry_max_attempts: u32,
    /// Maximum retry attempts for retriable transport failures.
    pub transport_max_attempts: u32,
    /// When `true`, HTTP 403 responses carrying `Retry-After` are retried.
    pub retry_on_403: bool,
    /// Attempt cap for the 403 retry path.
    pub retry_on_403_max_attempts: u32,
    /// Initial backoff delay.
    pub retry_delay_base: Duration,
    /// Backoff delay ceiling.
    pub retry_delay_cap: Duration,
    /// Multiplier applied to the jittered backoff sample.
    pub jitter_ratio: f64,
    /// Optional fixed seed for the backoff RNG (deterministic tests).
    pub backoff_seed: Option<u64>,
    /// Optional cache directory; `None` disables the cache entirely.
    pub cache_dir: Option<PathBuf>,
    /// Cache entry time-to-live.
    pub cache_ttl: Duration,
    /// Daily publish window start, JST.
    pub publish_window_start: NaiveTime,
    /// Grace period after the window start during which freshness is
    /// indeterminate.
    pub publish_window_grace: Duration,
}

impl Default for BojClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            proxy_url: None,
            http2: false,
            timeout_secs: Some(60),
            requests_per_second: 2.0,
            retry_max_attempts: 5,
            transport_max_attempts: 3,
            retry_on_403: false,
            retry_on_403_max_attempts: 2,
            retry_delay_base: Duration::from_millis(500),
            retry_delay_cap: Duration::from_secs(8),
            jitter_ratio: 1.0,
            backoff_seed: None,
            cache_dir: None,
            cache_ttl: Duration::from_secs(60 * 60 * 24),
            publish_window_start: NaiveTime::from_hms_opt(8, 50, 0)
                .expect("valid publish window start"),
            publish_window_grace: Duration::from_secs(10 * 60),
        }
    }
}

impl BojClientConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the REST base URL, considering overrides.
    #[must_use]
    pub fn http_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| BOJ_HTTP_URL.to_string())
    }

    /// Returns `true` if a cache directory is configured.
    #[must_use]
    pub fn has_cache(&self) -> bool {
        self.cache_dir.is_some()
    }
}
