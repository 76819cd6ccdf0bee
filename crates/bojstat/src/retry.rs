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

//! Failure classification and wait-time computation for the transport.
//!
//! Classification is driven by the response *body* status where one is
//! available; the HTTP status only governs when the body cannot be parsed.
//! Attempt budgets are tracked per failure class so a throttling burst does
//! not consume the transport budget and vice versa.

use std::time::Duration;

use rand::{RngExt, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::{config::BojClientConfig, error::TransportKind};

/// Retry configuration knobs.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempt cap for retriable body statuses (500/503) and HTTP 429.
    pub max_attempts: u32,
    /// Attempt cap for retriable transport kinds.
    pub transport_max_attempts: u32,
    /// Whether HTTP 403 with `Retry-After` is retriable.
    pub on_403: bool,
    /// Attempt cap for the 403 path.
    pub on_403_max_attempts: u32,
    /// Initial backoff delay.
    pub base_delay: Duration,
    /// Backoff delay ceiling.
    pub cap_delay: Duration,
    /// Multiplier applied to the jittered sample.
    pub jitter_ratio: f64,
    /// Optional fixed RNG seed for deterministic waits.
    pub seed: Option<u64>,
}

impl From<&BojClientConfig> for RetryConfig {
    fn from(config: &BojClientConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            transport_max_attempts: config.transport_max_attempts,
            on_403: config.retry_on_403,
            on_403_max_attempts: config.retry_on_403_max_attempts,
            base_delay: config.retry_delay_base,
            cap_delay: config.retry_delay_cap,
            jitter_ratio: config.jitter_ratio,
            seed: config.backoff_seed,
        }
    }
}

/// One observed attempt failure, as seen by the classifier.
#[derive(Clone, Debug)]
pub enum Outcome {
    /// The request failed before a body was available.
    Transport(TransportKind),
    /// A parsed body reported a non-success status.
    BodyStatus { status: u16, message_id: String },
    /// The HTTP layer reported an error and the body was unparseable.
    HttpStatus {
        status: u16,
        retry_after: Option<Duration>,
    },
}

/// Which term of the wait formula won.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WaitSource {
    RetryAfter,
    LocalRate,
    Backoff,
}

/// A computed wait before the next attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitDecision {
    /// How long to sleep before retrying.
    pub delay: Duration,
    /// Which input dominated the wait.
    pub source: WaitSource,
    /// Zero-based retry attempt within the failure class.
    pub attempt: u32,
}

/// Decision for one observed failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the contained wait, then retry.
    Retry(WaitDecision),
    /// The failure class is not retriable.
    Fatal,
    /// The class was retriable but its attempt budget is spent.
    Exhausted,
}

/// Per-call retry state: classification rules plus per-class attempt
/// counters and the backoff RNG.
#[derive(Debug)]
pub struct RetryController {
    config: RetryConfig,
    rng: StdRng,
    body_attempts: u32,
    transport_attempts: u32,
    throttle_attempts: u32,
    forbidden_attempts: u32,
}

impl RetryController {
    /// Creates a new [`RetryController`] instance.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            config,
            rng,
            body_attempts: 0,
            transport_attempts: 0,
            throttle_attempts: 0,
            forbidden_attempts: 0,
        }
    }

    /// Classifies `outcome` and computes the wait before the next attempt.
    ///
    /// `local_remaining` is the rate limiter's current residual wait; it
    /// participates in the wait formula so a retry never undercuts the
    /// global request spacing.
    pub fn decide(&mut self, outcome: &Outcome, local_remaining: Duration) -> RetryDecision {
        match outcome {
            Outcome::Transport(kind) => {
                if !kind.is_retriable() {
                    return RetryDecision::Fatal;
                }
                if self.transport_attempts >= self.config.transport_max_attempts {
                    return RetryDecision::Exhausted;
                }
                let attempt = self.transport_attempts;
                self.transport_attempts += 1;
                RetryDecision::Retry(self.wait(attempt, None, local_remaining))
            }
            Outcome::BodyStatus { status, .. } => match status {
                500 | 503 => {
                    if self.body_attempts >= self.config.max_attempts {
                        return RetryDecision::Exhausted;
                    }
                    let attempt = self.body_attempts;
                    self.body_attempts += 1;
                    RetryDecision::Retry(self.wait(attempt, None, local_remaining))
                }
                _ => RetryDecision::Fatal,
            },
            Outcome::HttpStatus {
                status,
                retry_after,
            } => match status {
                429 => {
                    if self.throttle_attempts >= self.config.max_attempts {
                        return RetryDecision::Exhausted;
                    }
                    let attempt = self.throttle_attempts;
                    self.throttle_attempts += 1;
                    RetryDecision::Retry(self.wait(attempt, *retry_after, local_remaining))
                }
                403 => {
                    if !self.config.on_403 || retry_after.is_none() {
                        return RetryDecision::Fatal;
                    }
                    if self.forbidden_attempts >= self.config.on_403_max_attempts {
                        return RetryDecision::Exhausted;
                    }
                    let attempt = self.forbidden_attempts;
                    self.forbidden_attempts += 1;
                    RetryDecision::Retry(self.wait(attempt, *retry_after, local_remaining))
                }
                // Unparseable 503 follows the gateway header convention.
                503 => {
                    if self.body_attempts >= self.config.max_attempts {
                        return RetryDecision::Exhausted;
                    }
                    let attempt = self.body_attempts;
                    self.body_attempts += 1;
                    RetryDecision::Retry(self.wait(attempt, *retry_after, local_remaining))
                }
                _ => RetryDecision::Fatal,
            },
        }
    }

    /// `wait = max(retry_after_header, local_limiter_remaining, full_jitter_backoff)`.
    fn wait(
        &mut self,
        attempt: u32,
        retry_after: Option<Duration>,
        local_remaining: Duration,
    ) -> WaitDecision {
        let backoff = self.full_jitter_backoff(attempt);
        let header = retry_after.unwrap_or(Duration::ZERO);

        let (delay, source) = if header >= local_remaining && header >= backoff {
            (header, WaitSource::RetryAfter)
        } else if local_remaining >= backoff {
            (local_remaining, WaitSource::LocalRate)
        } else {
            (backoff, WaitSource::Backoff)
        };

        // A zero header should never be reported as the winning source.
        let source = if delay.is_zero() { WaitSource::Backoff } else { source };

        WaitDecision {
            delay,
            source,
            attempt,
        }
    }

    /// `uniform(0, min(cap, base * 2^attempt)) * jitter_ratio`.
    fn full_jitter_backoff(&mut self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_secs_f64() * 1_000.0;
        let cap_ms = self.config.cap_delay.as_secs_f64() * 1_000.0;
        let ceiling_ms = (base_ms * 2_f64.powi(attempt.min(32) as i32)).min(cap_ms);
        let sampled_ms: f64 = self.rng.random_range(0.0..=ceiling_ms);
        Duration::from_secs_f64((sampled_ms * self.config.jitter_ratio).max(0.0) / 1_000.0)
    }
}
