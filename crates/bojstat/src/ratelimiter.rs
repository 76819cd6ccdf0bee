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

//! Minimum-interval request gate shared by every caller of the transport.

use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};

use crate::error::BojBuildError;

/// Enforces a minimum spacing of `1/r` between request starts across the
/// whole process.
///
/// The single internal timestamp is guarded by an async mutex; waiters are
/// served in FIFO order and each sleeps while holding the lock so that
/// spacing composes across concurrent callers. Driven by the tokio clock,
/// so tests under a paused runtime observe deterministic waits.
#[derive(Debug)]
pub struct IntervalLimiter {
    interval: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl IntervalLimiter {
    /// Creates a new [`IntervalLimiter`] allowing `requests_per_second`
    /// acquisitions per second.
    ///
    /// # Errors
    ///
    /// Returns an error if `requests_per_second` is not strictly positive.
    pub fn new(requests_per_second: f64) -> Result<Self, BojBuildError> {
        if !(requests_per_second > 0.0) || !requests_per_second.is_finite() {
            return Err(BojBuildError::InvalidRate {
                value: requests_per_second,
            });
        }
        Ok(Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last_release: Mutex::new(None),
        })
    }

    /// Returns the configured minimum inter-request interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Blocks until at least the configured interval has elapsed since the
    /// previous acquisition completed, then returns the duration actually
    /// waited.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_release.lock().await;
        let wait = match *last {
            Some(prev) => (prev + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        *last = Some(Instant::now());
        wait
    }

    /// Returns the wait a caller acquiring now would incur, without
    /// consuming the slot.
    pub async fn remaining(&self) -> Duration {
        let last = self.last_release.lock().await;
        match *last {
            Some(prev) => (prev + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_rejects_non_positive_rate() {
        assert!(IntervalLimiter::new(0.0).is_err());
        assert!(IntervalLimiter::new(-1.0).is_err());
        assert!(IntervalLimiter::new(f64::NAN).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_is_immediate() {
        let limiter = IntervalLimiter::new(10.0).unwrap();
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_between_acquires() {
        let limiter = IntervalLimiter::new(10.0).unwrap();
        limiter.acquire().await;
        let waited = limiter.acquire().await;
        assert_eq!(waited, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_does_not_consume() {
        let limiter = IntervalLimiter::new(10.0).unwrap();
        limiter.acquire().await;
        let first = limiter.remaining().await;
        let second = limiter.remaining().await;
        assert!(first > Duration::ZERO);
        assert!(second >= first.saturating_sub(Duration::from_millis(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_serialized() {
        let limiter = Arc::new(IntervalLimiter::new(10.0).unwrap());
        let started = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Four acquisitions at 10 rps need at least 300ms of spacing.
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
