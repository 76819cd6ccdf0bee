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

//! Property-based tests for the minimum-interval rate limiter.
//!
//! These tests verify the limiter's core contract regardless of the
//! specific rate or caller topology: N acquisitions take at least
//! `(N - 1) / r` of clock time, concurrency included, and the request
//! count inside any window never exceeds the permitted bound.

use std::{sync::Arc, time::Duration};

use bojstat::ratelimiter::IntervalLimiter;
use proptest::prelude::*;
use tokio::time::Instant;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("build paused runtime")
}

proptest! {
    /// Property: N sequential acquisitions take at least `(N - 1) / r`.
    #[test]
    fn sequential_spacing_lower_bound(
        rate in 1u32..=100,
        acquisitions in 2usize..=40,
    ) {
        let runtime = paused_runtime();
        runtime.block_on(async move {
            let limiter = IntervalLimiter::new(f64::from(rate)).unwrap();
            let started = Instant::now();
            for _ in 0..acquisitions {
                limiter.acquire().await;
            }
            let elapsed = started.elapsed();
            let floor = limiter.interval() * (acquisitions as u32 - 1);
            assert!(
                elapsed >= floor,
                "{acquisitions} acquisitions at {rate}/s took {elapsed:?}, floor {floor:?}"
            );
        });
    }

    /// Property: K concurrent callers share one interval budget; the total
    /// request count observed in a window of T seconds stays within
    /// `ceil(T * r) + 1`.
    #[test]
    fn concurrent_callers_share_budget(
        rate in 1u32..=50,
        callers in 2usize..=8,
        per_caller in 1usize..=6,
    ) {
        let runtime = paused_runtime();
        runtime.block_on(async move {
            let limiter = Arc::new(IntervalLimiter::new(f64::from(rate)).unwrap());
            let started = Instant::now();

            let mut handles = Vec::new();
            for _ in 0..callers {
                let limiter = Arc::clone(&limiter);
                handles.push(tokio::spawn(async move {
                    for _ in 0..per_caller {
                        limiter.acquire().await;
                    }
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            let total = callers * per_caller;
            let elapsed_secs = started.elapsed().as_secs_f64();
            let permitted = (elapsed_secs * f64::from(rate)).ceil() as usize + 1;
            assert!(
                total <= permitted,
                "{total} requests in {elapsed_secs:.3}s exceeds bound {permitted}"
            );
        });
    }

    /// Property: the reported waited duration is the actual delay between
    /// the acquire call and its completion.
    #[test]
    fn waited_duration_is_faithful(rate in 1u32..=100) {
        let runtime = paused_runtime();
        runtime.block_on(async move {
            let limiter = IntervalLimiter::new(f64::from(rate)).unwrap();
            limiter.acquire().await;

            let started = Instant::now();
            let waited = limiter.acquire().await;
            let observed = started.elapsed();
            assert!(
                waited <= observed,
                "reported wait {waited:?} exceeds observed {observed:?}"
            );
            assert!(waited >= limiter.interval().saturating_sub(Duration::from_millis(1)));
        });
    }
}
