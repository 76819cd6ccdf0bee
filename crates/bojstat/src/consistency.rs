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

//! Cross-page consistency detection under concurrent server refreshes.
//!
//! The server refreshes underlying data once per day inside a publish
//! window (default 08:50 JST). A pagination run that observes pages on both
//! sides of that boundary may interleave pre- and post-refresh data; the
//! guard detects the crossing and the resulting `last_update` conflicts.

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Serialize};

use crate::{common::enums::ConsistencyMode, error::ConsistencySignal};

/// Publish-window parameters.
#[derive(Clone, Copy, Debug)]
pub struct PublishWindow {
    /// Window start, JST time of day.
    pub start: NaiveTime,
    /// Band after the start during which side attribution is indeterminate.
    pub grace: chrono::Duration,
}

impl PublishWindow {
    /// Creates a new [`PublishWindow`] instance.
    #[must_use]
    pub fn new(start: NaiveTime, grace: std::time::Duration) -> Self {
        Self {
            start,
            grace: chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero()),
        }
    }

    /// The first window boundary strictly after `instant`.
    #[must_use]
    pub fn next_boundary_after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local = instant.with_timezone(&Tokyo);
        let date = if local.time() < self.start {
            local.date_naive()
        } else {
            local
                .date_naive()
                .checked_add_days(Days::new(1))
                .expect("date arithmetic")
        };
        Tokyo
            .from_local_datetime(&date.and_time(self.start))
            .single()
            .expect("unambiguous JST boundary")
            .with_timezone(&Utc)
    }
}

/// One page observation retained for crossing diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageObservation {
    pub page_index: usize,
    pub api_date: DateTime<Utc>,
}

/// Details attached to a `window_crossed` signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WindowCrossing {
    /// The boundary the run straddled.
    pub boundary: DateTime<Utc>,
    /// Pages observed before the boundary.
    pub before: Vec<PageObservation>,
    /// Pages observed after the boundary plus grace.
    pub after: Vec<PageObservation>,
}

/// Observes page timestamps during one call and reports window crossings.
#[derive(Debug)]
pub struct ConsistencyGuard {
    window: PublishWindow,
    mode: ConsistencyMode,
    observations: Vec<PageObservation>,
}

impl ConsistencyGuard {
    /// Creates a new [`ConsistencyGuard`] instance.
    #[must_use]
    pub fn new(window: PublishWindow, mode: ConsistencyMode) -> Self {
        Self {
            window,
            mode,
            observations: Vec::new(),
        }
    }

    /// The guard's consistency mode.
    #[must_use]
    pub const fn mode(&self) -> ConsistencyMode {
        self.mode
    }

    /// Records a page's parsed `DATE` header. Pages without a parseable
    /// date contribute nothing.
    pub fn observe_page(&mut self, page_index: usize, api_date: Option<DateTime<Utc>>) {
        if let Some(api_date) = api_date {
            self.observations.push(PageObservation {
                page_index,
                api_date,
            });
        }
    }

    /// Returns the crossing evidence if the run straddled a publish-window
    /// boundary.
    ///
    /// The boundary is anchored to the earliest observed page; a crossing
    /// requires at least one page before the boundary and one past the
    /// grace band. Pages inside the band join neither side.
    #[must_use]
    pub fn window_crossing(&self) -> Option<WindowCrossing> {
        let earliest = self
            .observations
            .iter()
            .map(|o| o.api_date)
            .min()?;
        let boundary = self.window.next_boundary_after(earliest);
        let after_band = boundary + self.window.grace;

        let before: Vec<PageObservation> = self
            .observations
            .iter()
            .filter(|o| o.api_date < boundary)
            .cloned()
            .collect();
        let after: Vec<PageObservation> = self
            .observations
            .iter()
            .filter(|o| o.api_date >= after_band)
            .cloned()
            .collect();

        if before.is_empty() || after.is_empty() {
            return None;
        }
        Some(WindowCrossing {
            boundary,
            before,
            after,
        })
    }

    /// Returns the signal and serialized details for result meta, if any.
    #[must_use]
    pub fn signal(&self) -> Option<(ConsistencySignal, String)> {
        let crossing = self.window_crossing()?;
        let details =
            serde_json::to_string(&crossing).unwrap_or_else(|_| "{}".to_string());
        Some((ConsistencySignal::WindowCrossed, details))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::*;
    use crate::common::parse::parse_api_date;

    fn window() -> PublishWindow {
        PublishWindow::new(
            NaiveTime::from_hms_opt(8, 50, 0).unwrap(),
            Duration::from_secs(600),
        )
    }

    fn jst(raw: &str) -> DateTime<Utc> {
        parse_api_date(raw).unwrap()
    }

    #[rstest]
    fn test_boundary_same_day_before_start() {
        let boundary = window().next_boundary_after(jst("2026-03-04T08:40:00"));
        assert_eq!(boundary, jst("2026-03-04T08:50:00"));
    }

    #[rstest]
    fn test_boundary_rolls_to_next_day() {
        let boundary = window().next_boundary_after(jst("2026-03-04T09:05:00"));
        assert_eq!(boundary, jst("2026-03-05T08:50:00"));
    }

    #[rstest]
    fn test_crossing_detected() {
        let mut guard = ConsistencyGuard::new(window(), ConsistencyMode::Strict);
        guard.observe_page(0, Some(jst("2026-03-04T08:40:00")));
        guard.observe_page(1, Some(jst("2026-03-04T09:05:00")));

        let crossing = guard.window_crossing().unwrap();
        assert_eq!(crossing.boundary, jst("2026-03-04T08:50:00"));
        assert_eq!(crossing.before.len(), 1);
        assert_eq!(crossing.after.len(), 1);
        assert_eq!(crossing.after[0].page_index, 1);
    }

    #[rstest]
    fn test_no_crossing_same_side() {
        let mut guard = ConsistencyGuard::new(window(), ConsistencyMode::Strict);
        guard.observe_page(0, Some(jst("2026-03-04T09:05:00")));
        guard.observe_page(1, Some(jst("2026-03-04T09:20:00")));
        assert!(guard.window_crossing().is_none());
    }

    #[rstest]
    fn test_grace_band_is_indeterminate() {
        let mut guard = ConsistencyGuard::new(window(), ConsistencyMode::Strict);
        guard.observe_page(0, Some(jst("2026-03-04T08:40:00")));
        guard.observe_page(1, Some(jst("2026-03-04T08:55:00")));
        assert!(guard.window_crossing().is_none());
    }

    #[rstest]
    fn test_multi_day_span_crosses() {
        let mut guard = ConsistencyGuard::new(window(), ConsistencyMode::BestEffort);
        guard.observe_page(0, Some(jst("2026-03-04T10:00:00")));
        guard.observe_page(1, Some(jst("2026-03-05T10:00:00")));
        assert!(guard.window_crossing().is_some());
    }

    #[rstest]
    fn test_missing_dates_contribute_nothing() {
        let mut guard = ConsistencyGuard::new(window(), ConsistencyMode::Strict);
        guard.observe_page(0, None);
        guard.observe_page(1, None);
        assert!(guard.window_crossing().is_none());
    }
}
