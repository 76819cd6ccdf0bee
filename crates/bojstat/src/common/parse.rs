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

//! Shared parsing helpers for server timestamps and code-string inference.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;

use crate::{common::enums::BojFrequency, error::BojApiError};

/// Parses the `DATE` header carried in BOJ response bodies.
///
/// Accepts RFC 3339 as well as the naive layouts observed on the wire;
/// naive timestamps are interpreted as JST.
///
/// # Errors
///
/// Returns [`BojApiError::DateParse`] if no known layout matches.
pub fn parse_api_date(raw: &str) -> Result<DateTime<Utc>, BojApiError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y%m%d%H%M%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            if let Some(local) = Tokyo.from_local_datetime(&naive).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }

    Err(BojApiError::DateParse {
        raw: raw.to_string(),
    })
}

/// Returns `true` if `value` is an eight-digit `YYYYMMDD` date string.
#[must_use]
pub fn is_yyyymmdd(value: &str) -> bool {
    value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Guesses the observation frequency from a series code string.
///
/// The designator is the last alphabetic character of the trailing
/// alphanumeric segment, provided that segment ends in digits (the running
/// number). Codes without a recognizable designator are [`BojFrequency::Unknown`]
/// and are chunked separately under `auto_split_codes`.
#[must_use]
pub fn infer_frequency(code: &str) -> BojFrequency {
    let segment = code
        .rsplit(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or(code);

    if !segment.ends_with(|c: char| c.is_ascii_digit()) {
        return BojFrequency::Unknown;
    }

    let designator = segment
        .chars()
        .rev()
        .skip_while(char::is_ascii_digit)
        .find(|c| c.is_ascii_alphabetic());

    match designator {
        Some('D') => BojFrequency::Daily,
        Some('W') => BojFrequency::Weekly,
        Some('M') => BojFrequency::Monthly,
        Some('Q') => BojFrequency::Quarterly,
        Some('S') => BojFrequency::Semiannual,
        Some('A') | Some('Y') => BojFrequency::Annual,
        _ => BojFrequency::Unknown,
    }
}
