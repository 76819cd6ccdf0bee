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

//! Enumerations for the BOJ statistics client.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Identifies one of the three read-only BOJ statistics endpoints.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum BojEndpoint {
    /// `getDataCode`: observations for an explicit list of series codes.
    Code,
    /// `getDataLayer`: observations for all series below a layer path.
    Layer,
    /// `getMetadata`: series catalog metadata for a database.
    Metadata,
}

impl BojEndpoint {
    /// Returns the URL path segment for the endpoint.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Code => "getDataCode",
            Self::Layer => "getDataLayer",
            Self::Metadata => "getMetadata",
        }
    }
}

/// Response language, which also selects the CSV character encoding
/// (Shift-JIS for `JP`, UTF-8 for `EN`).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BojLanguage {
    /// Japanese.
    #[default]
    Jp,
    /// English.
    En,
}

/// Requested response format.
///
/// Error responses arrive as JSON regardless of the requested format.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BojFormat {
    /// Comma-separated values.
    #[default]
    Csv,
    /// JSON envelope.
    Json,
}

/// Observation frequency inferred from a series code string.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, Hash, AsRefStr, EnumIter, EnumString, Serialize,
    Deserialize,
)]
pub enum BojFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
    /// No frequency designator could be recognized in the code.
    Unknown,
}

/// Cache interaction mode for a call.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize,
    Deserialize,
)]
pub enum CacheMode {
    /// Never consult or write the cache.
    Off,
    /// Serve complete entries unless stale; write on completion.
    #[default]
    IfStale,
    /// Force a miss on lookup but still write the refreshed result.
    ForceRefresh,
}

/// Policy applied when pagination observes signals of a concurrent
/// server-side data refresh.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Raise a consistency error; no record set is returned.
    Strict,
    /// Record the signal into result meta and resolve conflicts.
    #[default]
    BestEffort,
}

/// Resolution rule for rows sharing a dedup key with differing `last_update`.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the row with the latest `last_update`; ties broken by
    /// `(source_page_index, source_row_index)` ascending.
    #[default]
    LatestLastUpdate,
}

/// Ordering of records in the final result.
#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Canonical `(original_code_index, series_code, survey_date, last_update)`.
    #[default]
    Canonical,
    /// Server emission order after deduplication.
    Emission,
}

/// Severity suffix of a `M181xxx` message id.
#[derive(
    Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize,
)]
pub enum MessageSeverity {
    /// Suffix `E`.
    Error,
    /// Suffix `I`.
    Information,
    /// Suffix `W`.
    Warning,
    /// Suffix missing or unrecognized.
    Unknown,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BojEndpoint::Code, "getDataCode")]
    #[case(BojEndpoint::Layer, "getDataLayer")]
    #[case(BojEndpoint::Metadata, "getMetadata")]
    fn test_endpoint_paths(#[case] endpoint: BojEndpoint, #[case] expected: &str) {
        assert_eq!(endpoint.path(), expected);
    }

    #[rstest]
    fn test_language_wire_values() {
        assert_eq!(BojLanguage::Jp.as_ref(), "JP");
        assert_eq!(BojLanguage::En.as_ref(), "EN");
    }

    #[rstest]
    fn test_format_wire_values() {
        assert_eq!(BojFormat::Csv.as_ref(), "CSV");
        assert_eq!(BojFormat::Json.as_ref(), "JSON");
    }
}
