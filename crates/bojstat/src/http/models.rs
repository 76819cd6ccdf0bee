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

//! Response models and result frames.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    common::enums::ConflictResolution,
    dedup::ConflictSample,
    error::ConsistencySignal,
};

/// A row as decoded from the wire: normalized snake_case keys mapped to
/// optional string values (blank CSV fields are `None`).
pub type ParsedRow = IndexMap<String, Option<String>>;

/// One parsed response page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    /// In-body status code (authoritative over the HTTP status).
    pub status: u16,
    /// `M181xxx` message id.
    pub message_id: String,
    /// Human-readable server message.
    pub message: String,
    /// Raw `DATE` header value, if present.
    pub date_raw: Option<String>,
    /// Parsed `DATE` header, if parseable.
    pub date_parsed: Option<DateTime<Utc>>,
    /// Cursor for the next page; `None` or zero terminates pagination.
    pub next_position: Option<u64>,
    /// Decoded data rows.
    pub rows: Vec<ParsedRow>,
}

/// One observation of one series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Series code; empty only for metadata hierarchy-header rows.
    pub series_code: String,
    pub series_name: Option<String>,
    pub unit: Option<String>,
    pub frequency: Option<String>,
    pub frequency_code: Option<String>,
    /// Anchor weekday for weekly series.
    pub week_anchor: Option<String>,
    pub category: Option<String>,
    /// Server-side last update stamp, `YYYYMMDD`.
    pub last_update: Option<String>,
    /// Observation period string.
    pub survey_date: String,
    /// Observation value, exact decimal; `None` for blank fields.
    pub value: Option<Decimal>,
    /// Position of `series_code` in the original (pre-chunking) request
    /// code list; `None` for layer results.
    pub original_code_index: Option<usize>,
    /// Zero-based index of the page that emitted the row.
    pub source_page_index: usize,
    /// Zero-based index of the row within its page.
    pub source_row_index: usize,
    /// Wire columns with no dedicated field.
    pub extras: IndexMap<String, String>,
}

/// One series-catalog entry from `getMetadata`.
///
/// Hierarchy-header rows carry an empty `series_code`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub series_code: String,
    pub series_name: Option<String>,
    pub category: Option<String>,
    pub last_update: Option<String>,
    pub extras: IndexMap<String, String>,
}

/// Execution metadata attached to every result frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub status: u16,
    pub message_id: String,
    pub message: String,
    pub date_raw: Option<String>,
    pub date_parsed: Option<DateTime<Utc>>,
    pub next_position: Option<u64>,
    /// Continuation token for the completed (or interrupted) run.
    pub resume_token: Option<String>,
    pub request_url: Option<String>,
    pub schema_version: String,
    pub consistency_signal: Option<ConsistencySignal>,
    pub consistency_details: Option<String>,
    pub conflicts_count: u64,
    pub conflicts_sample: Vec<ConflictSample>,
    pub conflict_resolution: ConflictResolution,
}

impl ResultMeta {
    /// Meta skeleton carrying the final page's header fields.
    #[must_use]
    pub fn from_page(page: &Page, schema_version: &str, resolution: ConflictResolution) -> Self {
        Self {
            status: page.status,
            message_id: page.message_id.clone(),
            message: page.message.clone(),
            date_raw: page.date_raw.clone(),
            date_parsed: page.date_parsed,
            next_position: page.next_position,
            resume_token: None,
            request_url: None,
            schema_version: schema_version.to_string(),
            consistency_signal: None,
            consistency_details: None,
            conflicts_count: 0,
            conflicts_sample: Vec::new(),
            conflict_resolution: resolution,
        }
    }
}

/// Observations plus execution metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesFrame {
    pub records: Vec<TimeSeriesRecord>,
    pub meta: ResultMeta,
}

/// Catalog metadata plus execution metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataFrame {
    pub records: Vec<MetadataRecord>,
    pub meta: ResultMeta,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_record_serde_round_trip_preserves_decimal() {
        let record = TimeSeriesRecord {
            series_code: "FXERD01".to_string(),
            series_name: Some("USD/JPY spot".to_string()),
            unit: Some("yen".to_string()),
            frequency: Some("D".to_string()),
            frequency_code: Some("D".to_string()),
            week_anchor: None,
            category: None,
            last_update: Some("20260301".to_string()),
            survey_date: "20260228".to_string(),
            value: Some("151.2345678901".parse().unwrap()),
            original_code_index: Some(0),
            source_page_index: 0,
            source_row_index: 3,
            extras: IndexMap::new(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("151.2345678901"));

        let back: TimeSeriesRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
