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

//! Incremental deduplication and canonical ordering of emitted records.
//!
//! Dedup runs as pages arrive so memory holds only winners. The dedup key
//! is `(series_code, survey_date)`; rows sharing a key with differing
//! `last_update` are conflicts, resolved under `latest_last_update` with
//! ties broken by `(source_page_index, source_row_index)` ascending. A
//! bounded sample of discarded rows is retained for audit.

use indexmap::{IndexMap, map::Entry};
use serde::{Deserialize, Serialize};

use crate::{
    common::{consts::CONFLICT_SAMPLE_MAX, enums::OutputOrder},
    http::models::TimeSeriesRecord,
};

/// Identity of an observation within one result set.
pub type DedupKey = (String, String);

/// Result of offering one record to the deduper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First record under its key.
    Inserted,
    /// Same key and `last_update`; the earlier emission is kept.
    Duplicate,
    /// Conflict: the new record superseded the held one.
    ConflictReplaced,
    /// Conflict: the held record won and the new one was discarded.
    ConflictDiscarded,
}

impl InsertOutcome {
    /// Whether the insert observed a `last_update` conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictReplaced | Self::ConflictDiscarded)
    }
}

/// Audit entry for a discarded conflicting row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSample {
    pub series_code: String,
    pub survey_date: String,
    pub kept_last_update: Option<String>,
    pub discarded_last_update: Option<String>,
    pub discarded_page_index: usize,
    pub discarded_row_index: usize,
}

/// Winner-only accumulator for emitted records.
#[derive(Debug, Default)]
pub struct Deduper {
    winners: IndexMap<DedupKey, TimeSeriesRecord>,
    conflicts_count: u64,
    sample: Vec<ConflictSample>,
}

impl Deduper {
    /// Creates a new [`Deduper`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `last_update` conflicts observed so far.
    #[must_use]
    pub const fn conflicts_count(&self) -> u64 {
        self.conflicts_count
    }

    /// The bounded audit sample of discarded rows.
    #[must_use]
    pub fn conflicts_sample(&self) -> &[ConflictSample] {
        &self.sample
    }

    /// Number of winners currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.winners.len()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.winners.is_empty()
    }

    /// Clones the current winners in insertion order, for partial-result
    /// persistence.
    #[must_use]
    pub fn records_snapshot(&self) -> Vec<TimeSeriesRecord> {
        self.winners.values().cloned().collect()
    }

    /// Offers one record; the held set always reflects resolution winners.
    pub fn insert(&mut self, record: TimeSeriesRecord) -> InsertOutcome {
        let key = (record.series_code.clone(), record.survey_date.clone());
        match self.winners.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(record);
                InsertOutcome::Inserted
            }
            Entry::Occupied(mut entry) => {
                if entry.get().last_update == record.last_update {
                    // Identical update stamp: earliest emission wins the tie.
                    return InsertOutcome::Duplicate;
                }
                let (kept_last_update, discarded, outcome) =
                    if record.last_update > entry.get().last_update {
                        let kept = record.last_update.clone();
                        let discarded = entry.insert(record);
                        (kept, discarded, InsertOutcome::ConflictReplaced)
                    } else {
                        let kept = entry.get().last_update.clone();
                        (kept, record, InsertOutcome::ConflictDiscarded)
                    };
                self.conflicts_count += 1;
                if self.sample.len() < CONFLICT_SAMPLE_MAX {
                    self.sample.push(ConflictSample {
                        series_code: discarded.series_code,
                        survey_date: discarded.survey_date,
                        kept_last_update,
                        discarded_last_update: discarded.last_update,
                        discarded_page_index: discarded.source_page_index,
                        discarded_row_index: discarded.source_row_index,
                    });
                }
                outcome
            }
        }
    }

    /// Consumes the deduper, returning records in the requested order.
    ///
    /// Canonical order is `(original_code_index, series_code, survey_date,
    /// last_update)` ascending; emission order is the post-dedup insertion
    /// order.
    #[must_use]
    pub fn finalize(self, output_order: OutputOrder) -> Vec<TimeSeriesRecord> {
        let mut records: Vec<TimeSeriesRecord> = self.winners.into_values().collect();
        if output_order == OutputOrder::Canonical {
            records.sort_by(|a, b| canonical_key(a).cmp(&canonical_key(b)));
        }
        records
    }
}

fn canonical_key(r: &TimeSeriesRecord) -> (usize, &str, &str, &str) {
    (
        r.original_code_index.unwrap_or(0),
        r.series_code.as_str(),
        r.survey_date.as_str(),
        r.last_update.as_deref().unwrap_or(""),
    )
}
