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

//! Chunk planning and pagination cursor state machines.
//!
//! Both endpoints share the advance skeleton: only strict monotonic
//! increase of `next_position` counts as progress, anything else is a stall
//! and fails before a further request is issued. The cursors differ in what
//! the position indexes — the submitted code array for `getDataCode`, the
//! database's global series ordering for `getDataLayer`.

use crate::{
    common::{
        consts::{CODE_CHUNK_MAX, LAYER_SERIES_CEILING},
        parse::infer_frequency,
    },
    error::{BojApiError, BojBuildError},
};

/// Result of feeding a page's `next_position` into a cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagerStep {
    /// The cursor advanced; request the next page.
    Continue,
    /// The server reported no further pages.
    Done,
}

/// Ordered partition of the requested code list into per-call sub-lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    chunks: Vec<Vec<String>>,
}

impl ChunkPlan {
    /// Builds the plan for `codes` under the given mode flags.
    ///
    /// `strict_api` passes the original list through as a single chunk.
    /// `auto_split_codes` additionally groups maximal consecutive runs of
    /// equal inferred frequency, so concatenation always preserves input
    /// order while each chunk stays frequency-homogeneous.
    ///
    /// # Errors
    ///
    /// Returns [`BojBuildError::StrictAndAutoSplit`] for the contradictory
    /// flag combination.
    pub fn build(
        codes: &[String],
        strict_api: bool,
        auto_split_codes: bool,
    ) -> Result<Self, BojBuildError> {
        if strict_api && auto_split_codes {
            return Err(BojBuildError::StrictAndAutoSplit);
        }

        if strict_api {
            return Ok(Self {
                chunks: vec![codes.to_vec()],
            });
        }

        let runs: Vec<&[String]> = if auto_split_codes {
            split_frequency_runs(codes)
        } else if codes.is_empty() {
            Vec::new()
        } else {
            vec![codes]
        };

        let mut chunks = Vec::new();
        for run in runs {
            for chunk in run.chunks(CODE_CHUNK_MAX) {
                chunks.push(chunk.to_vec());
            }
        }

        Ok(Self { chunks })
    }

    /// Number of chunks in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the plan holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns the chunk at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[String]> {
        self.chunks.get(index).map(Vec::as_slice)
    }
}

/// Maximal consecutive runs of equal inferred frequency.
fn split_frequency_runs(codes: &[String]) -> Vec<&[String]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..codes.len() {
        if infer_frequency(&codes[i]) != infer_frequency(&codes[start]) {
            runs.push(&codes[start..i]);
            start = i;
        }
    }
    if start < codes.len() {
        runs.push(&codes[start..]);
    }
    runs
}

/// Per-chunk pagination cursor for `getDataCode`.
///
/// `start_position` is 1-based into the positions of the submitted code
/// array and strictly increases while the chunk is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodePager {
    chunk_index: usize,
    start_position: u64,
}

impl CodePager {
    /// Creates a cursor for `chunk_index`, optionally resuming mid-chunk.
    #[must_use]
    pub fn new(chunk_index: usize, start_position: u64) -> Self {
        Self {
            chunk_index,
            start_position: start_position.max(1),
        }
    }

    /// The chunk this cursor pages through.
    #[must_use]
    pub const fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    /// Position to submit as `STARTPOSITION` for the next request.
    #[must_use]
    pub const fn start_position(&self) -> u64 {
        self.start_position
    }

    /// Feeds the page's `next_position` into the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::PaginationStalled`] when the server fails to
    /// advance the cursor strictly.
    pub fn advance(&mut self, next_position: Option<u64>) -> Result<PagerStep, BojApiError> {
        match next_position {
            None | Some(0) => Ok(PagerStep::Done),
            Some(next) if next <= self.start_position => Err(BojApiError::PaginationStalled {
                chunk_index: self.chunk_index,
                start: self.start_position,
                next_position: next,
            }),
            Some(next) => {
                self.start_position = next;
                Ok(PagerStep::Continue)
            }
        }
    }
}

/// Single-stream pagination cursor for `getDataLayer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerPager {
    start_position: u64,
    series_seen: usize,
}

impl LayerPager {
    /// Creates a cursor, optionally resuming mid-stream.
    #[must_use]
    pub fn new(start_position: u64) -> Self {
        Self {
            start_position: start_position.max(1),
            series_seen: 0,
        }
    }

    /// Position to submit as `STARTPOSITION` for the next request.
    #[must_use]
    pub const fn start_position(&self) -> u64 {
        self.start_position
    }

    /// Accounts for a page's rows against the documented series ceiling.
    ///
    /// The pager never auto-continues past the ceiling: the accumulated
    /// rows are left untouched and the caller is asked to subdivide the
    /// layer path.
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::LayerOverflow`] once the stream exceeds the
    /// ceiling.
    pub fn observe_rows(&mut self, row_count: usize) -> Result<(), BojApiError> {
        self.series_seen += row_count;
        if self.series_seen > LAYER_SERIES_CEILING {
            return Err(BojApiError::LayerOverflow {
                observed: self.series_seen,
                ceiling: LAYER_SERIES_CEILING,
            });
        }
        Ok(())
    }

    /// Feeds the page's `next_position` into the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::PaginationStalled`] when the server fails to
    /// advance the cursor strictly.
    pub fn advance(&mut self, next_position: Option<u64>) -> Result<PagerStep, BojApiError> {
        match next_position {
            None | Some(0) => Ok(PagerStep::Done),
            Some(next) if next <= self.start_position => Err(BojApiError::PaginationStalled {
                chunk_index: 0,
                start: self.start_position,
                next_position: next,
            }),
            Some(next) => {
                self.start_position = next;
                Ok(PagerStep::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn codes(specs: &[&str]) -> Vec<String> {
        specs.iter().map(ToString::to_string).collect()
    }

    #[rstest]
    fn test_strict_plan_is_singleton() {
        let list: Vec<String> = (0..1_251).map(|i| format!("FXERD{i:04}")).collect();
        let plan = ChunkPlan::build(&list, true, false).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.get(0).unwrap().len(), 1_251);
    }

    #[rstest]
    fn test_default_plan_chunks_at_250() {
        let list: Vec<String> = (0..251).map(|i| format!("FXERD{i:04}")).collect();
        let plan = ChunkPlan::build(&list, false, false).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get(0).unwrap().len(), 250);
        assert_eq!(plan.get(1).unwrap().len(), 1);
    }

    #[rstest]
    fn test_auto_split_partitions_251_same_frequency() {
        let list: Vec<String> = (0..251).map(|i| format!("FXERD{i:04}")).collect();
        let plan = ChunkPlan::build(&list, false, true).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get(0).unwrap().len(), 250);
        assert_eq!(plan.get(1).unwrap().len(), 1);
    }

    #[rstest]
    fn test_auto_split_groups_frequency_runs() {
        let list = codes(&["AD01", "BD02", "CM01", "DM02", "ED03"]);
        let plan = ChunkPlan::build(&list, false, true).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.get(0).unwrap(), codes(&["AD01", "BD02"]).as_slice());
        assert_eq!(plan.get(1).unwrap(), codes(&["CM01", "DM02"]).as_slice());
        assert_eq!(plan.get(2).unwrap(), codes(&["ED03"]).as_slice());
    }

    #[rstest]
    fn test_auto_split_concatenation_preserves_order() {
        let list = codes(&["AD01", "XM01", "BD02", "YM02", "CQ01"]);
        let plan = ChunkPlan::build(&list, false, true).unwrap();
        let rejoined: Vec<String> = (0..plan.len())
            .flat_map(|i| plan.get(i).unwrap().to_vec())
            .collect();
        assert_eq!(rejoined, list);
    }

    #[rstest]
    fn test_strict_and_auto_split_is_an_error() {
        let err = ChunkPlan::build(&codes(&["AD01"]), true, true).unwrap_err();
        assert!(matches!(err, BojBuildError::StrictAndAutoSplit));
    }

    #[rstest]
    fn test_code_pager_advances_and_completes() {
        let mut pager = CodePager::new(0, 1);
        assert_eq!(pager.advance(Some(2)).unwrap(), PagerStep::Continue);
        assert_eq!(pager.start_position(), 2);
        assert_eq!(pager.advance(Some(51)).unwrap(), PagerStep::Continue);
        assert_eq!(pager.advance(None).unwrap(), PagerStep::Done);
    }

    #[rstest]
    fn test_code_pager_zero_is_done() {
        let mut pager = CodePager::new(0, 1);
        assert_eq!(pager.advance(Some(0)).unwrap(), PagerStep::Done);
    }

    #[rstest]
    #[case(2, 2)]
    #[case(2, 1)]
    fn test_code_pager_stall(#[case] start: u64, #[case] next: u64) {
        let mut pager = CodePager::new(0, 1);
        assert_eq!(pager.advance(Some(start)).unwrap(), PagerStep::Continue);
        let err = pager.advance(Some(next)).unwrap_err();
        match err {
            BojApiError::PaginationStalled {
                chunk_index,
                start: observed_start,
                next_position,
            } => {
                assert_eq!(chunk_index, 0);
                assert_eq!(observed_start, start);
                assert_eq!(next_position, next);
            }
            other => panic!("expected stall, got {other:?}"),
        }
    }

    #[rstest]
    fn test_layer_pager_overflow() {
        let mut pager = LayerPager::new(1);
        pager.observe_rows(1_000).unwrap();
        pager.observe_rows(250).unwrap();
        let err = pager.observe_rows(1).unwrap_err();
        assert!(matches!(
            err,
            BojApiError::LayerOverflow {
                observed: 1_251,
                ceiling: 1_250,
            }
        ));
    }

    #[rstest]
    fn test_layer_pager_monotonic_rule() {
        let mut pager = LayerPager::new(1);
        assert_eq!(pager.advance(Some(1_001)).unwrap(), PagerStep::Continue);
        assert!(pager.advance(Some(1_001)).is_err());
    }
}
