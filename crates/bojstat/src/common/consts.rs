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

//! Client constants including the base URL and documented wire limits.

pub const BOJ: &str = "BOJ";

pub const BOJ_HTTP_URL: &str = "https://www.stat-search.boj.or.jp/api/v1";

pub const BOJSTAT_USER_AGENT: &str = concat!("bojstat/", env!("CARGO_PKG_VERSION"));

/// Maximum number of series codes accepted by `getDataCode` in a single call.
pub const CODE_CHUNK_MAX: usize = 250;

/// Documented ceiling on the number of series a single `getDataLayer` stream
/// may cover before the server requires layer subdivision.
pub const LAYER_SERIES_CEILING: usize = 1_250;

/// Maximum depth of a layer path (`LAYER1`..`LAYER5`).
pub const LAYER_PATH_MAX: usize = 5;

/// Version of the response parser; participates in fingerprints, cache keys
/// and resume tokens so that stale artifacts from older parsers never leak
/// into newer runs.
pub const PARSER_VERSION: &str = "2";

/// Version of the row key-normalization scheme.
pub const NORMALIZER_VERSION: &str = "2";

/// Version of the record schema carried in result frames.
pub const SCHEMA_VERSION: &str = "1";

/// Version tag of the resume token envelope.
pub const RESUME_TOKEN_VERSION: u32 = 1;

/// Upper bound on the number of discarded rows retained as an audit sample
/// when `last_update` conflicts are resolved in best-effort mode.
pub const CONFLICT_SAMPLE_MAX: usize = 25;

/// Length cap for raw response excerpts embedded in error payloads.
pub const RESPONSE_EXCERPT_MAX: usize = 512;
