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

//! Client for the Bank of Japan [Time-Series Statistical Data](https://www.stat-search.boj.or.jp)
//! HTTP API.
//!
//! The `bojstat` crate brokers the three read-only endpoints —
//! `getDataCode`, `getDataLayer`, `getMetadata` — into uniform,
//! analysis-friendly record frames with strong correctness guarantees
//! under adversarial server behavior: pagination cursors that stall,
//! responses whose HTTP status disagrees with the in-body status, data
//! refreshes during long pagination windows, and mixed character
//! encodings.
//!
//! Key responsibilities handled internally:
//! - Rate-limited request execution with body-driven retry classification.
//! - Chunking of code lists and two pagination cursor disciplines.
//! - Cross-page consistency enforcement around the daily publish window.
//! - Resumable runs via versioned, fingerprinted continuation tokens.
//! - A content-addressed file cache distinguishing complete and partial
//!   entries.
//!
//! Two call styles share one core algorithm: [`client::BojDataClient`]
//! (async) and [`blocking::BojBlockingClient`] (owns its runtime).

#![warn(rustc::all)]
#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod blocking;
pub mod cache;
pub mod client;
pub mod common;
pub mod config;
pub mod consistency;
pub mod dedup;
pub(crate) mod driver;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod pager;
pub mod ratelimiter;
pub mod request;
pub mod retry;
pub mod token;

pub use crate::{
    blocking::BojBlockingClient,
    client::BojDataClient,
    config::BojClientConfig,
    error::BojApiError,
    http::models::{MetadataFrame, TimeSeriesFrame, TimeSeriesRecord},
    request::{DataRequest, DataRequestBuilder},
};
