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

//! Catalog of `M181xxx` message ids returned in BOJ response bodies.
//!
//! The catalog is intentionally small: the server introduces new ids without
//! notice, so anything unrecognized is classified [`MessageClass::Unknown`]
//! and surfaced verbatim together with an observation key for later
//! cataloging.

use crate::common::enums::MessageSeverity;

/// Normal completion with no matching observations; not an error.
pub const MSG_NO_DATA: &str = "M181030I";

/// The submitted code list exceeds the documented per-call ceiling.
pub const MSG_CODE_CEILING: &str = "M181007E";

/// The layer stream covers more series than a single call may return.
pub const MSG_LAYER_OVERFLOW: &str = "M181031E";

/// Classification of a response body message id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageClass {
    /// Normal completion.
    Success,
    /// `M181030I`: empty result, not an error.
    NoData,
    /// Code-list ceiling exceeded; surfaced as a bad request.
    CodeCeiling,
    /// Layer stream exceeds the series ceiling; requires layer subdivision.
    LayerOverflow,
    /// Any id not present in the catalog.
    Unknown,
}

/// Classifies a message id against the known catalog.
#[must_use]
pub fn classify_message_id(message_id: &str) -> MessageClass {
    match message_id {
        MSG_NO_DATA => MessageClass::NoData,
        MSG_CODE_CEILING => MessageClass::CodeCeiling,
        MSG_LAYER_OVERFLOW => MessageClass::LayerOverflow,
        id if id.ends_with('I') && id.starts_with("M181") => MessageClass::Success,
        _ => MessageClass::Unknown,
    }
}

/// Parses the severity suffix (`E`/`I`/`W`) of a message id.
#[must_use]
pub fn severity(message_id: &str) -> MessageSeverity {
    match message_id.chars().last() {
        Some('E') => MessageSeverity::Error,
        Some('I') => MessageSeverity::Information,
        Some('W') => MessageSeverity::Warning,
        _ => MessageSeverity::Unknown,
    }
}

/// Returns the observation key under which an unknown id is surfaced.
#[must_use]
pub fn observation_key(message_id: &str) -> String {
    format!("MESSAGEID:{message_id}")
}
