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

//! Error structures and enumerations for the BOJ statistics client.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Message id substituted when a response body cannot be parsed at all.
pub const UNPARSEABLE_RESPONSE: &str = "UNPARSEABLE_RESPONSE";

/// Where an error originated.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorOrigin {
    ServerResponse,
    Transport,
    ClientValidation,
    Engine,
}

/// Classification of a transport-level failure.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    Connect,
    Read,
    RemoteProtocol,
    InvalidUrl,
    LocalProtocol,
    TlsTrust,
}

impl TransportKind {
    /// Whether the engine may retry after this kind of failure.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect | Self::Read | Self::RemoteProtocol
        )
    }
}

/// Machine-readable reason for rejecting a resume token.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResumeMismatchReason {
    FingerprintMismatch,
    ChunkIndexMismatch,
    TokenVersionMismatch,
    ParserVersionMismatch,
    NormalizerVersionMismatch,
}

/// Consistency signal observed during pagination.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, AsRefStr, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConsistencySignal {
    /// Pagination spanned the daily publish window.
    WindowCrossed,
    /// Two rows shared a dedup key but differed in `last_update`.
    LastUpdateConflict,
}

/// Build error for request construction and lexical validation.
#[derive(Debug, Clone, Error)]
pub enum BojBuildError {
    /// `strict_api` and `auto_split_codes` are mutually exclusive.
    #[error("Cannot enable both 'strict_api' and 'auto_split_codes'")]
    StrictAndAutoSplit,
    /// Missing required database identifier.
    #[error("Missing required database identifier")]
    MissingDb,
    /// The endpoint requires at least one series code.
    #[error("Missing required series codes for getDataCode")]
    MissingCodes,
    /// The endpoint requires a layer path.
    #[error("Missing required layer path for getDataLayer")]
    MissingLayer,
    /// Layer paths carry at most five elements.
    #[error("Layer path too deep: {len} elements (maximum 5)")]
    LayerTooDeep { len: usize },
    /// Raw parameters were supplied without `allow_raw_override`.
    #[error("Raw parameter override '{key}' requires 'allow_raw_override'")]
    RawOverrideNotAllowed { key: String },
    /// The engine owns the pagination cursor.
    #[error("Raw parameter '{key}' is reserved by the pagination engine")]
    ReservedParameter { key: String },
    /// Rate must be strictly positive.
    #[error("Invalid requests_per_second: must be > 0.0, was {value}")]
    InvalidRate { value: f64 },
}

/// A typed error enumeration for the BOJ statistics client.
///
/// Every variant carries the structured payload mandated for its kind;
/// retriable classes are recovered internally by the transport and only
/// surface once their attempt budget is exhausted.
#[derive(Debug, Clone, Error)]
pub enum BojApiError {
    /// Body status 400; never retried.
    #[error("BOJ bad request {message_id}: {message}")]
    BadRequest {
        status: u16,
        message_id: String,
        message: String,
        request_url: String,
        excerpt: String,
    },
    /// Body status 500; retried until exhaustion.
    #[error("BOJ server error {message_id}: {message}")]
    ServerError {
        status: u16,
        message_id: String,
        message: String,
        request_url: String,
        excerpt: String,
    },
    /// Body status 503; retried until exhaustion.
    #[error("BOJ service unavailable {message_id}: {message}")]
    Unavailable {
        status: u16,
        message_id: String,
        message: String,
        request_url: String,
        excerpt: String,
    },
    /// Response body could not be parsed as a BOJ envelope.
    #[error("Unparseable response (HTTP status {status:?}): {excerpt}")]
    Gateway {
        status: Option<u16>,
        message_id: String,
        request_url: String,
        excerpt: String,
    },
    /// Network-level failure.
    #[error("Transport error ({kind}) for {url}: {message}")]
    Transport {
        kind: TransportKind,
        url: String,
        message: String,
    },
    /// Client-side request validation failure.
    #[error("Validation error {validation_code}: {message}")]
    Validation {
        validation_code: String,
        message: String,
    },
    /// A server-supplied date string could not be parsed.
    #[error("Unparseable date: {raw}")]
    DateParse { raw: String },
    /// Strict-mode consistency violation.
    #[error("Consistency violation ({signal}): {details}")]
    Consistency {
        signal: ConsistencySignal,
        details: String,
    },
    /// The server cursor failed to advance.
    #[error(
        "Pagination stalled in chunk {chunk_index}: start={start}, next_position={next_position}"
    )]
    PaginationStalled {
        chunk_index: usize,
        start: u64,
        next_position: u64,
    },
    /// A layer stream exceeded the documented series ceiling; narrow the
    /// layer path and retry.
    #[error(
        "Layer stream covers {observed} series (ceiling {ceiling}); subdivide the layer path"
    )]
    LayerOverflow { observed: usize, ceiling: usize },
    /// The supplied resume token does not continue this request.
    #[error("Resume token mismatch: {reason}")]
    ResumeTokenMismatch { reason: ResumeMismatchReason },
    /// Request was canceled, typically via the cancellation token.
    #[error("Request canceled: {0}")]
    Canceled(String),
    /// Local cache I/O or serialization failure.
    #[error("Cache error: {0}")]
    Cache(String),
}

impl BojApiError {
    /// Returns the origin of the error.
    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::BadRequest { .. }
            | Self::ServerError { .. }
            | Self::Unavailable { .. }
            | Self::Gateway { .. } => ErrorOrigin::ServerResponse,
            Self::Transport { .. } => ErrorOrigin::Transport,
            Self::Validation { .. } | Self::DateParse { .. } => ErrorOrigin::ClientValidation,
            Self::Consistency { .. }
            | Self::PaginationStalled { .. }
            | Self::LayerOverflow { .. }
            | Self::ResumeTokenMismatch { .. }
            | Self::Canceled(_)
            | Self::Cache(_) => ErrorOrigin::Engine,
        }
    }

    /// Whether the driver may persist a partial result and resume token
    /// after this failure.
    ///
    /// Fatal request defects (validation, bad request, token mismatch) are
    /// excluded: resuming them would replay the same failure.
    #[must_use]
    pub const fn is_resumable_interruption(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. }
                | Self::Unavailable { .. }
                | Self::Gateway { .. }
                | Self::Transport { .. }
                | Self::PaginationStalled { .. }
                | Self::Canceled(_)
        )
    }
}

impl From<serde_json::Error> for BojApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::Cache(error.to_string())
    }
}

impl From<BojBuildError> for BojApiError {
    fn from(error: BojBuildError) -> Self {
        Self::Validation {
            validation_code: "REQUEST_BUILD".to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_error_display() {
        let error = BojApiError::BadRequest {
            status: 400,
            message_id: "M181014E".to_string(),
            message: "invalid parameter".to_string(),
            request_url: "https://example.test/getDataCode".to_string(),
            excerpt: String::new(),
        };
        assert_eq!(error.to_string(), "BOJ bad request M181014E: invalid parameter");

        let error = BojApiError::PaginationStalled {
            chunk_index: 0,
            start: 2,
            next_position: 2,
        };
        assert_eq!(
            error.to_string(),
            "Pagination stalled in chunk 0: start=2, next_position=2"
        );
    }

    #[rstest]
    #[case(TransportKind::Timeout, true)]
    #[case(TransportKind::Connect, true)]
    #[case(TransportKind::Read, true)]
    #[case(TransportKind::RemoteProtocol, true)]
    #[case(TransportKind::InvalidUrl, false)]
    #[case(TransportKind::LocalProtocol, false)]
    #[case(TransportKind::TlsTrust, false)]
    fn test_transport_retriability(#[case] kind: TransportKind, #[case] expected: bool) {
        assert_eq!(kind.is_retriable(), expected);
    }

    #[rstest]
    fn test_resume_reason_wire_form() {
        assert_eq!(
            ResumeMismatchReason::FingerprintMismatch.as_ref(),
            "fingerprint_mismatch"
        );
        assert_eq!(
            ResumeMismatchReason::TokenVersionMismatch.to_string(),
            "token_version_mismatch"
        );
    }

    #[rstest]
    fn test_origin_classification() {
        let err = BojApiError::Transport {
            kind: TransportKind::Timeout,
            url: "https://example.test".to_string(),
            message: "timed out".to_string(),
        };
        assert_eq!(err.origin(), ErrorOrigin::Transport);

        let err = BojApiError::Consistency {
            signal: ConsistencySignal::WindowCrossed,
            details: String::new(),
        };
        assert_eq!(err.origin(), ErrorOrigin::Engine);
    }
}
