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

//! Versioned resume-token codec.
//!
//! Tokens are URL-safe and self-describing: a base64 (no padding) encoding
//! of a JSON envelope whose `token_version` gates decodability. A token may
//! continue execution only against a request whose fingerprint and version
//! fields match exactly.

use std::collections::BTreeMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{
    common::{
        consts::{NORMALIZER_VERSION, PARSER_VERSION, RESUME_TOKEN_VERSION, SCHEMA_VERSION},
        enums::{BojEndpoint, BojFormat, BojLanguage},
    },
    error::{BojApiError, ResumeMismatchReason},
};

/// Continuation state for an interrupted paginated call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeToken {
    pub token_version: u32,
    pub api: BojEndpoint,
    pub api_origin: String,
    pub request_fingerprint: String,
    pub chunk_index: usize,
    pub next_position: u64,
    pub lang: BojLanguage,
    pub format: BojFormat,
    pub parser_version: String,
    pub normalizer_version: String,
    pub schema_version: String,
    pub code_order_map: BTreeMap<String, usize>,
}

impl ResumeToken {
    /// Creates a token for the current engine versions.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        api: BojEndpoint,
        api_origin: String,
        request_fingerprint: String,
        chunk_index: usize,
        next_position: u64,
        lang: BojLanguage,
        format: BojFormat,
        code_order_map: BTreeMap<String, usize>,
    ) -> Self {
        Self {
            token_version: RESUME_TOKEN_VERSION,
            api,
            api_origin,
            request_fingerprint,
            chunk_index,
            next_position,
            lang,
            format,
            parser_version: PARSER_VERSION.to_string(),
            normalizer_version: NORMALIZER_VERSION.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            code_order_map,
        }
    }

    /// Encodes the token into its URL-safe textual form.
    ///
    /// # Panics
    ///
    /// Panics if JSON serialization fails, which cannot happen for this
    /// struct's field types.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("resume token serialization");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::Validation`] when the text is not a token at
    /// all, and [`BojApiError::ResumeTokenMismatch`] with reason
    /// `token_version_mismatch` when the envelope version is unsupported.
    pub fn decode(encoded: &str) -> Result<Self, BojApiError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| BojApiError::Validation {
                validation_code: "RESUME_TOKEN_DECODE".to_string(),
                message: format!("invalid base64: {e}"),
            })?;
        let token: Self =
            serde_json::from_slice(&bytes).map_err(|e| BojApiError::Validation {
                validation_code: "RESUME_TOKEN_DECODE".to_string(),
                message: format!("invalid token envelope: {e}"),
            })?;
        if token.token_version != RESUME_TOKEN_VERSION {
            return Err(BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::TokenVersionMismatch,
            });
        }
        Ok(token)
    }

    /// Verifies the token against the current request context.
    ///
    /// Checks run in the specified order: token version, parser version,
    /// normalizer version, fingerprint, chunk-index plausibility, and
    /// api/api_origin (the latter report `fingerprint_mismatch` since both
    /// feed the fingerprint).
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::ResumeTokenMismatch`] carrying the first
    /// failing check's reason.
    pub fn verify(
        &self,
        expected_fingerprint: &str,
        api: BojEndpoint,
        api_origin: &str,
        plan_len: usize,
        code_order_map: &BTreeMap<String, usize>,
    ) -> Result<(), BojApiError> {
        if self.token_version != RESUME_TOKEN_VERSION {
            return Err(mismatch(ResumeMismatchReason::TokenVersionMismatch));
        }
        if self.parser_version != PARSER_VERSION {
            return Err(mismatch(ResumeMismatchReason::ParserVersionMismatch));
        }
        if self.normalizer_version != NORMALIZER_VERSION {
            return Err(mismatch(ResumeMismatchReason::NormalizerVersionMismatch));
        }
        if self.request_fingerprint != expected_fingerprint {
            return Err(mismatch(ResumeMismatchReason::FingerprintMismatch));
        }
        if self.chunk_index > plan_len {
            return Err(mismatch(ResumeMismatchReason::ChunkIndexMismatch));
        }
        if self.api != api || self.api_origin != api_origin {
            return Err(mismatch(ResumeMismatchReason::FingerprintMismatch));
        }
        if &self.code_order_map != code_order_map {
            return Err(mismatch(ResumeMismatchReason::FingerprintMismatch));
        }
        Ok(())
    }
}

const fn mismatch(reason: ResumeMismatchReason) -> BojApiError {
    BojApiError::ResumeTokenMismatch { reason }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample_token() -> ResumeToken {
        let mut map = BTreeMap::new();
        map.insert("FXERD01".to_string(), 0);
        map.insert("FXERD02".to_string(), 1);
        ResumeToken::new(
            BojEndpoint::Code,
            "www.stat-search.boj.or.jp/api/v1".to_string(),
            "ab".repeat(32),
            1,
            51,
            BojLanguage::Jp,
            BojFormat::Csv,
            map,
        )
    }

    #[rstest]
    fn test_encode_decode_round_trip() {
        let token = sample_token();
        let encoded = token.encode();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));

        let decoded = ResumeToken::decode(&encoded).unwrap();
        assert_eq!(decoded, token);
    }

    #[rstest]
    fn test_decode_rejects_garbage() {
        let err = ResumeToken::decode("not-base64!!!").unwrap_err();
        assert!(matches!(err, BojApiError::Validation { .. }));
    }

    #[rstest]
    fn test_decode_rejects_future_version() {
        let mut token = sample_token();
        token.token_version = RESUME_TOKEN_VERSION + 1;
        let encoded = token.encode();
        let err = ResumeToken::decode(&encoded).unwrap_err();
        assert!(matches!(
            err,
            BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::TokenVersionMismatch
            }
        ));
    }

    #[rstest]
    fn test_verify_happy_path() {
        let token = sample_token();
        let map = token.code_order_map.clone();
        token
            .verify(
                &token.request_fingerprint,
                BojEndpoint::Code,
                "www.stat-search.boj.or.jp/api/v1",
                3,
                &map,
            )
            .unwrap();
    }

    #[rstest]
    fn test_verify_fingerprint_mismatch() {
        let token = sample_token();
        let map = token.code_order_map.clone();
        let err = token
            .verify(
                "cd".repeat(32).as_str(),
                BojEndpoint::Code,
                "www.stat-search.boj.or.jp/api/v1",
                3,
                &map,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::FingerprintMismatch
            }
        ));
    }

    #[rstest]
    fn test_verify_chunk_index_plausibility() {
        let mut token = sample_token();
        token.chunk_index = 9;
        let map = token.code_order_map.clone();
        let err = token
            .verify(
                &token.request_fingerprint,
                BojEndpoint::Code,
                "www.stat-search.boj.or.jp/api/v1",
                3,
                &map,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::ChunkIndexMismatch
            }
        ));
    }

    #[rstest]
    fn test_verify_parser_version_mismatch() {
        let mut token = sample_token();
        token.parser_version = "0".to_string();
        let map = token.code_order_map.clone();
        let err = token
            .verify(
                &token.request_fingerprint,
                BojEndpoint::Code,
                "www.stat-search.boj.or.jp/api/v1",
                3,
                &map,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::ParserVersionMismatch
            }
        ));
    }

    #[rstest]
    fn test_verify_code_order_map_mismatch() {
        let token = sample_token();
        let mut map = token.code_order_map.clone();
        map.insert("OTHER".to_string(), 9);
        let err = token
            .verify(
                &token.request_fingerprint,
                BojEndpoint::Code,
                "www.stat-search.boj.or.jp/api/v1",
                3,
                &map,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BojApiError::ResumeTokenMismatch {
                reason: ResumeMismatchReason::FingerprintMismatch
            }
        ));
    }
}
