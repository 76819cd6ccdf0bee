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

//! Canonical request fingerprinting.
//!
//! The fingerprint digests every parameter that semantically affects the
//! result set, so equal fingerprints imply interchangeable results. It keys
//! the cache and gates resume-token continuation.

use aws_lc_rs::digest;

use crate::{
    common::consts::{NORMALIZER_VERSION, PARSER_VERSION, SCHEMA_VERSION},
    request::DataRequest,
};

/// Hex-encoded SHA-256 digest over the canonical request encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Computes the fingerprint of `request` as issued against `api_origin`.
    #[must_use]
    pub fn of(request: &DataRequest, api_origin: &str) -> Self {
        let canonical = canonical_encoding(request, api_origin);
        let digest = digest::digest(&digest::SHA256, canonical.as_bytes());
        Self(hex::encode(digest.as_ref()))
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable `key=value` line encoding, sorted by key.
///
/// List-valued parameters keep their order inside the value so that code
/// order remains semantic while key order does not.
fn canonical_encoding(request: &DataRequest, api_origin: &str) -> String {
    let mut fields: Vec<(String, String)> = vec![
        ("api_origin".to_string(), api_origin.to_string()),
        ("endpoint".to_string(), request.endpoint.to_string()),
        ("db".to_string(), request.db.clone()),
        ("code".to_string(), request.codes.join("\u{1f}")),
        ("layer".to_string(), request.layer.join("\u{1f}")),
        (
            "frequency".to_string(),
            request.frequency.clone().unwrap_or_default(),
        ),
        ("start".to_string(), request.start.clone().unwrap_or_default()),
        ("end".to_string(), request.end.clone().unwrap_or_default()),
        ("strict_api".to_string(), request.strict_api.to_string()),
        (
            "auto_split_codes".to_string(),
            request.auto_split_codes.to_string(),
        ),
        (
            "consistency_mode".to_string(),
            request.consistency_mode.to_string(),
        ),
        (
            "conflict_resolution".to_string(),
            request.conflict_resolution.to_string(),
        ),
        ("output_order".to_string(), request.output_order.to_string()),
        ("lang".to_string(), request.lang.to_string()),
        ("format".to_string(), request.format.to_string()),
        ("parser_version".to_string(), PARSER_VERSION.to_string()),
        (
            "normalizer_version".to_string(),
            NORMALIZER_VERSION.to_string(),
        ),
        ("schema_version".to_string(), SCHEMA_VERSION.to_string()),
    ];

    for (key, value) in request.normalized_raw_params() {
        fields.push((format!("raw.{key}"), value));
    }

    fields.sort();

    let mut out = String::new();
    for (key, value) in fields {
        out.push_str(&key);
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::enums::BojEndpoint;

    const ORIGIN: &str = "www.stat-search.boj.or.jp/api/v1";

    fn request_with_codes(codes: Vec<&str>) -> DataRequest {
        DataRequest::builder()
            .endpoint(BojEndpoint::Code)
            .db("FM08")
            .codes(codes.into_iter().map(String::from).collect::<Vec<_>>())
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_fingerprint_is_stable() {
        let request = request_with_codes(vec!["FXERD01", "FXERD02"]);
        let a = RequestFingerprint::of(&request, ORIGIN);
        let b = RequestFingerprint::of(&request, ORIGIN);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[rstest]
    fn test_code_order_is_semantic() {
        let forward = request_with_codes(vec!["A", "B"]);
        let reversed = request_with_codes(vec!["B", "A"]);
        assert_ne!(
            RequestFingerprint::of(&forward, ORIGIN),
            RequestFingerprint::of(&reversed, ORIGIN)
        );
    }

    #[rstest]
    fn test_raw_param_order_and_whitespace_are_not_semantic() {
        let mut left = request_with_codes(vec!["A"]);
        left.allow_raw_override = true;
        left.raw_params.insert("x".to_string(), "1".to_string());
        left.raw_params.insert("y".to_string(), "2".to_string());

        let mut right = request_with_codes(vec!["A"]);
        right.allow_raw_override = true;
        right.raw_params.insert(" y ".to_string(), " 2 ".to_string());
        right.raw_params.insert("x ".to_string(), "1".to_string());

        assert_eq!(
            RequestFingerprint::of(&left, ORIGIN),
            RequestFingerprint::of(&right, ORIGIN)
        );
    }

    #[rstest]
    fn test_origin_is_semantic() {
        let request = request_with_codes(vec!["A"]);
        assert_ne!(
            RequestFingerprint::of(&request, ORIGIN),
            RequestFingerprint::of(&request, "other.host/api/v1")
        );
    }

    #[rstest]
    fn test_mode_flags_are_semantic() {
        let base = request_with_codes(vec!["A"]);
        let mut strict = base.clone();
        strict.strict_api = true;
        assert_ne!(
            RequestFingerprint::of(&base, ORIGIN),
            RequestFingerprint::of(&strict, ORIGIN)
        );
    }
}
