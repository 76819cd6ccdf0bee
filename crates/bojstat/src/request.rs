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

//! Immutable request specification for the three BOJ endpoints.

use std::collections::BTreeMap;

use derive_builder::Builder;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    common::{
        consts::LAYER_PATH_MAX,
        enums::{
            BojEndpoint, BojFormat, BojLanguage, CacheMode, ConflictResolution, ConsistencyMode,
            OutputOrder,
        },
    },
    error::BojBuildError,
};

/// Wire parameters owned by the pagination engine; callers may not override
/// them through `raw_params`.
const RESERVED_PARAMS: &[&str] = &["STARTPOSITION"];

/// An immutable specification of one BOJ statistics call.
///
/// Construct via [`DataRequestBuilder`]; the request is frozen once built
/// and participates unchanged in fingerprints, cache keys and resume tokens.
#[derive(Clone, Debug, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into, strip_option))]
pub struct DataRequest {
    /// Which endpoint the call targets.
    pub endpoint: BojEndpoint,
    /// Database identifier (wire `DB`).
    pub db: String,
    /// Ordered series code list (wire `CODE`, repeated). Duplicates are
    /// passed through; order is preserved end to end.
    #[builder(default)]
    pub codes: Vec<String>,
    /// Layer path of 1–5 elements (wire `LAYER1`..`LAYER5`).
    #[builder(default)]
    pub layer: Vec<String>,
    /// Optional frequency filter (wire `FREQUENCY`), passed through verbatim.
    #[builder(default)]
    pub frequency: Option<String>,
    /// Optional start period string (wire `STARTDATE`).
    #[builder(default)]
    pub start: Option<String>,
    /// Optional end period string (wire `ENDDATE`).
    #[builder(default)]
    pub end: Option<String>,
    /// Response language.
    #[builder(default)]
    pub lang: BojLanguage,
    /// Requested response format.
    #[builder(default)]
    pub format: BojFormat,
    /// Submit the code list exactly as given in a single call sequence.
    #[builder(default)]
    pub strict_api: bool,
    /// Partition codes by inferred frequency before chunking.
    #[builder(default)]
    pub auto_split_codes: bool,
    /// Policy for update-window and `last_update` anomalies.
    #[builder(default)]
    pub consistency_mode: ConsistencyMode,
    /// Resolution rule for dedup-key conflicts in best-effort mode.
    #[builder(default)]
    pub conflict_resolution: ConflictResolution,
    /// Ordering of records in the final result.
    #[builder(default)]
    pub output_order: OutputOrder,
    /// Permit `raw_params` to supplement the generated query.
    #[builder(default)]
    pub allow_raw_override: bool,
    /// Extra wire parameters merged into the query when permitted.
    #[builder(default)]
    pub raw_params: IndexMap<String, String>,
    /// Cache interaction mode for this call.
    #[builder(default)]
    pub cache_mode: CacheMode,
    /// Optional encoded resume token continuing an earlier run.
    #[builder(default)]
    pub resume_token: Option<String>,
}

impl DataRequest {
    /// Returns a fresh builder.
    #[must_use]
    pub fn builder() -> DataRequestBuilder {
        DataRequestBuilder::default()
    }

    /// Lexically validates the specification.
    ///
    /// # Errors
    ///
    /// Returns a [`BojBuildError`] describing the first defect found.
    pub fn validate(&self) -> Result<(), BojBuildError> {
        if self.db.trim().is_empty() {
            return Err(BojBuildError::MissingDb);
        }
        if self.strict_api && self.auto_split_codes {
            return Err(BojBuildError::StrictAndAutoSplit);
        }
        match self.endpoint {
            BojEndpoint::Code => {
                if self.codes.is_empty() {
                    return Err(BojBuildError::MissingCodes);
                }
            }
            BojEndpoint::Layer => {
                if self.layer.is_empty() {
                    return Err(BojBuildError::MissingLayer);
                }
                if self.layer.len() > LAYER_PATH_MAX {
                    return Err(BojBuildError::LayerTooDeep {
                        len: self.layer.len(),
                    });
                }
            }
            BojEndpoint::Metadata => {}
        }
        for key in self.raw_params.keys() {
            let upper = key.to_ascii_uppercase();
            if RESERVED_PARAMS.contains(&upper.as_str()) {
                return Err(BojBuildError::ReservedParameter { key: key.clone() });
            }
            if !self.allow_raw_override {
                return Err(BojBuildError::RawOverrideNotAllowed { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Maps each series code to its first position in the original
    /// (pre-chunking) request list.
    #[must_use]
    pub fn code_order_map(&self) -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        for (index, code) in self.codes.iter().enumerate() {
            map.entry(code.clone()).or_insert(index);
        }
        map
    }

    /// Normalized raw parameters: keys and values trimmed, sorted by key.
    #[must_use]
    pub fn normalized_raw_params(&self) -> BTreeMap<String, String> {
        self.raw_params
            .iter()
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn code_request(codes: Vec<&str>) -> DataRequest {
        DataRequest::builder()
            .endpoint(BojEndpoint::Code)
            .db("FM08")
            .codes(codes.into_iter().map(String::from).collect::<Vec<_>>())
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_builder_defaults() {
        let request = code_request(vec!["FXERD01"]);
        assert_eq!(request.lang, BojLanguage::Jp);
        assert_eq!(request.format, BojFormat::Csv);
        assert!(!request.strict_api);
        assert!(!request.auto_split_codes);
        assert_eq!(request.consistency_mode, ConsistencyMode::BestEffort);
        assert!(request.validate().is_ok());
    }

    #[rstest]
    fn test_strict_and_auto_split_rejected() {
        let mut request = code_request(vec!["FXERD01"]);
        request.strict_api = true;
        request.auto_split_codes = true;
        assert!(matches!(
            request.validate(),
            Err(BojBuildError::StrictAndAutoSplit)
        ));
    }

    #[rstest]
    fn test_code_endpoint_requires_codes() {
        let request = DataRequest::builder()
            .endpoint(BojEndpoint::Code)
            .db("FM08")
            .build()
            .unwrap();
        assert!(matches!(request.validate(), Err(BojBuildError::MissingCodes)));
    }

    #[rstest]
    fn test_layer_depth_bounds() {
        let mut request = DataRequest::builder()
            .endpoint(BojEndpoint::Layer)
            .db("IR01")
            .build()
            .unwrap();
        assert!(matches!(request.validate(), Err(BojBuildError::MissingLayer)));

        request.layer = (0..6).map(|i| format!("L{i}")).collect();
        assert!(matches!(
            request.validate(),
            Err(BojBuildError::LayerTooDeep { len: 6 })
        ));

        request.layer.truncate(5);
        assert!(request.validate().is_ok());
    }

    #[rstest]
    fn test_raw_params_require_opt_in() {
        let mut request = code_request(vec!["FXERD01"]);
        request.raw_params.insert("EXTRA".to_string(), "1".to_string());
        assert!(matches!(
            request.validate(),
            Err(BojBuildError::RawOverrideNotAllowed { .. })
        ));

        request.allow_raw_override = true;
        assert!(request.validate().is_ok());
    }

    #[rstest]
    fn test_reserved_params_always_rejected() {
        let mut request = code_request(vec!["FXERD01"]);
        request.allow_raw_override = true;
        request
            .raw_params
            .insert("StartPosition".to_string(), "5".to_string());
        assert!(matches!(
            request.validate(),
            Err(BojBuildError::ReservedParameter { .. })
        ));
    }

    #[rstest]
    fn test_code_order_map_keeps_first_occurrence() {
        let request = code_request(vec!["A", "B", "A", "C"]);
        let map = request.code_order_map();
        assert_eq!(map["A"], 0);
        assert_eq!(map["B"], 1);
        assert_eq!(map["C"], 3);
    }

    #[rstest]
    fn test_normalized_raw_params_trims_and_sorts() {
        let mut request = code_request(vec!["FXERD01"]);
        request.allow_raw_override = true;
        request.raw_params.insert(" z ".to_string(), " 1 ".to_string());
        request.raw_params.insert("a".to_string(), "2".to_string());

        let normalized = request.normalized_raw_params();
        let keys: Vec<_> = normalized.keys().cloned().collect();
        assert_eq!(keys, vec!["a".to_string(), "z".to_string()]);
        assert_eq!(normalized["z"], "1");
    }
}
