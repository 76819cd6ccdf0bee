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

//! Wire query construction using the official parameter names.
//!
//! `CODE` is a repeated parameter and `LAYER1`..`LAYER5` are flattened from
//! the layer path, so queries are built as ordered pairs rather than an
//! urlencoded struct.

use derive_builder::Builder;

use crate::common::enums::{BojFormat, BojLanguage};

/// Parameters for one page request against any of the three endpoints.
#[derive(Clone, Debug, Default, Builder)]
#[builder(default)]
#[builder(setter(into, strip_option))]
pub struct WireParams {
    /// Database identifier (`DB`).
    pub db: String,
    /// Series codes (`CODE`, repeated).
    pub codes: Vec<String>,
    /// Layer path (`LAYER1`..`LAYER5`).
    pub layer: Vec<String>,
    /// Frequency filter (`FREQUENCY`).
    pub frequency: Option<String>,
    /// Start period (`STARTDATE`).
    pub start: Option<String>,
    /// End period (`ENDDATE`).
    pub end: Option<String>,
    /// Pagination cursor (`STARTPOSITION`), omitted at position 1.
    pub start_position: Option<u64>,
    /// Response language (`LANG`).
    pub lang: Option<BojLanguage>,
    /// Response format (`FORMAT`).
    pub format: Option<BojFormat>,
    /// Extra parameters appended verbatim after the generated ones.
    pub raw: Vec<(String, String)>,
}

impl WireParams {
    /// Flattens the parameters into ordered query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(8 + self.codes.len() + self.raw.len());
        pairs.push(("DB".to_string(), self.db.clone()));
        for code in &self.codes {
            pairs.push(("CODE".to_string(), code.clone()));
        }
        for (i, element) in self.layer.iter().enumerate() {
            pairs.push((format!("LAYER{}", i + 1), element.clone()));
        }
        if let Some(frequency) = &self.frequency {
            pairs.push(("FREQUENCY".to_string(), frequency.clone()));
        }
        if let Some(start) = &self.start {
            pairs.push(("STARTDATE".to_string(), start.clone()));
        }
        if let Some(end) = &self.end {
            pairs.push(("ENDDATE".to_string(), end.clone()));
        }
        match self.start_position {
            Some(position) if position > 1 => {
                pairs.push(("STARTPOSITION".to_string(), position.to_string()));
            }
            _ => {}
        }
        if let Some(lang) = self.lang {
            pairs.push(("LANG".to_string(), lang.as_ref().to_string()));
        }
        if let Some(format) = self.format {
            pairs.push(("FORMAT".to_string(), format.as_ref().to_string()));
        }
        for (key, value) in &self.raw {
            pairs.push((key.clone(), value.clone()));
        }
        pairs
    }
}
