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

//! Response body decoding and key normalization.
//!
//! JSON bodies are always UTF-8; CSV bodies are Shift-JIS for `LANG=JP`
//! and UTF-8 for `LANG=EN`. Error responses arrive as JSON regardless of
//! the requested format, so CSV parsing falls back to the JSON envelope
//! when the payload opens as an object. Blank CSV fields decode to `None`.

use serde_json::Value;

use crate::{
    common::{
        enums::{BojFormat, BojLanguage},
        parse::parse_api_date,
    },
    http::models::{Page, ParsedRow},
};

/// Internal parse failure; the transport maps it to a gateway error.
#[derive(Clone, Debug)]
pub struct BodyParseError(pub String);

impl std::fmt::Display for BodyParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Header keys recognized ahead of the column-header row in CSV bodies.
const CSV_HEADER_KEYS: &[&str] = &["STATUS", "MESSAGEID", "MESSAGE", "DATE", "NEXTPOSITION"];

/// Decodes a response body into a [`Page`].
///
/// # Errors
///
/// Returns [`BodyParseError`] when the payload is not a recognizable BOJ
/// envelope in either the requested format or the JSON error fallback.
pub fn parse_body(
    bytes: &[u8],
    lang: BojLanguage,
    format: BojFormat,
) -> Result<Page, BodyParseError> {
    match format {
        BojFormat::Json => parse_json(bytes),
        BojFormat::Csv => {
            let text = decode_text(bytes, lang);
            if text.trim_start().starts_with('{') {
                return parse_json(text.as_bytes());
            }
            parse_csv(&text)
        }
    }
}

/// Decodes raw bytes per the language's documented CSV encoding.
#[must_use]
pub fn decode_text(bytes: &[u8], lang: BojLanguage) -> String {
    match lang {
        BojLanguage::Jp => {
            let (decoded, _, _) = encoding_rs::SHIFT_JIS.decode(bytes);
            decoded.into_owned()
        }
        BojLanguage::En => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Normalizes an official wire key to its record field name.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

fn parse_json(bytes: &[u8]) -> Result<Page, BodyParseError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| BodyParseError(format!("invalid JSON envelope: {e}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| BodyParseError("JSON envelope is not an object".to_string()))?;

    let status = object
        .get("STATUS")
        .and_then(value_as_u64)
        .ok_or_else(|| BodyParseError("missing STATUS".to_string()))?;
    let message_id = object
        .get("MESSAGEID")
        .and_then(Value::as_str)
        .ok_or_else(|| BodyParseError("missing MESSAGEID".to_string()))?
        .to_string();
    let message = object
        .get("MESSAGE")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let date_raw = object
        .get("DATE")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let next_position = object.get("NEXTPOSITION").and_then(value_as_u64);

    let mut rows = Vec::new();
    if let Some(Value::Array(items)) = object.get("RESULTSET") {
        for item in items {
            let Some(fields) = item.as_object() else {
                return Err(BodyParseError("RESULTSET row is not an object".to_string()));
            };
            let mut row = ParsedRow::new();
            for (key, value) in fields {
                row.insert(normalize_key(key), value_as_opt_string(value));
            }
            rows.push(row);
        }
    }

    Ok(build_page(
        status as u16,
        message_id,
        message,
        date_raw,
        next_position,
        rows,
    ))
}

fn parse_csv(text: &str) -> Result<Page, BodyParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut status: Option<u64> = None;
    let mut message_id: Option<String> = None;
    let mut message = String::new();
    let mut date_raw: Option<String> = None;
    let mut next_position: Option<u64> = None;
    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| BodyParseError(format!("invalid CSV: {e}")))?;
        let first = record.get(0).unwrap_or_default().trim();
        if first.is_empty() && record.len() <= 1 {
            continue;
        }

        if let Some(columns) = &columns {
            let mut row = ParsedRow::new();
            for (i, column) in columns.iter().enumerate() {
                let cell = record.get(i).unwrap_or_default().trim();
                let value = if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                };
                row.insert(column.clone(), value);
            }
            rows.push(row);
        } else if first == "SERIES_CODE" {
            columns = Some(record.iter().map(normalize_key).collect());
        } else if CSV_HEADER_KEYS.contains(&first) {
            let value = record.get(1).unwrap_or_default().trim();
            match first {
                "STATUS" => status = value.parse().ok(),
                "MESSAGEID" => message_id = Some(value.to_string()),
                "MESSAGE" => message = value.to_string(),
                "DATE" => date_raw = Some(value.to_string()),
                "NEXTPOSITION" => next_position = value.parse().ok(),
                _ => {}
            }
        } else {
            return Err(BodyParseError(format!(
                "unexpected CSV record before column header: {first}"
            )));
        }
    }

    let status = status.ok_or_else(|| BodyParseError("missing STATUS".to_string()))?;
    let message_id = message_id.ok_or_else(|| BodyParseError("missing MESSAGEID".to_string()))?;

    Ok(build_page(
        status as u16,
        message_id,
        message,
        date_raw,
        next_position,
        rows,
    ))
}

fn build_page(
    status: u16,
    message_id: String,
    message: String,
    date_raw: Option<String>,
    next_position: Option<u64>,
    rows: Vec<ParsedRow>,
) -> Page {
    let date_parsed = date_raw.as_deref().and_then(|raw| parse_api_date(raw).ok());
    Page {
        status,
        message_id,
        message,
        date_raw,
        date_parsed,
        next_position,
        rows,
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_opt_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::testing::load_test_json;

    #[rstest]
    fn test_parse_json_page() {
        let body = load_test_json("get_data_code_page1.json");
        let page = parse_body(body.as_bytes(), BojLanguage::En, BojFormat::Json).unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.message_id, "M181000I");
        assert_eq!(page.next_position, Some(51));
        assert_eq!(page.rows.len(), 2);
        assert!(page.date_parsed.is_some());

        let row = &page.rows[0];
        assert_eq!(row["series_code"].as_deref(), Some("FXERD01"));
        assert_eq!(row["value"].as_deref(), Some("151.23"));
        assert_eq!(row["unit"], None);
    }

    #[rstest]
    fn test_parse_json_error_body() {
        let body = load_test_json("get_data_code_error_400.json");
        let page = parse_body(body.as_bytes(), BojLanguage::Jp, BojFormat::Json).unwrap();

        assert_eq!(page.status, 400);
        assert_eq!(page.message_id, "M181014E");
        assert!(page.rows.is_empty());
        assert_eq!(page.next_position, None);
    }

    #[rstest]
    fn test_parse_csv_page_utf8() {
        let body = load_test_json("get_data_code_page.csv");
        let page = parse_body(body.as_bytes(), BojLanguage::En, BojFormat::Csv).unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.message_id, "M181000I");
        assert_eq!(page.next_position, Some(3));
        assert_eq!(page.rows.len(), 2);

        // Blank CSV fields decode to None.
        assert_eq!(page.rows[1]["value"], None);
        assert_eq!(page.rows[0]["value"].as_deref(), Some("151.23"));
    }

    #[rstest]
    fn test_parse_csv_shift_jis() {
        let text = "STATUS,200\nMESSAGEID,M181000I\nMESSAGE,正常終了\nDATE,2026-03-04T09:00:00\nSERIES_CODE,SURVEY_DATE,VALUE,UNIT\nFXERD01,20260301,151.23,円\n";
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode(text);
        let page = parse_body(&encoded, BojLanguage::Jp, BojFormat::Csv).unwrap();

        assert_eq!(page.message, "正常終了");
        assert_eq!(page.rows[0]["unit"].as_deref(), Some("円"));
    }

    #[rstest]
    fn test_csv_error_response_falls_back_to_json() {
        let body = load_test_json("get_data_code_error_400.json");
        let page = parse_body(body.as_bytes(), BojLanguage::En, BojFormat::Csv).unwrap();
        assert_eq!(page.status, 400);
        assert_eq!(page.message_id, "M181014E");
    }

    #[rstest]
    fn test_unparseable_body_is_an_error() {
        let err = parse_body(b"<html>bad gateway</html>", BojLanguage::En, BojFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));

        let err =
            parse_body(b"<html>bad gateway</html>", BojLanguage::En, BojFormat::Csv).unwrap_err();
        assert!(err.to_string().contains("unexpected CSV record"));
    }

    #[rstest]
    fn test_next_position_empty_string_is_none() {
        let body = r#"{"STATUS":200,"MESSAGEID":"M181000I","MESSAGE":"ok","NEXTPOSITION":"","RESULTSET":[]}"#;
        let page = parse_body(body.as_bytes(), BojLanguage::En, BojFormat::Json).unwrap();
        assert_eq!(page.next_position, None);
    }
}
