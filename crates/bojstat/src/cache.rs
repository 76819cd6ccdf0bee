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

//! Content-addressed file cache for completed and partial results.
//!
//! One file per key under the configured directory, filename = hex hash of
//! the key. Writes go through a temporary file in the same directory,
//! `fsync`, then atomic rename; concurrent writers of one key serialize on
//! a per-key lock. Entries that fail checksum or envelope validation are
//! quarantined to a sibling name and reported as misses so processing
//! continues.

use std::{path::PathBuf, sync::Arc};

use aws_lc_rs::digest;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::{
    common::enums::{BojEndpoint, CacheMode},
    config::BojClientConfig,
    consistency::PublishWindow,
    error::BojApiError,
    fingerprint::RequestFingerprint,
    http::models::{MetadataRecord, ResultMeta, TimeSeriesRecord},
    request::DataRequest,
};

/// Envelope format version.
const CACHE_VERSION: u32 = 1;

/// Suffix appended to quarantined entries.
const QUARANTINE_SUFFIX: &str = ".quarantine";

/// Cached result payload: the record set plus its execution metadata and,
/// for partial entries, the continuation token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachePayload {
    pub records: Vec<TimeSeriesRecord>,
    pub metadata_records: Vec<MetadataRecord>,
    pub meta: ResultMeta,
    pub resume_token: Option<String>,
}

/// Self-described on-disk envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub version: u32,
    pub key: String,
    pub complete: bool,
    pub written_at: DateTime<Utc>,
    pub api_date_observed: Option<DateTime<Utc>>,
    /// Maximum `last_update` across the cached records.
    pub last_update_snapshot: Option<String>,
    /// Hex SHA-256 over the serialized payload.
    pub checksum: String,
    pub payload: CachePayload,
}

/// Derives the cache key for a request: fingerprint ⊕ execution mode flags
/// ⊕ engine versions.
///
/// The fingerprint already digests every semantic parameter; the key
/// re-states the execution-mode fields so that key derivation stays
/// self-contained and auditable.
#[must_use]
pub fn derive_key(fingerprint: &RequestFingerprint, request: &DataRequest, api_origin: &str) -> String {
    use crate::common::consts::{NORMALIZER_VERSION, PARSER_VERSION, SCHEMA_VERSION};

    let canonical = format!(
        "fp={fp}\napi_origin={api_origin}\nlang={lang}\nformat={format}\nparser_version={pv}\nnormalizer_version={nv}\nschema_version={sv}\nstrict_api={strict}\nauto_split_codes={auto}\nconsistency_mode={cons}\nconflict_resolution={conf}\noutput_order={order}\n",
        fp = fingerprint.as_str(),
        lang = request.lang,
        format = request.format,
        pv = PARSER_VERSION,
        nv = NORMALIZER_VERSION,
        sv = SCHEMA_VERSION,
        strict = request.strict_api,
        auto = request.auto_split_codes,
        cons = request.consistency_mode,
        conf = request.conflict_resolution,
        order = request.output_order,
    );
    let digest = digest::digest(&digest::SHA256, canonical.as_bytes());
    hex::encode(digest.as_ref())
}

/// Gateway to the on-disk cache directory.
#[derive(Debug)]
pub struct CacheGateway {
    dir: PathBuf,
    ttl: chrono::Duration,
    window: PublishWindow,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl CacheGateway {
    /// Creates a gateway over the configured directory, creating it if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(config: &BojClientConfig) -> anyhow::Result<Option<Self>> {
        let Some(dir) = config.cache_dir.clone() else {
            return Ok(None);
        };
        std::fs::create_dir_all(&dir)?;
        Ok(Some(Self {
            dir,
            ttl: chrono::Duration::from_std(config.cache_ttl)
                .unwrap_or_else(|_| chrono::Duration::days(1)),
            window: PublishWindow::new(config.publish_window_start, config.publish_window_grace),
            locks: DashMap::new(),
        }))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Looks up `key`, applying mode, completeness and staleness rules.
    ///
    /// Any read or validation failure quarantines the entry and reports a
    /// miss; lookups never fail the call.
    pub async fn get(
        &self,
        key: &str,
        endpoint: BojEndpoint,
        mode: CacheMode,
        allow_incomplete: bool,
    ) -> Option<CacheEnvelope> {
        if mode == CacheMode::Off || mode == CacheMode::ForceRefresh {
            return None;
        }

        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {e}", path.display());
                return None;
            }
        };

        let envelope = match validate(&bytes, key) {
            Ok(envelope) => envelope,
            Err(reason) => {
                tracing::warn!("Quarantining corrupt cache entry {}: {reason}", path.display());
                self.quarantine(key).await;
                return None;
            }
        };

        if !envelope.complete && !allow_incomplete {
            return None;
        }
        if envelope.complete && self.is_stale(&envelope, endpoint, Utc::now()) {
            return None;
        }
        Some(envelope)
    }

    /// Staleness rule: TTL for everything, with the Metadata override that
    /// shifts the reference to the publish window — an entry observed
    /// before a boundary the clock has since crossed is stale regardless
    /// of TTL. Code/Layer never treat the `DATE` header as a freshness
    /// source.
    #[must_use]
    pub fn is_stale(
        &self,
        envelope: &CacheEnvelope,
        endpoint: BojEndpoint,
        now: DateTime<Utc>,
    ) -> bool {
        if now - envelope.written_at > self.ttl {
            return true;
        }
        if endpoint == BojEndpoint::Metadata {
            if let Some(observed) = envelope.api_date_observed {
                let boundary = self.window.next_boundary_after(observed) + self.window.grace;
                if now >= boundary {
                    return true;
                }
            }
        }
        false
    }

    /// Returns `true` when `snapshot` diverges from the entry's recorded
    /// `last_update` snapshot; used when fresh data is in hand to decide
    /// whether an overwrite changes anything.
    #[must_use]
    pub fn snapshot_diverges(envelope: &CacheEnvelope, snapshot: Option<&str>) -> bool {
        envelope.last_update_snapshot.as_deref() != snapshot
    }

    /// Atomically writes `envelope` under its key.
    ///
    /// # Errors
    ///
    /// Returns [`BojApiError::Cache`] if serialization or any file
    /// operation fails.
    pub async fn store(&self, mut envelope: CacheEnvelope) -> Result<(), BojApiError> {
        envelope.version = CACHE_VERSION;
        envelope.checksum = payload_checksum(&envelope.payload)?;

        let lock = self.key_lock(&envelope.key);
        let _guard = lock.lock().await;

        let path = self.entry_path(&envelope.key);
        let tmp_path = self.dir.join(format!(
            ".{}.tmp-{}",
            envelope.key,
            std::process::id()
        ));

        let bytes = serde_json::to_vec(&envelope).map_err(|e| BojApiError::Cache(e.to_string()))?;

        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| BojApiError::Cache(format!("create {}: {e}", tmp_path.display())))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| BojApiError::Cache(format!("write {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .await
            .map_err(|e| BojApiError::Cache(format!("fsync {}: {e}", tmp_path.display())))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| BojApiError::Cache(format!("rename to {}: {e}", path.display())))?;

        tracing::debug!(
            complete = envelope.complete,
            "Cache stored {}",
            path.display()
        );
        Ok(())
    }

    async fn quarantine(&self, key: &str) {
        let path = self.entry_path(key);
        let quarantined = self.dir.join(format!("{key}{QUARANTINE_SUFFIX}"));
        if let Err(e) = tokio::fs::rename(&path, &quarantined).await {
            tracing::warn!("Failed to quarantine {}: {e}", path.display());
        }
    }
}

/// Builds an envelope ready for [`CacheGateway::store`].
#[must_use]
pub fn make_envelope(
    key: String,
    complete: bool,
    api_date_observed: Option<DateTime<Utc>>,
    payload: CachePayload,
) -> CacheEnvelope {
    let last_update_snapshot = payload
        .records
        .iter()
        .filter_map(|r| r.last_update.clone())
        .max();
    CacheEnvelope {
        version: CACHE_VERSION,
        key,
        complete,
        written_at: Utc::now(),
        api_date_observed,
        last_update_snapshot,
        checksum: String::new(),
        payload,
    }
}

fn payload_checksum(payload: &CachePayload) -> Result<String, BojApiError> {
    let bytes = serde_json::to_vec(payload).map_err(|e| BojApiError::Cache(e.to_string()))?;
    let digest = digest::digest(&digest::SHA256, &bytes);
    Ok(hex::encode(digest.as_ref()))
}

fn validate(bytes: &[u8], expected_key: &str) -> Result<CacheEnvelope, String> {
    let envelope: CacheEnvelope =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid envelope: {e}"))?;
    if envelope.version != CACHE_VERSION {
        return Err(format!("unsupported version {}", envelope.version));
    }
    if envelope.key != expected_key {
        return Err("key mismatch".to_string());
    }
    let checksum = payload_checksum(&envelope.payload).map_err(|e| e.to_string())?;
    if checksum != envelope.checksum {
        return Err("checksum mismatch".to_string());
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::common::enums::{BojEndpoint, ConflictResolution};

    fn test_config(dir: &std::path::Path) -> BojClientConfig {
        BojClientConfig {
            cache_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    fn empty_payload() -> CachePayload {
        CachePayload {
            records: Vec::new(),
            metadata_records: Vec::new(),
            meta: ResultMeta {
                status: 200,
                message_id: "M181000I".to_string(),
                message: String::new(),
                date_raw: None,
                date_parsed: None,
                next_position: None,
                resume_token: None,
                request_url: None,
                schema_version: "1".to_string(),
                consistency_signal: None,
                consistency_details: None,
                conflicts_count: 0,
                conflicts_sample: Vec::new(),
                conflict_resolution: ConflictResolution::LatestLastUpdate,
            },
            resume_token: None,
        }
    }

    #[tokio::test]
    async fn test_store_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let envelope = make_envelope("a1b2".to_string(), true, None, empty_payload());
        cache.store(envelope.clone()).await.unwrap();

        let fetched = cache
            .get("a1b2", BojEndpoint::Code, CacheMode::IfStale, false)
            .await
            .unwrap();
        assert!(fetched.complete);
        assert_eq!(fetched.payload, envelope.payload);
    }

    #[tokio::test]
    async fn test_incomplete_entry_is_a_miss_without_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let envelope = make_envelope("k".to_string(), false, None, empty_payload());
        cache.store(envelope).await.unwrap();

        assert!(cache
            .get("k", BojEndpoint::Code, CacheMode::IfStale, false)
            .await
            .is_none());
        assert!(cache
            .get("k", BojEndpoint::Code, CacheMode::IfStale, true)
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_force_refresh_forces_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let envelope = make_envelope("k".to_string(), true, None, empty_payload());
        cache.store(envelope).await.unwrap();

        assert!(cache
            .get("k", BojEndpoint::Code, CacheMode::ForceRefresh, false)
            .await
            .is_none());
        assert!(cache
            .get("k", BojEndpoint::Code, CacheMode::Off, false)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let envelope = make_envelope("k".to_string(), true, None, empty_payload());
        cache.store(envelope).await.unwrap();

        // Flip payload bytes without updating the checksum.
        let path = dir.path().join("k");
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("M181000I", "M181999I")).unwrap();

        assert!(cache
            .get("k", BojEndpoint::Code, CacheMode::IfStale, false)
            .await
            .is_none());
        assert!(dir.path().join(format!("k{QUARANTINE_SUFFIX}")).exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_ttl_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let mut envelope = make_envelope("k".to_string(), true, None, empty_payload());
        envelope.written_at = Utc::now() - chrono::Duration::days(2);
        assert!(cache.is_stale(&envelope, BojEndpoint::Code, Utc::now()));

        envelope.written_at = Utc::now();
        assert!(!cache.is_stale(&envelope, BojEndpoint::Code, Utc::now()));
    }

    #[tokio::test]
    async fn test_metadata_publish_window_staleness() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheGateway::new(&test_config(dir.path())).unwrap().unwrap();

        let observed = crate::common::parse::parse_api_date("2026-03-04T08:00:00").unwrap();
        let mut envelope = make_envelope("k".to_string(), true, Some(observed), empty_payload());
        envelope.written_at = crate::common::parse::parse_api_date("2026-03-04T08:00:00").unwrap();

        // Same morning, before the window: fresh.
        let before = crate::common::parse::parse_api_date("2026-03-04T08:30:00").unwrap();
        assert!(!cache.is_stale(&envelope, BojEndpoint::Metadata, before));

        // Past the window plus grace: stale even inside the TTL.
        let after = crate::common::parse::parse_api_date("2026-03-04T09:30:00").unwrap();
        assert!(cache.is_stale(&envelope, BojEndpoint::Metadata, after));

        // A data endpoint ignores the DATE header entirely.
        assert!(!cache.is_stale(&envelope, BojEndpoint::Code, after));
    }

    #[rstest]
    fn test_snapshot_divergence() {
        let mut envelope = make_envelope("k".to_string(), true, None, empty_payload());
        envelope.last_update_snapshot = Some("20260301".to_string());
        assert!(!CacheGateway::snapshot_diverges(&envelope, Some("20260301")));
        assert!(CacheGateway::snapshot_diverges(&envelope, Some("20260302")));
        assert!(CacheGateway::snapshot_diverges(&envelope, None));
    }
}
