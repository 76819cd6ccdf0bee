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

//! Pagination driver: orchestrates fingerprinting, cache interaction,
//! chunk planning, page-by-page emission, consistency enforcement and
//! finalization into result frames.
//!
//! One call is strictly sequential: pages are requested one at a time so
//! the cursor monotonicity rules stay observable. On a resumable
//! interruption the driver persists a `complete=false` cache entry whose
//! payload embeds a resume token, so a later call presenting that token
//! (or hitting the same cache key) may continue instead of restarting.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::{
    cache::{self, CacheGateway, CachePayload},
    common::{
        consts::SCHEMA_VERSION,
        enums::{BojEndpoint, CacheMode, ConsistencyMode},
    },
    consistency::{ConsistencyGuard, PublishWindow},
    dedup::Deduper,
    error::{BojApiError, ConsistencySignal},
    fingerprint::RequestFingerprint,
    http::{
        BojHttpClient,
        models::{MetadataFrame, MetadataRecord, Page, ParsedRow, ResultMeta, TimeSeriesFrame,
            TimeSeriesRecord},
        query::WireParams,
    },
    pager::{ChunkPlan, CodePager, LayerPager, PagerStep},
    request::DataRequest,
    token::ResumeToken,
};

/// Executes validated requests against the transport and cache.
#[derive(Debug)]
pub(crate) struct PaginationDriver<'a> {
    pub transport: &'a BojHttpClient,
    pub cache: Option<&'a CacheGateway>,
    pub window: PublishWindow,
}

/// Mutable state accumulated across one paginated run.
struct RunState {
    deduper: Deduper,
    guard: ConsistencyGuard,
    page_counter: usize,
    last_page: Option<Page>,
    chunk_index: usize,
    next_position: u64,
    chunks_completed: usize,
}

impl RunState {
    fn new(window: PublishWindow, mode: ConsistencyMode) -> Self {
        Self {
            deduper: Deduper::new(),
            guard: ConsistencyGuard::new(window, mode),
            page_counter: 0,
            last_page: None,
            chunk_index: 0,
            next_position: 1,
            chunks_completed: 0,
        }
    }
}

impl PaginationDriver<'_> {
    /// Runs a `getDataCode` or `getDataLayer` request to completion.
    pub async fn execute_data(
        &self,
        request: &DataRequest,
    ) -> Result<TimeSeriesFrame, BojApiError> {
        request.validate()?;

        let api_origin = self.transport.api_origin().to_string();
        let fingerprint = RequestFingerprint::of(request, &api_origin);
        let key = cache::derive_key(&fingerprint, request, &api_origin);

        let cached = match self.cache {
            Some(cache) => {
                cache
                    .get(&key, request.endpoint, request.cache_mode, true)
                    .await
            }
            None => None,
        };
        if let Some(envelope) = &cached {
            if envelope.complete {
                tracing::debug!("Cache hit for {key}");
                return Ok(TimeSeriesFrame {
                    records: envelope.payload.records.clone(),
                    meta: envelope.payload.meta.clone(),
                });
            }
        }

        let plan = ChunkPlan::build(&request.codes, request.strict_api, request.auto_split_codes)?;
        let plan_len = match request.endpoint {
            BojEndpoint::Code => plan.len(),
            _ => 1,
        };
        let code_order_map = request.code_order_map();

        let resume = self.resolve_resume(
            request,
            cached.as_ref().and_then(|e| e.payload.resume_token.as_deref()),
            &fingerprint,
            &api_origin,
            plan_len,
            &code_order_map,
        )?;

        let mut state = RunState::new(self.window, request.consistency_mode);
        if let Some(token) = &resume {
            state.chunk_index = token.chunk_index;
            state.next_position = token.next_position.max(1);
            // Continue accumulation from the partial entry's winners so the
            // resumed call returns the complete record set.
            if let Some(envelope) = &cached {
                for record in envelope.payload.records.iter().cloned() {
                    state.deduper.insert(record);
                }
            }
            tracing::debug!(
                chunk_index = token.chunk_index,
                next_position = token.next_position,
                "Resuming paginated run"
            );
        }

        let run = match request.endpoint {
            BojEndpoint::Code => {
                self.run_code(request, &plan, &code_order_map, &mut state).await
            }
            BojEndpoint::Layer => self.run_layer(request, &mut state).await,
            BojEndpoint::Metadata => {
                return Err(BojApiError::Validation {
                    validation_code: "ENDPOINT".to_string(),
                    message: "getMetadata is served by execute_metadata".to_string(),
                })
            }
        };

        if let Err(error) = run {
            self.store_partial(request, &fingerprint, &key, &api_origin, &code_order_map, &state, &error)
                .await;
            return Err(error);
        }

        self.finalize_data(request, &fingerprint, &key, &api_origin, &code_order_map, state)
            .await
    }

    /// Runs a `getMetadata` request: a single page, no pagination cursor.
    pub async fn execute_metadata(
        &self,
        request: &DataRequest,
    ) -> Result<MetadataFrame, BojApiError> {
        request.validate()?;

        let api_origin = self.transport.api_origin().to_string();
        let fingerprint = RequestFingerprint::of(request, &api_origin);
        let key = cache::derive_key(&fingerprint, request, &api_origin);

        if let Some(cache) = self.cache {
            if let Some(envelope) = cache
                .get(&key, BojEndpoint::Metadata, request.cache_mode, false)
                .await
            {
                tracing::debug!("Cache hit for {key}");
                return Ok(MetadataFrame {
                    records: envelope.payload.metadata_records.clone(),
                    meta: envelope.payload.meta.clone(),
                });
            }
        }

        let params = WireParams {
            db: request.db.clone(),
            codes: Vec::new(),
            layer: Vec::new(),
            frequency: request.frequency.clone(),
            start: None,
            end: None,
            start_position: None,
            lang: Some(request.lang),
            format: Some(request.format),
            raw: raw_pairs(request),
        };

        let page = self.transport.send(BojEndpoint::Metadata, &params).await?;
        let records: Vec<MetadataRecord> = page.rows.iter().map(metadata_record_from_row).collect();

        let mut meta = ResultMeta::from_page(&page, SCHEMA_VERSION, request.conflict_resolution);
        meta.request_url = Some(self.transport.endpoint_url(BojEndpoint::Metadata));

        if let Some(cache) = self.cache {
            if request.cache_mode != CacheMode::Off {
                let payload = CachePayload {
                    records: Vec::new(),
                    metadata_records: records.clone(),
                    meta: meta.clone(),
                    resume_token: None,
                };
                let envelope = cache::make_envelope(key, true, page.date_parsed, payload);
                if let Err(e) = cache.store(envelope).await {
                    tracing::warn!("Cache store failed: {e}");
                }
            }
        }

        Ok(MetadataFrame { records, meta })
    }

    async fn run_code(
        &self,
        request: &DataRequest,
        plan: &ChunkPlan,
        code_order_map: &BTreeMap<String, usize>,
        state: &mut RunState,
    ) -> Result<(), BojApiError> {
        let first_chunk = state.chunk_index;
        for chunk_index in first_chunk..plan.len() {
            let chunk = plan
                .get(chunk_index)
                .expect("chunk index within plan");
            let start = if chunk_index == first_chunk {
                state.next_position
            } else {
                1
            };
            let mut pager = CodePager::new(chunk_index, start);
            state.chunk_index = chunk_index;
            state.next_position = pager.start_position();

            loop {
                let params = WireParams {
                    db: request.db.clone(),
                    codes: chunk.to_vec(),
                    layer: Vec::new(),
                    frequency: request.frequency.clone(),
                    start: request.start.clone(),
                    end: request.end.clone(),
                    start_position: Some(pager.start_position()),
                    lang: Some(request.lang),
                    format: Some(request.format),
                    raw: raw_pairs(request),
                };
                let page = self.transport.send(BojEndpoint::Code, &params).await?;
                self.emit_page(state, &page, Some(code_order_map))?;

                let step = pager.advance(page.next_position)?;
                state.next_position = pager.start_position();
                state.last_page = Some(page);
                if step == PagerStep::Done {
                    break;
                }
            }

            // Natural completion of chunk i: the successor state points at
            // the next chunk's origin.
            state.chunks_completed = chunk_index + 1;
            state.chunk_index = chunk_index + 1;
            state.next_position = 1;
        }
        Ok(())
    }

    async fn run_layer(
        &self,
        request: &DataRequest,
        state: &mut RunState,
    ) -> Result<(), BojApiError> {
        let mut pager = LayerPager::new(state.next_position);
        state.chunk_index = 0;

        loop {
            let params = WireParams {
                db: request.db.clone(),
                codes: Vec::new(),
                layer: request.layer.clone(),
                frequency: request.frequency.clone(),
                start: request.start.clone(),
                end: request.end.clone(),
                start_position: Some(pager.start_position()),
                lang: Some(request.lang),
                format: Some(request.format),
                raw: raw_pairs(request),
            };
            let page = self.transport.send(BojEndpoint::Layer, &params).await?;
            pager.observe_rows(page.rows.len())?;
            self.emit_page(state, &page, None)?;

            let step = pager.advance(page.next_position)?;
            state.next_position = pager.start_position();
            state.last_page = Some(page);
            if step == PagerStep::Done {
                break;
            }
        }

        state.chunks_completed = 1;
        state.chunk_index = 1;
        state.next_position = 1;
        Ok(())
    }

    /// Emits one page's rows into the deduper and feeds the guard.
    ///
    /// In strict mode any conflict or window crossing fails immediately;
    /// best-effort lets resolution and meta reporting handle them at
    /// finalization.
    fn emit_page(
        &self,
        state: &mut RunState,
        page: &Page,
        code_order_map: Option<&BTreeMap<String, usize>>,
    ) -> Result<(), BojApiError> {
        let page_index = state.page_counter;
        let strict = state.guard.mode() == ConsistencyMode::Strict;

        for (row_index, row) in page.rows.iter().enumerate() {
            let record = record_from_row(row, code_order_map, page_index, row_index);
            if record.series_code.is_empty() {
                tracing::debug!(
                    page_index,
                    row_index,
                    "Skipping row without a series code"
                );
                continue;
            }
            let key = (record.series_code.clone(), record.survey_date.clone());
            let outcome = state.deduper.insert(record);
            if strict && outcome.is_conflict() {
                return Err(BojApiError::Consistency {
                    signal: ConsistencySignal::LastUpdateConflict,
                    details: format!(
                        "series_code={}, survey_date={}, page_index={page_index}, row_index={row_index}",
                        key.0, key.1
                    ),
                });
            }
        }

        state.guard.observe_page(page_index, page.date_parsed);
        if strict {
            if let Some(crossing) = state.guard.window_crossing() {
                let details = serde_json::to_string(&crossing)
                    .unwrap_or_else(|_| "{}".to_string());
                return Err(BojApiError::Consistency {
                    signal: ConsistencySignal::WindowCrossed,
                    details,
                });
            }
        }

        state.page_counter += 1;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn finalize_data(
        &self,
        request: &DataRequest,
        fingerprint: &RequestFingerprint,
        key: &str,
        api_origin: &str,
        code_order_map: &BTreeMap<String, usize>,
        state: RunState,
    ) -> Result<TimeSeriesFrame, BojApiError> {
        let token = ResumeToken::new(
            request.endpoint,
            api_origin.to_string(),
            fingerprint.as_str().to_string(),
            state.chunk_index,
            state.next_position,
            request.lang,
            request.format,
            code_order_map.clone(),
        );

        let mut meta = match &state.last_page {
            Some(page) => ResultMeta::from_page(page, SCHEMA_VERSION, request.conflict_resolution),
            None => empty_meta(request),
        };
        meta.next_position = None;
        meta.request_url = Some(self.transport.endpoint_url(request.endpoint));
        meta.resume_token = Some(token.encode());
        meta.conflicts_count = state.deduper.conflicts_count();
        meta.conflicts_sample = state.deduper.conflicts_sample().to_vec();

        if let Some((signal, details)) = state.guard.signal() {
            meta.consistency_signal = Some(signal);
            meta.consistency_details = Some(details);
        } else if state.deduper.conflicts_count() > 0 {
            meta.consistency_signal = Some(ConsistencySignal::LastUpdateConflict);
        }

        let api_date_observed = state.last_page.as_ref().and_then(|p| p.date_parsed);
        let records = state.deduper.finalize(request.output_order);

        if let Some(cache) = self.cache {
            if request.cache_mode != CacheMode::Off {
                let payload = CachePayload {
                    records: records.clone(),
                    metadata_records: Vec::new(),
                    meta: meta.clone(),
                    resume_token: meta.resume_token.clone(),
                };
                let envelope =
                    cache::make_envelope(key.to_string(), true, api_date_observed, payload);
                if let Err(e) = cache.store(envelope).await {
                    tracing::warn!("Cache store failed: {e}");
                }
            }
        }

        Ok(TimeSeriesFrame { records, meta })
    }

    /// Persists a `complete=false` entry with a resume token after a
    /// resumable interruption.
    ///
    /// A cancellation mid-chunk writes nothing; any other resumable failure
    /// (or a cancellation past a chunk boundary) stores the accumulated
    /// winners so a later call can continue.
    #[allow(clippy::too_many_arguments)]
    async fn store_partial(
        &self,
        request: &DataRequest,
        fingerprint: &RequestFingerprint,
        key: &str,
        api_origin: &str,
        code_order_map: &BTreeMap<String, usize>,
        state: &RunState,
        error: &BojApiError,
    ) {
        let Some(cache) = self.cache else { return };
        if request.cache_mode == CacheMode::Off {
            return;
        }
        if !error.is_resumable_interruption() {
            return;
        }
        let mid_chunk_cancel =
            matches!(error, BojApiError::Canceled(_)) && state.chunks_completed == 0;
        if mid_chunk_cancel {
            return;
        }

        let (chunk_index, next_position) = match error {
            // A cancellation resumes from the last crossed chunk boundary.
            BojApiError::Canceled(_) => (state.chunks_completed, 1),
            _ => (state.chunk_index, state.next_position),
        };

        let token = ResumeToken::new(
            request.endpoint,
            api_origin.to_string(),
            fingerprint.as_str().to_string(),
            chunk_index,
            next_position,
            request.lang,
            request.format,
            code_order_map.clone(),
        );

        let mut meta = match &state.last_page {
            Some(page) => ResultMeta::from_page(page, SCHEMA_VERSION, request.conflict_resolution),
            None => empty_meta(request),
        };
        meta.resume_token = Some(token.encode());
        meta.request_url = Some(self.transport.endpoint_url(request.endpoint));

        let payload = CachePayload {
            records: state.deduper.records_snapshot(),
            metadata_records: Vec::new(),
            meta,
            resume_token: Some(token.encode()),
        };
        let api_date_observed = state.last_page.as_ref().and_then(|p| p.date_parsed);
        let envelope = cache::make_envelope(key.to_string(), false, api_date_observed, payload);
        if let Err(e) = cache.store(envelope).await {
            tracing::warn!("Partial cache store failed: {e}");
        } else {
            tracing::debug!(
                chunk_index,
                next_position,
                "Stored partial result with resume token"
            );
        }
    }

    /// Resolves the effective resume token from the caller-supplied one
    /// and/or the one embedded in a matching incomplete cache entry.
    ///
    /// The caller's token is authoritative and must verify; an invalid
    /// cached token is discarded with a warning. When both are present and
    /// diverge by chunk index, the higher value wins.
    fn resolve_resume(
        &self,
        request: &DataRequest,
        cached_token: Option<&str>,
        fingerprint: &RequestFingerprint,
        api_origin: &str,
        plan_len: usize,
        code_order_map: &BTreeMap<String, usize>,
    ) -> Result<Option<ResumeToken>, BojApiError> {
        let caller = match &request.resume_token {
            Some(encoded) => {
                let token = ResumeToken::decode(encoded)?;
                token.verify(
                    fingerprint.as_str(),
                    request.endpoint,
                    api_origin,
                    plan_len,
                    code_order_map,
                )?;
                Some(token)
            }
            None => None,
        };

        let cached = cached_token.and_then(|encoded| {
            let token = ResumeToken::decode(encoded).ok()?;
            match token.verify(
                fingerprint.as_str(),
                request.endpoint,
                api_origin,
                plan_len,
                code_order_map,
            ) {
                Ok(()) => Some(token),
                Err(e) => {
                    tracing::warn!("Ignoring stale cached resume token: {e}");
                    None
                }
            }
        });

        Ok(match (caller, cached) {
            (Some(caller), Some(cached)) => {
                if cached.chunk_index > caller.chunk_index {
                    Some(cached)
                } else {
                    Some(caller)
                }
            }
            (Some(caller), None) => Some(caller),
            (None, Some(cached)) => Some(cached),
            (None, None) => None,
        })
    }
}

fn raw_pairs(request: &DataRequest) -> Vec<(String, String)> {
    request
        .raw_params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn empty_meta(request: &DataRequest) -> ResultMeta {
    ResultMeta {
        status: 200,
        message_id: String::new(),
        message: String::new(),
        date_raw: None,
        date_parsed: None,
        next_position: None,
        resume_token: None,
        request_url: None,
        schema_version: SCHEMA_VERSION.to_string(),
        consistency_signal: None,
        consistency_details: None,
        conflicts_count: 0,
        conflicts_sample: Vec::new(),
        conflict_resolution: request.conflict_resolution,
    }
}

/// Builds a [`TimeSeriesRecord`] from a normalized wire row.
fn record_from_row(
    row: &ParsedRow,
    code_order_map: Option<&BTreeMap<String, usize>>,
    source_page_index: usize,
    source_row_index: usize,
) -> TimeSeriesRecord {
    const KNOWN_KEYS: &[&str] = &[
        "series_code",
        "series_name",
        "unit",
        "frequency",
        "frequency_code",
        "week_anchor",
        "category",
        "last_update",
        "survey_date",
        "value",
    ];

    let field = |key: &str| -> Option<String> { row.get(key).and_then(Clone::clone) };

    let series_code = field("series_code").unwrap_or_default();
    let raw_value = field("value");
    let value: Option<Decimal> = raw_value.as_deref().and_then(|v| v.parse().ok());

    let mut extras = indexmap::IndexMap::new();
    if value.is_none() {
        if let Some(raw) = &raw_value {
            extras.insert("value_raw".to_string(), raw.clone());
        }
    }
    for (key, cell) in row {
        if KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(cell) = cell {
            extras.insert(key.clone(), cell.clone());
        }
    }

    TimeSeriesRecord {
        original_code_index: code_order_map.and_then(|map| map.get(&series_code).copied()),
        series_name: field("series_name"),
        unit: field("unit"),
        frequency: field("frequency"),
        frequency_code: field("frequency_code"),
        week_anchor: field("week_anchor"),
        category: field("category"),
        last_update: field("last_update"),
        survey_date: field("survey_date").unwrap_or_default(),
        value,
        series_code,
        source_page_index,
        source_row_index,
        extras,
    }
}

/// Builds a [`MetadataRecord`] from a normalized wire row. Hierarchy-header
/// rows (no series code) are preserved with an empty code.
fn metadata_record_from_row(row: &ParsedRow) -> MetadataRecord {
    const KNOWN_KEYS: &[&str] = &["series_code", "series_name", "category", "last_update"];

    let field = |key: &str| -> Option<String> { row.get(key).and_then(Clone::clone) };

    let mut extras = indexmap::IndexMap::new();
    for (key, cell) in row {
        if KNOWN_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(cell) = cell {
            extras.insert(key.clone(), cell.clone());
        }
    }

    MetadataRecord {
        series_code: field("series_code").unwrap_or_default(),
        series_name: field("series_name"),
        category: field("category"),
        last_update: field("last_update"),
        extras,
    }
}
