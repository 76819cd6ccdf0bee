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

//! Provides the HTTP transport for the BOJ statistics API.
//!
//! The single primitive is [`BojHttpClient::send`]: rate-limit acquire,
//! issue the GET, decode per language/format, then classify. Classification
//! is body-over-HTTP: a parseable body's `STATUS` governs even when the
//! HTTP status disagrees; the HTTP status only decides when the body is
//! unparseable. Retriable failures loop under the retry controller's
//! per-class attempt budgets; exhaustion surfaces the last observed failure
//! unchanged.

use std::{sync::Arc, time::Duration};

use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    common::{
        consts::{BOJSTAT_USER_AGENT, LAYER_SERIES_CEILING, RESPONSE_EXCERPT_MAX},
        enums::BojEndpoint,
        messages::{self, MessageClass},
    },
    config::BojClientConfig,
    error::{BojApiError, TransportKind, UNPARSEABLE_RESPONSE},
    http::{models::Page, parse, query::WireParams},
    ratelimiter::IntervalLimiter,
    retry::{Outcome, RetryConfig, RetryController, RetryDecision},
};

/// Lower-level HTTP client for the BOJ statistics REST API.
///
/// Owns the connection pool, the process-wide rate limiter handle and the
/// retry configuration. One [`send`](Self::send) call issues exactly one
/// logical page request, transparently retrying retriable failures.
#[derive(Clone, Debug)]
pub struct BojHttpClient {
    base_url: String,
    api_origin: String,
    client: reqwest::Client,
    limiter: Arc<IntervalLimiter>,
    retry_config: RetryConfig,
    cancellation: CancellationToken,
}

impl BojHttpClient {
    /// Creates a new [`BojHttpClient`] from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the underlying HTTP
    /// client cannot be built.
    pub fn new(config: &BojClientConfig, cancellation: CancellationToken) -> anyhow::Result<Self> {
        let base_url = config.http_base_url().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url)?;
        let api_origin = format!(
            "{}{}",
            parsed.host_str().unwrap_or_default(),
            parsed.path().trim_end_matches('/')
        );

        let mut builder = reqwest::Client::builder().user_agent(BOJSTAT_USER_AGENT);
        if let Some(timeout_secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        if config.http2 {
            builder = builder.http2_prior_knowledge();
        }

        Ok(Self {
            base_url,
            api_origin,
            client: builder.build()?,
            limiter: Arc::new(IntervalLimiter::new(config.requests_per_second)?),
            retry_config: RetryConfig::from(config),
            cancellation,
        })
    }

    /// Host plus path of the configured base URL; identifies the API origin
    /// in fingerprints and resume tokens.
    #[must_use]
    pub fn api_origin(&self) -> &str {
        &self.api_origin
    }

    /// Full URL of the given endpoint, without query.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: BojEndpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }

    /// The shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> Arc<IntervalLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Issues one page request and returns the parsed [`Page`].
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] carrying the classification of the last
    /// observed failure once non-retriable or exhausted.
    pub async fn send(
        &self,
        endpoint: BojEndpoint,
        params: &WireParams,
    ) -> Result<Page, BojApiError> {
        let url = self.endpoint_url(endpoint);
        let pairs = params.to_pairs();
        let lang = params.lang.unwrap_or_default();
        let format = params.format.unwrap_or_default();
        let mut retry = RetryController::new(self.retry_config.clone());

        loop {
            let waited = tokio::select! {
                waited = self.limiter.acquire() => waited,
                () = self.cancellation.cancelled() => return Err(canceled()),
            };
            if !waited.is_zero() {
                tracing::trace!(
                    waited_ms = waited.as_millis() as u64,
                    "Rate limiter delayed request"
                );
            }

            let request = self
                .client
                .get(&url)
                .query(&pairs)
                .build()
                .map_err(|e| BojApiError::Transport {
                    kind: TransportKind::InvalidUrl,
                    url: url.clone(),
                    message: e.to_string(),
                })?;
            let request_url = request.url().to_string();
            tracing::debug!("Requesting: {request_url}");

            let response = tokio::select! {
                response = self.client.execute(request) => response,
                () = self.cancellation.cancelled() => return Err(canceled()),
            };

            let (error, outcome) = match response {
                Err(e) => {
                    let kind = classify_transport(&e);
                    tracing::warn!("Transport failure ({kind}): {e}");
                    (
                        BojApiError::Transport {
                            kind,
                            url: request_url,
                            message: e.to_string(),
                        },
                        Outcome::Transport(kind),
                    )
                }
                Ok(response) => {
                    let http_status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let bytes = tokio::select! {
                        bytes = response.bytes() => bytes,
                        () = self.cancellation.cancelled() => return Err(canceled()),
                    };
                    let bytes = match bytes {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            let err = BojApiError::Transport {
                                kind: TransportKind::Read,
                                url: request_url,
                                message: e.to_string(),
                            };
                            match retry.decide(
                                &Outcome::Transport(TransportKind::Read),
                                self.limiter.remaining().await,
                            ) {
                                RetryDecision::Retry(wait) => {
                                    self.retry_sleep(wait.delay).await?;
                                    continue;
                                }
                                _ => return Err(err),
                            }
                        }
                    };
                    tracing::debug!("Response HTTP status: {http_status}");

                    match parse::parse_body(&bytes, lang, format) {
                        Ok(page) => {
                            match classify_page(page, http_status, &request_url, &bytes)? {
                                PageFlow::Done(page) => return Ok(page),
                                PageFlow::Retriable(error, outcome) => (error, outcome),
                            }
                        }
                        Err(parse_error) => {
                            tracing::warn!(
                                "Unparseable response body (HTTP {http_status}): {parse_error}"
                            );
                            let error = BojApiError::Gateway {
                                status: Some(http_status),
                                message_id: UNPARSEABLE_RESPONSE.to_string(),
                                request_url: request_url.clone(),
                                excerpt: excerpt_of(&bytes),
                            };
                            match http_status {
                                429 | 403 | 503 => (
                                    error,
                                    Outcome::HttpStatus {
                                        status: http_status,
                                        retry_after,
                                    },
                                ),
                                _ => return Err(error),
                            }
                        }
                    }
                }
            };

            let local_remaining = self.limiter.remaining().await;
            match retry.decide(&outcome, local_remaining) {
                RetryDecision::Retry(wait) => {
                    tracing::debug!(
                        attempt = wait.attempt,
                        delay_ms = wait.delay.as_millis() as u64,
                        source = %wait.source,
                        "Retrying after failure: {error}"
                    );
                    self.retry_sleep(wait.delay).await?;
                }
                RetryDecision::Fatal | RetryDecision::Exhausted => return Err(error),
            }
        }
    }

    async fn retry_sleep(&self, delay: Duration) -> Result<(), BojApiError> {
        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = self.cancellation.cancelled() => Err(canceled()),
        }
    }
}

/// Flow control after page classification.
enum PageFlow {
    Done(Page),
    Retriable(BojApiError, Outcome),
}

/// Applies body-over-HTTP classification to a parsed page.
fn classify_page(
    page: Page,
    http_status: u16,
    request_url: &str,
    bytes: &[u8],
) -> Result<PageFlow, BojApiError> {
    match messages::classify_message_id(&page.message_id) {
        // No-data completion is swallowed into an empty page regardless of
        // how the rest of the envelope looks.
        MessageClass::NoData => {
            return Ok(PageFlow::Done(Page {
                rows: Vec::new(),
                next_position: None,
                ..page
            }));
        }
        // The server signalled the series ceiling itself; surface the
        // layer-subdivision error rather than a generic bad request.
        MessageClass::LayerOverflow => {
            return Err(BojApiError::LayerOverflow {
                observed: LAYER_SERIES_CEILING,
                ceiling: LAYER_SERIES_CEILING,
            });
        }
        MessageClass::Unknown => {
            tracing::debug!(
                observation_key = %messages::observation_key(&page.message_id),
                "Uncataloged message id surfaced verbatim"
            );
        }
        _ => {}
    }

    match page.status {
        200 => Ok(PageFlow::Done(page)),
        400 => Err(BojApiError::BadRequest {
            status: 400,
            message_id: page.message_id,
            message: page.message,
            request_url: request_url.to_string(),
            excerpt: excerpt_of(bytes),
        }),
        500 => Ok(PageFlow::Retriable(
            BojApiError::ServerError {
                status: 500,
                message_id: page.message_id.clone(),
                message: page.message,
                request_url: request_url.to_string(),
                excerpt: excerpt_of(bytes),
            },
            Outcome::BodyStatus {
                status: 500,
                message_id: page.message_id,
            },
        )),
        503 => Ok(PageFlow::Retriable(
            BojApiError::Unavailable {
                status: 503,
                message_id: page.message_id.clone(),
                message: page.message,
                request_url: request_url.to_string(),
                excerpt: excerpt_of(bytes),
            },
            Outcome::BodyStatus {
                status: 503,
                message_id: page.message_id,
            },
        )),
        other => Err(BojApiError::Gateway {
            status: Some(http_status),
            message_id: page.message_id,
            request_url: request_url.to_string(),
            excerpt: format!("unexpected body status {other}: {}", excerpt_of(bytes)),
        }),
    }
}

fn canceled() -> BojApiError {
    BojApiError::Canceled("canceled by caller".to_string())
}

fn classify_transport(error: &reqwest::Error) -> TransportKind {
    if error.is_timeout() {
        TransportKind::Timeout
    } else if error.is_connect() {
        let text = error.to_string();
        if text.contains("certificate") || text.to_lowercase().contains("tls") {
            TransportKind::TlsTrust
        } else {
            TransportKind::Connect
        }
    } else if error.is_body() || error.is_decode() {
        TransportKind::Read
    } else if error.is_builder() {
        TransportKind::InvalidUrl
    } else if error.is_request() {
        TransportKind::LocalProtocol
    } else {
        TransportKind::RemoteProtocol
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

fn excerpt_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(RESPONSE_EXCERPT_MAX)
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_api_origin_derivation() {
        let config = BojClientConfig {
            base_url: Some("https://www.stat-search.boj.or.jp/api/v1/".to_string()),
            ..Default::default()
        };
        let client = BojHttpClient::new(&config, CancellationToken::new()).unwrap();
        assert_eq!(client.api_origin(), "www.stat-search.boj.or.jp/api/v1");
        assert_eq!(
            client.endpoint_url(BojEndpoint::Code),
            "https://www.stat-search.boj.or.jp/api/v1/getDataCode"
        );
    }

    #[rstest]
    fn test_retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "30".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(30)));

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);

        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[rstest]
    fn test_excerpt_truncation() {
        let long = "x".repeat(RESPONSE_EXCERPT_MAX * 2);
        assert_eq!(excerpt_of(long.as_bytes()).len(), RESPONSE_EXCERPT_MAX);
    }
}
