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

//! High-level asynchronous client for the BOJ statistics API.

use tokio_util::sync::CancellationToken;

use crate::{
    cache::CacheGateway,
    common::enums::BojEndpoint,
    config::BojClientConfig,
    consistency::PublishWindow,
    driver::PaginationDriver,
    error::BojApiError,
    http::{
        BojHttpClient,
        models::{MetadataFrame, TimeSeriesFrame},
    },
    request::DataRequest,
};

/// Asynchronous client for the three BOJ statistics endpoints.
///
/// Owns the transport (connection pool + rate limiter), the optional file
/// cache, and a cancellation token observed at every suspension point.
/// Clones of one client share all of these, so concurrent calls stay
/// within the configured request spacing.
#[derive(Debug)]
pub struct BojDataClient {
    config: BojClientConfig,
    transport: BojHttpClient,
    cache: Option<CacheGateway>,
    cancellation: CancellationToken,
}

impl BojDataClient {
    /// Creates a new [`BojDataClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// or cache directory cannot be initialized.
    pub fn new(config: BojClientConfig) -> anyhow::Result<Self> {
        let cancellation = CancellationToken::new();
        let transport = BojHttpClient::new(&config, cancellation.clone())?;
        let cache = CacheGateway::new(&config)?;
        Ok(Self {
            config,
            transport,
            cache,
            cancellation,
        })
    }

    /// Returns a token that cancels in-flight calls when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Cancels all in-flight calls on this client.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Fetches observations for an explicit code list (`getDataCode`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub async fn get_data_code(
        &self,
        request: &DataRequest,
    ) -> Result<TimeSeriesFrame, BojApiError> {
        self.expect_endpoint(request, BojEndpoint::Code)?;
        self.driver().execute_data(request).await
    }

    /// Fetches observations below a layer path (`getDataLayer`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub async fn get_data_layer(
        &self,
        request: &DataRequest,
    ) -> Result<TimeSeriesFrame, BojApiError> {
        self.expect_endpoint(request, BojEndpoint::Layer)?;
        self.driver().execute_data(request).await
    }

    /// Fetches series catalog metadata (`getMetadata`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub async fn get_metadata(
        &self,
        request: &DataRequest,
    ) -> Result<MetadataFrame, BojApiError> {
        self.expect_endpoint(request, BojEndpoint::Metadata)?;
        self.driver().execute_metadata(request).await
    }

    fn driver(&self) -> PaginationDriver<'_> {
        PaginationDriver {
            transport: &self.transport,
            cache: self.cache.as_ref(),
            window: PublishWindow::new(
                self.config.publish_window_start,
                self.config.publish_window_grace,
            ),
        }
    }

    fn expect_endpoint(
        &self,
        request: &DataRequest,
        expected: BojEndpoint,
    ) -> Result<(), BojApiError> {
        if request.endpoint != expected {
            return Err(BojApiError::Validation {
                validation_code: "ENDPOINT".to_string(),
                message: format!(
                    "request targets {} but was dispatched to {expected}",
                    request.endpoint
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_endpoint_dispatch_guard() {
        let client = BojDataClient::new(BojClientConfig::default()).unwrap();
        let request = DataRequest::builder()
            .endpoint(BojEndpoint::Layer)
            .db("IR01")
            .layer(vec!["MB".to_string()])
            .build()
            .unwrap();

        let err = client
            .expect_endpoint(&request, BojEndpoint::Code)
            .unwrap_err();
        assert!(matches!(err, BojApiError::Validation { .. }));
        assert!(client.expect_endpoint(&request, BojEndpoint::Layer).is_ok());
    }

    #[rstest]
    fn test_cancel_trips_token() {
        let client = BojDataClient::new(BojClientConfig::default()).unwrap();
        let token = client.cancellation_token();
        assert!(!token.is_cancelled());
        client.cancel();
        assert!(token.is_cancelled());
    }
}
