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

//! Blocking adapter over the asynchronous client.
//!
//! Both call styles run the same core algorithm; this wrapper owns a
//! current-thread runtime and drives the async client to completion. Must
//! not be used from inside an async context.

use tokio_util::sync::CancellationToken;

use crate::{
    client::BojDataClient,
    config::BojClientConfig,
    error::BojApiError,
    http::models::{MetadataFrame, TimeSeriesFrame},
    request::DataRequest,
};

/// Blocking client for the three BOJ statistics endpoints.
#[derive(Debug)]
pub struct BojBlockingClient {
    runtime: tokio::runtime::Runtime,
    inner: BojDataClient,
}

impl BojBlockingClient {
    /// Creates a new [`BojBlockingClient`] instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime or the underlying client cannot be
    /// built.
    pub fn new(config: BojClientConfig) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = BojDataClient::new(config)?;
        Ok(Self { runtime, inner })
    }

    /// Returns a token that cancels in-flight calls when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancellation_token()
    }

    /// Fetches observations for an explicit code list (`getDataCode`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub fn get_data_code(&self, request: &DataRequest) -> Result<TimeSeriesFrame, BojApiError> {
        self.runtime.block_on(self.inner.get_data_code(request))
    }

    /// Fetches observations below a layer path (`getDataLayer`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub fn get_data_layer(&self, request: &DataRequest) -> Result<TimeSeriesFrame, BojApiError> {
        self.runtime.block_on(self.inner.get_data_layer(request))
    }

    /// Fetches series catalog metadata (`getMetadata`).
    ///
    /// # Errors
    ///
    /// Returns a [`BojApiError`] on validation, transport, server or
    /// engine failure.
    pub fn get_metadata(&self, request: &DataRequest) -> Result<MetadataFrame, BojApiError> {
        self.runtime.block_on(self.inner.get_metadata(request))
    }
}
