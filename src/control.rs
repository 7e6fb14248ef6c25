/*
 *  control.rs
 *
 *  MeterBridge - needle in the red
 *	(c) 2020-25 Stuart Hunter
 *
 *	TODO:
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Out-of-band control calls to the producer. One call today: ask the
//! audio engine to restart itself before we re-establish the stream. The
//! producer can wedge independently of the socket, so a manual reconnect
//! kicks both.

use std::time::Duration;

use log::debug;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("control endpoint returned {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct ControlClient {
    client: Client,
    base_url: String,
}

impl ControlClient {
    /// Build the client with populated headers and tight timeouts; the
    /// endpoint is local, anything slower than a second is already dead.
    pub fn new(base_url: &str) -> Self {
        const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert(
            "Content-Type",
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .http1_only()
            .connect_timeout(Duration::from_millis(500))
            .default_headers(headers)
            .timeout(Duration::from_millis(800))
            .build()
            .unwrap(); // Panics if client cannot be built, which is acceptable for client initialization

        ControlClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fire the producer-restart request. Callers log a failure and move
    /// on; the socket-level reconnect never waits on this call's outcome.
    pub async fn restart_producer(&self) -> Result<(), ControlError> {
        let url = format!("{}/probe/restart", self.base_url);
        debug!("control: POST {}", url);

        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::Status(status));
        }
        Ok(())
    }
}
