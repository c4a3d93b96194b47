// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the OAuth provider: token endpoint and Web API.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::credential::refresh::{classify, RefreshError};
use crate::credential::TokenResponse;

/// Where the provider lives and how this client identifies itself.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// OAuth token endpoint (`POST`).
    pub token_url: String,
    /// Web API base, without trailing slash (e.g. `https://api.spotify.com/v1`).
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Result of a liveness probe against the Web API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Accepted,
    Rejected,
    /// No verdict: network error, timeout, rate limit, or server error.
    Unreachable(String),
}

/// A playback device as listed by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

/// HTTP client wrapper for one OAuth provider.
pub struct ProviderClient {
    endpoints: Endpoints,
    client: Client,
}

impl ProviderClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> anyhow::Result<Self> {
        crate::ensure_crypto_provider();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoints, client })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn has_client_secret(&self) -> bool {
        self.endpoints.client_secret.is_some()
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_url.trim_end_matches('/'), path)
    }

    /// Authenticate the client with HTTP Basic when a secret is configured,
    /// otherwise send `client_id` in the form body.
    fn token_request(&self, form: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let req = self.client.post(&self.endpoints.token_url);
        match &self.endpoints.client_secret {
            Some(secret) => req.basic_auth(&self.endpoints.client_id, Some(secret)).form(form),
            None => {
                let mut form = form.to_vec();
                form.push(("client_id", self.endpoints.client_id.as_str()));
                req.form(&form)
            }
        }
    }

    async fn send_token_request(&self, req: reqwest::RequestBuilder) -> Result<TokenResponse, RefreshError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify(status.as_u16(), &text));
        }
        let token: TokenResponse = resp.json().await?;
        if token.access_token.is_empty() {
            return Err(RefreshError::Transient("token endpoint returned an empty access_token".to_owned()));
        }
        Ok(token)
    }

    /// Single `grant_type=refresh_token` exchange.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let req = self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);
        self.send_token_request(req).await
    }

    /// Single `grant_type=client_credentials` exchange. Requires a client secret.
    pub async fn client_credentials(&self) -> Result<TokenResponse, RefreshError> {
        if self.endpoints.client_secret.is_none() {
            return Err(RefreshError::Permanent("client_credentials requires a client secret".to_owned()));
        }
        let req = self.token_request(&[("grant_type", "client_credentials")]);
        self.send_token_request(req).await
    }

    /// Ask the provider whether it still honors `access_token`.
    pub async fn probe(&self, access_token: &str) -> Probe {
        let resp = match self.client.get(self.api("/me")).bearer_auth(access_token).send().await {
            Ok(r) => r,
            Err(e) => return Probe::Unreachable(e.to_string()),
        };
        let status = resp.status();
        if status.is_success() {
            Probe::Accepted
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Probe::Rejected
        } else {
            Probe::Unreachable(format!("probe returned {status}"))
        }
    }

    /// List the user's playback devices.
    pub async fn devices(&self, access_token: &str) -> anyhow::Result<Vec<Device>> {
        let resp = self
            .client
            .get(self.api("/me/player/devices"))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?;
        let list: DeviceList = resp.json().await?;
        Ok(list.devices)
    }
}
