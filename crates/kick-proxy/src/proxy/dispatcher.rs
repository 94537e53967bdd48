//! Upstream dispatch with Cloudflare clearance handling.
//!
//! Each attempt is: make sure clearance credentials are cached, send the call
//! with them, normalize the outcome. Any failure drops the credentials before
//! the next attempt, since a rejected request usually means the clearance was
//! revoked or has expired.

use std::time::Instant;

use http::Method;
use reqwest::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::Url;
use serde_json::Value;
use tracing::Instrument;

use super::bypass::{BypassCredentials, CredentialCache};
use super::response::NormalizedResponse;
use super::retry::{retry_with_backoff, Backoff};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::stats::ProxyStats;

/// Upstream statuses that are an answer rather than a symptom of stale
/// clearance. Retrying them cannot change the outcome.
const DEFINITIVE_STATUSES: &[u16] = &[401, 404];

/// Why one attempt of the outer loop did not produce a usable response.
enum AttemptFailure {
    Bypass(DispatchError),
    Upstream(NormalizedResponse),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Bypass(e) => write!(f, "{e}"),
            AttemptFailure::Upstream(resp) => match resp.error() {
                Some(error) => write!(f, "status {}: {error}", resp.status_code()),
                None => write!(f, "upstream returned status {}", resp.status_code()),
            },
        }
    }
}

/// Issues calls against the target site on behalf of the route layer.
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: Url,
    config: DispatchConfig,
    credentials: CredentialCache,
    stats: ProxyStats,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, stats: ProxyStats) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Self::with_client(config, client, stats)
    }

    /// Build on an existing client. Timeouts are applied per request, so the
    /// client should not carry its own.
    pub fn with_client(
        config: DispatchConfig,
        client: reqwest::Client,
        stats: ProxyStats,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.target_base_url)?;
        let credentials = CredentialCache::new(client.clone(), &config, stats.clone());
        Ok(Self {
            client,
            base_url,
            config,
            credentials,
            stats,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialCache {
        &self.credentials
    }

    pub fn stats(&self) -> &ProxyStats {
        &self.stats
    }

    /// GET with the configured retry budget.
    pub async fn get(&self, endpoint: &str, auth: Option<&str>) -> NormalizedResponse {
        self.send(endpoint, Method::GET, auth, None, self.config.retry_count)
            .await
    }

    /// GET with a JSON body, which some Kick endpoints read filters from.
    pub async fn get_with_body(&self, endpoint: &str, body: &Value) -> NormalizedResponse {
        self.send(endpoint, Method::GET, None, Some(body), self.config.retry_count)
            .await
    }

    /// POST a JSON body with the configured retry budget.
    pub async fn post(&self, endpoint: &str, auth: Option<&str>, body: &Value) -> NormalizedResponse {
        self.send(endpoint, Method::POST, auth, Some(body), self.config.retry_count)
            .await
    }

    /// Send one logical call, retrying the acquire-plus-request sequence up to
    /// `retry` times.
    ///
    /// Never returns an error: transport, decode and bypass failures all end
    /// up in the returned envelope. A budget of `retry` here is separate from
    /// the provider's own fetch budget (`bypass_retry_count`), so the worst
    /// case is `retry * bypass_retry_count` provider round trips.
    pub async fn send(
        &self,
        endpoint: &str,
        method: Method,
        auth: Option<&str>,
        body: Option<&Value>,
        retry: u32,
    ) -> NormalizedResponse {
        let span = kick_tracing::dispatch_request_span!(method, endpoint);
        self.stats.inc_requests();

        async {
            let url = match self.resolve(endpoint) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(error = %e, "Refusing to dispatch");
                    return NormalizedResponse::from_error(&e);
                }
            };

            let backoff = Backoff::new(retry, self.config.backoff_step);
            let mut attempts = 0;

            let outcome = retry_with_backoff(&backoff, "Request", |attempt| {
                attempts = attempt;
                self.attempt(&url, &method, auth, body, attempt, retry)
            })
            .await;

            let span = tracing::Span::current();
            span.record("attempts", attempts);

            match outcome {
                Ok(response) => {
                    span.record("status", response.status_code());
                    response
                }
                Err(e) => {
                    self.stats.inc_retries_exhausted();
                    let bypass_failure = matches!(
                        &e.last,
                        Some(AttemptFailure::Bypass(err)) if err.is_bypass_failure()
                    );
                    let response = NormalizedResponse::from_error(&DispatchError::ExhaustedRetries);
                    span.record("status", response.status_code());
                    tracing::error!(
                        attempts = attempts,
                        bypass_failure = bypass_failure,
                        last_error = %e,
                        "Giving up on upstream call"
                    );
                    response
                }
            }
        }
        .instrument(span)
        .await
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, DispatchError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| DispatchError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }

    async fn attempt(
        &self,
        url: &Url,
        method: &Method,
        auth: Option<&str>,
        body: Option<&Value>,
        attempt: u32,
        max_attempts: u32,
    ) -> Result<NormalizedResponse, AttemptFailure> {
        let span = kick_tracing::dispatch_attempt_span!(attempt, max_attempts);

        async {
            let creds = match self.credentials.acquire().await {
                Ok(creds) => creds,
                Err(e) => {
                    self.credentials.invalidate().await;
                    return Err(AttemptFailure::Bypass(e));
                }
            };

            self.stats.inc_upstream_attempts();
            let start = Instant::now();
            let response = self.call(url, method, auth, body, &creds).await;

            let span = tracing::Span::current();
            span.record("latency_ms", start.elapsed().as_millis() as u64);
            span.record("status", response.status_code());

            if response.is_success() {
                return Ok(response);
            }

            self.stats.inc_upstream_failures();
            self.credentials.invalidate().await;

            // Ok ends the loop; the caller still sees is_success() == false.
            if response.error().is_none() && DEFINITIVE_STATUSES.contains(&response.status_code()) {
                tracing::info!(status = response.status_code(), "Upstream gave a definitive failure");
                return Ok(response);
            }
            Err(AttemptFailure::Upstream(response))
        }
        .instrument(span)
        .await
    }

    /// One upstream round trip, normalized. Never fails.
    async fn call(
        &self,
        url: &Url,
        method: &Method,
        auth: Option<&str>,
        body: Option<&Value>,
        creds: &BypassCredentials,
    ) -> NormalizedResponse {
        let mut req = self
            .client
            .request(method.clone(), url.clone())
            .header(USER_AGENT, creds.user_agent.as_str())
            .timeout(self.config.request_timeout);

        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        if let Some(cookie) = creds.cookie_header() {
            req = req.header(COOKIE, cookie);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        match fetch_body(req).await {
            Ok((status, bytes)) => normalize(status, &bytes),
            Err(e) => {
                tracing::error!(error = %e, "Request failed");
                NormalizedResponse::from_error(&e)
            }
        }
    }
}

async fn fetch_body(req: reqwest::RequestBuilder) -> Result<(u16, Vec<u8>), DispatchError> {
    let response = req.send().await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    Ok((status, bytes.to_vec()))
}

/// Turn a status and raw body into an envelope. Empty bodies carry no data.
fn normalize(status: u16, body: &[u8]) -> NormalizedResponse {
    if body.is_empty() {
        return NormalizedResponse::new(status, None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => NormalizedResponse::new(status, Some(value)),
        Err(e) => {
            tracing::error!(error = %e, status = status, "JSON decode failed");
            NormalizedResponse::from_error(&DispatchError::Decode)
        }
    }
}
