//! Cloudflare clearance credentials and the cache that holds them.
//!
//! Credentials come from an external bypass provider that solves the
//! challenge in a real browser and hands back the resulting cookies together
//! with the user agent they are bound to. They stay cached until a request
//! using them fails; there is no expiry timer.

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::Instrument;

use super::retry::{retry_with_backoff, Backoff};
use crate::config::DispatchConfig;
use crate::error::{BypassAttemptError, DispatchError};
use crate::stats::ProxyStats;

/// Clearance cookies plus the user agent that solved the challenge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BypassCredentials {
    pub cookies: BTreeMap<String, String>,
    pub user_agent: String,
}

impl BypassCredentials {
    /// Value for a `Cookie` request header, or `None` if there are no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Holds the current credentials and knows how to refresh them.
pub struct CredentialCache {
    client: reqwest::Client,
    provider_endpoint: String,
    target_url: String,
    timeout: std::time::Duration,
    backoff: Backoff,
    stats: ProxyStats,
    slot: RwLock<Option<BypassCredentials>>,
    refresh: Mutex<()>,
}

impl CredentialCache {
    pub fn new(client: reqwest::Client, config: &DispatchConfig, stats: ProxyStats) -> Self {
        Self {
            client,
            provider_endpoint: config.bypass_endpoint(),
            target_url: config.target_base_url.clone(),
            timeout: config.bypass_timeout,
            backoff: Backoff::new(config.bypass_retry_count, config.backoff_step),
            stats,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Cached credentials, fetching fresh ones if none are held.
    ///
    /// Only one provider fetch runs at a time; callers queued behind it pick
    /// up its result. The slot itself is only locked briefly, so `current`
    /// and `invalidate` never wait on the provider.
    pub async fn acquire(&self) -> Result<BypassCredentials, DispatchError> {
        if let Some(creds) = self.current().await {
            return Ok(creds);
        }

        let _refresh = self.refresh.lock().await;
        if let Some(creds) = self.current().await {
            return Ok(creds);
        }

        let fetched = self.fetch().await;
        *self.slot.write().await = fetched.as_ref().ok().cloned();
        fetched
    }

    /// Ask the provider for new credentials, retrying with linear backoff.
    ///
    /// Does not touch the cache.
    pub async fn fetch(&self) -> Result<BypassCredentials, DispatchError> {
        let span = kick_tracing::bypass_fetch_span!(&self.provider_endpoint, &self.target_url);

        async {
            let mut made = 0;
            let result = retry_with_backoff(&self.backoff, "Cloudflare bypass", |attempt| {
                made = attempt;
                self.fetch_once()
            })
            .await;
            tracing::Span::current().record("attempts", made);

            match result {
                Ok(creds) => {
                    tracing::Span::current().record("cookie_count", creds.cookies.len());
                    tracing::info!(
                        cookies = creds.cookies.len(),
                        user_agent = %creds.user_agent,
                        "Obtained Cloudflare clearance"
                    );
                    Ok(creds)
                }
                Err(e) => {
                    self.stats.inc_bypass_failures();
                    tracing::error!(error = %e, "Failed to obtain Cloudflare clearance");
                    Err(DispatchError::BypassAcquisition {
                        attempts: e.attempts,
                        last: e.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn fetch_once(&self) -> Result<BypassCredentials, BypassAttemptError> {
        self.stats.inc_bypass_fetches();

        let response = self
            .client
            .get(&self.provider_endpoint)
            .query(&[("url", self.target_url.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(BypassAttemptError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let creds: BypassCredentials = serde_json::from_slice(&body)?;
        if creds.user_agent.trim().is_empty() {
            return Err(BypassAttemptError::EmptyUserAgent);
        }
        Ok(creds)
    }

    /// Drop the cached credentials so the next `acquire` hits the provider.
    pub async fn invalidate(&self) {
        if self.slot.write().await.take().is_some() {
            tracing::debug!("Cloudflare clearance invalidated");
        }
    }

    pub async fn current(&self) -> Option<BypassCredentials> {
        self.slot.read().await.clone()
    }
}
