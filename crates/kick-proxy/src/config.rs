//! Configuration types and loading logic.

use std::time::Duration;

use anyhow::Context;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use kick_tracing::TracingConfig;
use serde::Deserialize;

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub target: TargetConfig,
    pub bypass: BypassConfig,
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Upstream site the facade forwards to.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_url")]
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Attempts per dispatched call, each one acquire-plus-request.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

/// Bypass provider that solves the Cloudflare challenge for us.
#[derive(Debug, Clone, Deserialize)]
pub struct BypassConfig {
    /// Scheme and host only; the port is configured separately.
    #[serde(default = "default_bypass_url")]
    pub url: String,

    #[serde(default = "default_bypass_port")]
    pub port: u16,

    #[serde(default = "default_bypass_timeout")]
    pub timeout_secs: u64,

    /// Attempts per credential fetch. Independent of `target.retry_count`.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Linear backoff step; attempt `n` is followed by `n * step`.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

fn default_listen_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_target_url() -> String {
    "https://kick.com".to_string()
}

fn default_bypass_url() -> String {
    "http://localhost".to_string()
}

fn default_bypass_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_bypass_timeout() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_backoff_step_ms() -> u64 {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_target_url(),
            timeout_secs: default_request_timeout(),
            retry_count: default_retry_count(),
        }
    }
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            url: default_bypass_url(),
            port: default_bypass_port(),
            timeout_secs: default_bypass_timeout(),
            retry_count: default_retry_count(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

/// Settings the dispatcher is built from. Fixed for the dispatcher's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub target_base_url: String,
    pub bypass_provider_url: String,
    pub bypass_provider_port: u16,
    pub retry_count: u32,
    pub bypass_retry_count: u32,
    pub request_timeout: Duration,
    pub bypass_timeout: Duration,
    pub backoff_step: Duration,
}

impl DispatchConfig {
    /// `{bypass_provider_url}:{port}/cookies`
    pub fn bypass_endpoint(&self) -> String {
        format!(
            "{}:{}/cookies",
            self.bypass_provider_url.trim_end_matches('/'),
            self.bypass_provider_port
        )
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        ProxyConfig::default().dispatch()
    }
}

impl ProxyConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. CLI flags, applied afterwards via [`apply_cli_overrides`](Self::apply_cli_overrides)
    /// 2. `BYPASS_SERVER_URL`, `BYPASS_SERVER_PORT`, `TARGET_URL`
    /// 3. Environment variables (KICK_ prefix, __ for nesting)
    /// 4. TOML config file
    /// 5. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let mut config = Self::from_figment(
            Figment::new()
                .merge(Toml::file(config_path))
                .merge(Env::prefixed("KICK_").split("__")),
        )?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        Ok(figment.extract()?)
    }

    /// Apply the unprefixed variables the bypass deployment conventionally sets.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BYPASS_SERVER_URL") {
            self.bypass.url = url;
        }
        if let Some(port) = lookup("BYPASS_SERVER_PORT") {
            self.bypass.port = port
                .trim()
                .parse()
                .with_context(|| format!("BYPASS_SERVER_PORT is not a valid port: {port:?}"))?;
        }
        if let Some(url) = lookup("TARGET_URL") {
            self.target.url = url;
        }
        Ok(())
    }

    /// `--listen` / `--target-url`; these win over every other source.
    pub fn apply_cli_overrides(&mut self, listen: Option<String>, target_url: Option<String>) {
        if let Some(addr) = listen {
            self.server.listen_address = addr;
        }
        if let Some(url) = target_url {
            self.target.url = url;
        }
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            target_base_url: self.target.url.clone(),
            bypass_provider_url: self.bypass.url.clone(),
            bypass_provider_port: self.bypass.port,
            retry_count: self.target.retry_count,
            bypass_retry_count: self.bypass.retry_count,
            request_timeout: Duration::from_secs(self.target.timeout_secs),
            bypass_timeout: Duration::from_secs(self.bypass.timeout_secs),
            backoff_step: Duration::from_millis(self.bypass.backoff_step_ms),
        }
    }
}
