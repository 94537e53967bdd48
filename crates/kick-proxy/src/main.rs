//! kick-proxy: unofficial REST facade over Kick's web API that gets past the
//! Cloudflare challenge with credentials from an external bypass provider.

mod config;
mod error;
mod proxy;
mod routes;
mod server;
mod stats;

use config::ProxyConfig;
use proxy::dispatcher::Dispatcher;
use server::AppState;
use stats::ProxyStats;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1).cloned())
    };

    let config_path = flag("--config")
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("KICK_PROXY_CONFIG").ok())
        .unwrap_or_else(|| "kick-proxy.toml".to_string());

    let mut config = ProxyConfig::load(&config_path)?;

    config.apply_cli_overrides(flag("--listen"), flag("--target-url"));

    // Build the tokio runtime first; the tonic OTLP exporter needs a reactor
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = kick_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            target_url = %config.target.url,
            bypass_url = %config.bypass.url,
            bypass_port = config.bypass.port,
            otlp = tracing_guard.exporting(),
            "Starting kick-proxy"
        );

        run(config).await
    })
}

async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    let dispatch = config.dispatch();
    tracing::debug!(
        bypass_endpoint = %dispatch.bypass_endpoint(),
        retry_count = dispatch.retry_count,
        bypass_retry_count = dispatch.bypass_retry_count,
        "Dispatcher configured"
    );

    let dispatcher = Dispatcher::new(dispatch, ProxyStats::new())?;
    server::run(AppState::new(config, dispatcher)).await
}
