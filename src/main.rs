use anyhow::Context;
use llamaband::datasource::{CurveApiClient, JsonRpcReader};
use llamaband::{api, BatchReader, Config, MarketRegistry, ResultCache, UsdPriceBook};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let reader = BatchReader::new(
        Arc::new(JsonRpcReader::new(config.rpc_url.clone())),
        config.max_batch_size,
    );
    let cache = Arc::new(ResultCache::new());

    let registry = MarketRegistry::load(
        &config.factory_address,
        reader,
        cache.clone(),
        config.cache_ttls,
        config.range_limits,
    )
    .await
    .context("Failed to load markets from factory")?;

    let prices = UsdPriceBook::new(
        Arc::new(CurveApiClient::new(config.price_api_url.clone())),
        config.network.clone(),
        cache,
        config.cache_ttls.usd_prices,
    );

    let app = api::create_router(api::AppState::new(Arc::new(registry), prices));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
