// ============================================================================
// Exchange Server
// Binds the TCP front end configured through EXCHANGE_* variables
// ============================================================================

use currency_exchange::domain::ExchangeConfig;
use currency_exchange::engine::create_from_config;
use currency_exchange::interfaces::InMemoryEventStore;
use currency_exchange::protocol::Exchange;
use currency_exchange::server::ExchangeServer;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ExchangeConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let store = Arc::new(InMemoryEventStore::new());
    let market = create_from_config(&config, store)?;
    let exchange = Exchange::new(market).into_shared();

    let server = ExchangeServer::bind(&config, exchange).await?;
    tracing::info!(addr = %server.local_addr()?, "exchange server listening");

    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "unable to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("exchange server stopped");
    Ok(())
}
