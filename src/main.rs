use currencyx::core::config::ExchangeConfig;
use currencyx::build_connector;
use tracing_subscriber::EnvFilter;

const QUOTES_TO_PRINT: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Credentials are optional for public data; default to the demo venue
    let config = match ExchangeConfig::from_env("CURRENCYCOM") {
        Ok(config) => config,
        Err(e) => {
            println!("No credentials loaded ({}), using public endpoints only", e);
            ExchangeConfig::read_only().demo(true)
        }
    };

    let connector = build_connector(config)?;

    println!("Fetching exchange info...");
    let info = connector.rest().exchange_info().await?;
    println!("Found {} symbols", info.symbols.len());
    for symbol in info.symbols.iter().take(5) {
        println!(
            "Symbol: {} ({} -> {}), Status: {}",
            symbol.symbol, symbol.base_asset, symbol.quote_asset, symbol.status
        );
    }

    if connector.can_authenticate() {
        let account = connector.rest().account().await?;
        println!("Account {} has {} balances", account.user_id, account.balances.len());
    }

    let symbols = vec!["BTC/USD".to_string()];
    let mut session = connector.stream().subscribe_market_data(&symbols).await?;

    let mut received = 0;
    while received < QUOTES_TO_PRINT {
        match session.next_event().await {
            Some(Ok(quote)) => {
                received += 1;
                println!(
                    "{} bid {} ({}) / ofr {} ({})",
                    quote.symbol_name, quote.bid, quote.bid_qty, quote.ofr, quote.ofr_qty
                );
            }
            Some(Err(e)) => println!("Stream error: {}", e),
            None => break,
        }
    }

    session.stop().await;
    println!("Session closed");

    Ok(())
}
