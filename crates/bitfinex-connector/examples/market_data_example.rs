/*
[INPUT]:  Pair identifier (e.g., "tBTCUSD") and candle period
[OUTPUT]: Recent trades and candle history printed to stdout
[POS]:    Examples - public REST history queries
[UPDATE]: When adding new market data endpoints
*/

use bitfinex_connector::*;

/// Example: Query trade and candle history (no authentication required)
#[tokio::main]
async fn main() {
    println!("=== Bitfinex Market Data Example ===\n");

    let connector = match BitfinexConnector::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create connector: {}", e);
            return;
        }
    };

    let pair = "tBTCUSD";

    println!("Querying last 5 trades for {}...", pair);
    match connector.get_new_trades(pair, 5).await {
        Ok(trades) => {
            for trade in trades {
                println!(
                    "  {} {:?} {} @ {:?} ({})",
                    trade.id, trade.side, trade.amount, trade.price, trade.timestamp
                );
            }
        }
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nQuerying last 3 hourly candles for {}...", pair);
    match connector
        .get_candle_series(pair, 3600, None, None, Some(3))
        .await
    {
        Ok(candles) => {
            for candle in candles {
                println!(
                    "  {} O:{} H:{} L:{} C:{} V:{}",
                    candle.open_time,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.total_volume
                );
            }
        }
        Err(e) => println!("✗ Error: {}", e),
    }

    println!("\nSupported candle periods:");
    for timeframe in Timeframe::all() {
        println!("  {:>8}s -> {}", timeframe.seconds(), timeframe.token());
    }
}
