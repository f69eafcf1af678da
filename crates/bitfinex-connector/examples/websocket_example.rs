/*
[INPUT]:  Pair identifier (e.g., "tBTCUSD")
[OUTPUT]: Live trade and candle updates printed to stdout
[POS]:    Examples - WebSocket stream handling
[UPDATE]: When WebSocket API changes
*/

use bitfinex_connector::*;
use tokio::time::{Duration, sleep};

/// Example: Stream live trades and 1m candles for 20 seconds
#[tokio::main]
async fn main() {
    println!("=== Bitfinex WebSocket Example ===\n");

    let mut connector = match BitfinexConnector::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create connector: {}", e);
            return;
        }
    };
    let Some(mut events) = connector.take_receiver() else {
        eprintln!("Receiver already taken");
        return;
    };

    let pair = "tBTCUSD";
    if let Err(e) = connector.subscribe_trades(pair).await {
        eprintln!("✗ Trades subscription failed: {}", e);
        return;
    }
    if let Err(e) = connector.subscribe_candles(pair, 60).await {
        eprintln!("✗ Candles subscription failed: {}", e);
    }
    println!("✓ Subscribed to {} trades and 1m candles\n", pair);

    let deadline = sleep(Duration::from_secs(20));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(MarketEvent::BuyTrade(trade)) => {
                    println!("BUY  {} {} @ {:?}", trade.id, trade.amount, trade.price);
                }
                Some(MarketEvent::SellTrade(trade)) => {
                    println!("SELL {} {} @ {:?}", trade.id, trade.amount, trade.price);
                }
                Some(MarketEvent::Candle(candle)) => {
                    println!("CANDLE {} close {} volume {}", candle.open_time, candle.close, candle.total_volume);
                }
                Some(MarketEvent::Notice { subscription, notice }) => {
                    println!("[{}] {:?}", subscription, notice);
                }
                None => break,
            },
        }
    }

    connector.shutdown().await;
    println!("\n✓ Unsubscribed");
}
