/*
[INPUT]:  Symbols, timeframes and history filters
[OUTPUT]: Historical trades and candles decoded into domain records
[POS]:    HTTP layer - public market data endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use reqwest::Method;
use serde_json::Value;

use crate::error::Result;
use crate::http::BitfinexClient;
use crate::types::{Candle, HistoryQuery, Symbol, Timeframe, Trade, candle_key};
use crate::ws::decoder::{CandleDecoder, ChannelDecoder, TradeDecoder, decode_value};

impl BitfinexClient {
    /// Fetch historical trades
    ///
    /// GET trades/{symbol}/hist?limit=&start=&end=&sort=
    pub async fn fetch_trades(&self, symbol: &Symbol, query: &HistoryQuery) -> Result<Vec<Trade>> {
        let endpoint = format!("trades/{symbol}/hist");
        let builder = self
            .public_request(Method::GET, &endpoint)?
            .query(&query.query_pairs());
        let rows: Vec<Value> = self.send_json(builder).await?;
        decode_rows(&TradeDecoder::new(symbol.clone()), &rows)
    }

    /// Fetch historical candles
    ///
    /// GET candles/trade:{timeframe}:{symbol}/hist?limit=&start=&end=&sort=
    pub async fn fetch_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        query: &HistoryQuery,
    ) -> Result<Vec<Candle>> {
        let endpoint = format!("candles/{}/hist", candle_key(symbol, timeframe));
        let builder = self
            .public_request(Method::GET, &endpoint)?
            .query(&query.query_pairs());
        let rows: Vec<Value> = self.send_json(builder).await?;
        decode_rows(&CandleDecoder::new(symbol.clone(), timeframe), &rows)
    }
}

/// Every row must decode; one bad row fails the request.
fn decode_rows<D: ChannelDecoder>(decoder: &D, rows: &[Value]) -> Result<Vec<D::Record>> {
    rows.iter()
        .map(|row| decode_value(decoder, row).map_err(Into::into))
        .collect()
}
