/*
[INPUT]:  Candle period in whole seconds, or a protocol token like "1h"
[OUTPUT]: Timeframe with its Bitfinex protocol token
[POS]:    Data layer - fixed candle period table
[UPDATE]: When Bitfinex adds or removes candle periods
*/

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigurationError;

/// Candle aggregation period supported by Bitfinex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeframe {
    seconds: u32,
    token: &'static str,
}

const MINUTE: u32 = 60;
const HOUR: u32 = 60 * MINUTE;
const DAY: u32 = 24 * HOUR;

const TIMEFRAMES: [Timeframe; 11] = [
    Timeframe::new(MINUTE, "1m"),
    Timeframe::new(5 * MINUTE, "5m"),
    Timeframe::new(15 * MINUTE, "15m"),
    Timeframe::new(30 * MINUTE, "30m"),
    Timeframe::new(HOUR, "1h"),
    Timeframe::new(3 * HOUR, "3h"),
    Timeframe::new(6 * HOUR, "6h"),
    Timeframe::new(12 * HOUR, "12h"),
    Timeframe::new(DAY, "1D"),
    Timeframe::new(7 * DAY, "7D"),
    Timeframe::new(14 * DAY, "14D"),
];

impl Timeframe {
    const fn new(seconds: u32, token: &'static str) -> Self {
        Self { seconds, token }
    }

    pub fn from_period(seconds: u32) -> Result<Self, ConfigurationError> {
        TIMEFRAMES
            .iter()
            .find(|timeframe| timeframe.seconds == seconds)
            .copied()
            .ok_or(ConfigurationError::UnknownPeriod { seconds })
    }

    /// Every supported timeframe, shortest first.
    pub fn all() -> &'static [Timeframe] {
        &TIMEFRAMES
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn token(&self) -> &'static str {
        self.token
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.seconds))
    }
}

/// Protocol token for a candle period, e.g. `3600` -> `"1h"`.
pub fn lookup_timeframe(seconds: u32) -> Result<&'static str, ConfigurationError> {
    Timeframe::from_period(seconds).map(|timeframe| timeframe.token)
}

impl FromStr for Timeframe {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TIMEFRAMES
            .iter()
            .find(|timeframe| timeframe.token == s)
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownToken {
                token: s.to_string(),
            })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token)
    }
}
