/*
[INPUT]:  Raw symbol strings such as "tBTCUSD" or "fUSD"
[OUTPUT]: Validated Symbol values with canonical wire form
[POS]:    Data layer - symbol validation shared by REST and streams
[UPDATE]: When Bitfinex adds symbol kinds or changes symbol format
*/

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ValidationError;
use crate::types::SymbolType;

/// A trading pair (`tBTCUSD`) or funding currency (`fUSD`).
///
/// The prefix is matched case-insensitively and the label is stored
/// uppercased, so `"tbtcusd"` and `"TBTCUSD"` both become `tBTCUSD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    symbol_type: SymbolType,
    label: String,
}

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let mut chars = raw.chars();
        let prefix = chars.next().ok_or(ValidationError::Empty)?;
        let symbol_type = match prefix.to_ascii_lowercase() {
            't' => SymbolType::TradingPair,
            'f' => SymbolType::FundingCurrency,
            _ => return Err(ValidationError::BadPrefix { prefix }),
        };

        let actual = raw.chars().count();
        let expected = symbol_type.raw_length();
        if actual != expected {
            return Err(ValidationError::BadLength {
                symbol_type,
                expected,
                actual,
            });
        }

        Ok(Self {
            symbol_type,
            label: chars.as_str().to_ascii_uppercase(),
        })
    }

    /// Parse input that may be absent altogether.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, ValidationError> {
        raw.map_or(Err(ValidationError::NullInput), Self::parse)
    }

    pub fn symbol_type(&self) -> SymbolType {
        self.symbol_type
    }

    /// Uppercased symbol without its prefix, e.g. `BTCUSD`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_trading_pair(&self) -> bool {
        self.symbol_type == SymbolType::TradingPair
    }

    /// Wire form: lowercase prefix followed by the label.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Symbol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.symbol_type.prefix(), self.label)
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
