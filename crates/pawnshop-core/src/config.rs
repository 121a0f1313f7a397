//! Marketplace configuration
//!
//! Defaults match the Algorand TestNet setup. Every field can be overridden
//! from the environment (`PAWNSHOP_*`), which the CLI loads after `.env`.

use pawnshop_types::{Currency, PawnError, Result};
use serde::{Deserialize, Serialize};

/// Zero digits a display may print past the currency's own decimals
pub const MAX_PRECISION_PADDING: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Network the contracts live on
    #[serde(default = "default_network")]
    pub network: String,

    /// Standard unit symbol
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Decimals between the standard unit and the atomic unit
    #[serde(default = "default_currency_decimals")]
    pub currency_decimals: u32,

    /// Fractional digits shown for balances
    #[serde(default = "default_display_precision")]
    pub display_precision: u32,

    /// Amount suggested when funding from the faucet
    #[serde(default = "default_fund_amount")]
    pub default_fund_amount: String,

    /// How far back, in network time, event queries reach on connect
    #[serde(default = "default_query_window")]
    pub query_window: u64,

    /// Bound on each session's transition log
    #[serde(default = "default_trace_max_entries")]
    pub trace_max_entries: Option<usize>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            currency_symbol: default_currency_symbol(),
            currency_decimals: default_currency_decimals(),
            display_precision: default_display_precision(),
            default_fund_amount: default_fund_amount(),
            query_window: default_query_window(),
            trace_max_entries: default_trace_max_entries(),
        }
    }
}

fn default_network() -> String {
    "TestNet".to_string()
}

fn default_currency_symbol() -> String {
    "ALGO".to_string()
}

fn default_currency_decimals() -> u32 {
    pawnshop_types::STANDARD_DECIMALS
}

fn default_display_precision() -> u32 {
    4
}

fn default_fund_amount() -> String {
    "10".to_string()
}

fn default_query_window() -> u64 {
    3000
}

fn default_trace_max_entries() -> Option<usize> {
    Some(256)
}

impl MarketConfig {
    pub fn currency(&self) -> Currency {
        Currency::new(self.currency_symbol.clone(), self.currency_decimals)
    }

    /// Load from the process environment on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup on top of the defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(network) = lookup("PAWNSHOP_NETWORK") {
            config.network = network;
        }
        if let Some(symbol) = lookup("PAWNSHOP_CURRENCY_SYMBOL") {
            config.currency_symbol = symbol;
        }
        if let Some(decimals) = lookup("PAWNSHOP_CURRENCY_DECIMALS") {
            config.currency_decimals = parse_number("PAWNSHOP_CURRENCY_DECIMALS", &decimals)?;
        }
        if let Some(precision) = lookup("PAWNSHOP_DISPLAY_PRECISION") {
            config.display_precision = parse_number("PAWNSHOP_DISPLAY_PRECISION", &precision)?;
        }
        if let Some(amount) = lookup("PAWNSHOP_FUND_AMOUNT") {
            config.default_fund_amount = amount;
        }
        if let Some(window) = lookup("PAWNSHOP_QUERY_WINDOW") {
            config.query_window = parse_number("PAWNSHOP_QUERY_WINDOW", &window)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the amount codec cannot honour
    pub fn validate(&self) -> Result<()> {
        if 10u64.checked_pow(self.currency_decimals).is_none() {
            return Err(PawnError::invalid_input(
                "currency_decimals",
                format!("{} decimals do not fit in an atomic amount", self.currency_decimals),
            ));
        }
        let max_precision = self.currency_decimals + MAX_PRECISION_PADDING;
        if self.display_precision > max_precision {
            return Err(PawnError::invalid_input(
                "display_precision",
                format!(
                    "{} digits exceeds the limit of {} for {} decimals",
                    self.display_precision, max_precision, self.currency_decimals
                ),
            ));
        }
        self.currency()
            .parse_currency(&self.default_fund_amount)
            .map_err(|e| e.for_field("default_fund_amount"))?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PawnError::invalid_input(key, format!("'{}' is not a number", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MarketConfig::default();
        assert_eq!(config.network, "TestNet");
        assert_eq!(config.currency(), Currency::algo());
        assert_eq!(config.display_precision, 4);
        assert_eq!(config.query_window, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = MarketConfig::from_lookup(lookup(&[
            ("PAWNSHOP_NETWORK", "MainNet"),
            ("PAWNSHOP_DISPLAY_PRECISION", "2"),
            ("PAWNSHOP_FUND_AMOUNT", "2.5"),
        ]))
        .unwrap();
        assert_eq!(config.network, "MainNet");
        assert_eq!(config.display_precision, 2);
        assert_eq!(config.default_fund_amount, "2.5");
        assert_eq!(config.currency_symbol, "ALGO");
    }

    #[test]
    fn test_malformed_env_values() {
        let err = MarketConfig::from_lookup(lookup(&[("PAWNSHOP_QUERY_WINDOW", "soon")])).unwrap_err();
        assert!(matches!(err, PawnError::InvalidInput { ref field, .. } if field == "PAWNSHOP_QUERY_WINDOW"));

        let err = MarketConfig::from_lookup(lookup(&[("PAWNSHOP_CURRENCY_DECIMALS", "40")])).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_INPUT");

        assert!(MarketConfig::from_lookup(lookup(&[("PAWNSHOP_FUND_AMOUNT", "lots")])).is_err());
    }

    #[test]
    fn test_display_precision_is_bounded() {
        let err = MarketConfig::from_lookup(lookup(&[("PAWNSHOP_DISPLAY_PRECISION", "4000000000")]))
            .unwrap_err();
        assert!(matches!(err, PawnError::InvalidInput { ref field, .. } if field == "display_precision"));

        let config = MarketConfig {
            display_precision: 6 + MAX_PRECISION_PADDING,
            ..MarketConfig::default()
        };
        assert!(config.validate().is_ok());
        let config = MarketConfig {
            display_precision: 7 + MAX_PRECISION_PADDING,
            ..MarketConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().error_code(), "INVALID_INPUT");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MarketConfig = serde_json::from_str(r#"{"network":"LocalNet"}"#).unwrap();
        assert_eq!(config.network, "LocalNet");
        assert_eq!(config.trace_max_entries, Some(256));
    }
}
