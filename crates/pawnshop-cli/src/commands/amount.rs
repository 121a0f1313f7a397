//! Amount conversions

use pawnshop_core::MarketConfig;
use pawnshop_types::AtomicAmount;

use crate::display;

pub fn parse(config: &MarketConfig, value: &str) -> anyhow::Result<()> {
    let currency = config.currency();
    let atomic = currency.parse_currency(value)?;
    display::section(&format!("{} → atomic", value));
    display::kv("atomic", &atomic.to_string());
    display::kv("display", &currency.to_display_string(atomic));
    Ok(())
}

pub fn format(config: &MarketConfig, atomic: u64) -> anyhow::Result<()> {
    let currency = config.currency();
    let amount = AtomicAmount::new(atomic);
    display::section(&format!("{} atomic → {}", atomic, currency.symbol));
    display::kv(
        &format!("precision {}", config.display_precision),
        &currency.format_currency(amount, config.display_precision),
    );
    display::kv("display", &currency.to_display_string(amount));
    Ok(())
}
