use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;

pub const DEFAULT_PORT: u16 = 3004;
pub const DEFAULT_DB_PATH: &str = "harvest_settlement.redb";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub service: Option<ServiceConfig>,
    pub settlement: Option<SettlementConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    pub port: Option<u16>,
    pub db_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettlementConfig {
    /// Platform fee as a fraction of gross, e.g. 0.10.
    pub commission_rate: Option<Decimal>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let home = env::var("HOME").unwrap_or_else(|_| ".".into());

        let s = Config::builder()
            // 1. Global config from ~/.harvest/config.json
            .add_source(File::with_name(&format!("{}/.harvest/config", home)).required(false))
            // 2. Project config from config/config.json
            .add_source(File::with_name("config/config").required(false))
            // 3. Local overrides from config/local.json (not checked in)
            .add_source(File::with_name("config/local").required(false))
            // 4. Environment overrides, e.g. HARVEST_SETTLEMENT__COMMISSION_RATE
            .add_source(Environment::with_prefix("HARVEST").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn port(&self) -> u16 {
        self.service
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn db_path(&self) -> String {
        self.service
            .as_ref()
            .and_then(|s| s.db_path.clone())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    pub fn commission_rate(&self) -> Decimal {
        self.settlement
            .as_ref()
            .and_then(|s| s.commission_rate)
            .unwrap_or(dec!(0.10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::default();
        assert_eq!(settings.port(), DEFAULT_PORT);
        assert_eq!(settings.db_path(), DEFAULT_DB_PATH);
        assert_eq!(settings.commission_rate(), dec!(0.10));
    }

    #[test]
    fn test_explicit_sections_win() {
        let settings = Settings {
            service: Some(ServiceConfig {
                port: Some(8080),
                db_path: Some("/var/lib/harvest/settlement.redb".into()),
            }),
            settlement: Some(SettlementConfig {
                commission_rate: Some(dec!(0.15)),
            }),
        };
        assert_eq!(settings.port(), 8080);
        assert_eq!(settings.db_path(), "/var/lib/harvest/settlement.redb");
        assert_eq!(settings.commission_rate(), dec!(0.15));
    }
}
