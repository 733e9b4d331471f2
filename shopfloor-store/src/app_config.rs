use serde::Deserialize;
use std::env;

/// Built-in defaults, layered under any on-disk or environment settings
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentConfig,
    #[serde(default)]
    pub sales: SalesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on the in-memory store
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FulfillmentConfig {
    pub shipping_adjustment_sku: String,
    pub shipped_status: String,
    pub copy_note_author: String,
    pub copy_note_status: String,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            shipping_adjustment_sku: "Product".into(),
            shipped_status: "PREPARING TO SHIP!".into(),
            copy_note_author: "Shipping Dept".into(),
            copy_note_status: "Order Filled".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SalesConfig {
    pub window_days: i64,
    pub tier_thresholds: TierThresholdsConfig,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            tier_thresholds: TierThresholdsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TierThresholdsConfig {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Default for TierThresholdsConfig {
    fn default() -> Self {
        Self { a: 0.25, b: 0.50, c: 0.75, d: 1.0 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Machine-local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `SHOPFLOOR__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("SHOPFLOOR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
