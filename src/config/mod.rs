use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub paymongo: PayMongoConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub subscription: SubscriptionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayMongoConfig {
    #[serde(default)]
    pub enabled: bool,
    pub secret_key: Option<String>,
    /// When unset, webhook signatures are not checked.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_paymongo_base_url")]
    pub api_base_url: String,
    pub success_redirect_url: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for PayMongoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: None,
            webhook_secret: None,
            api_base_url: default_paymongo_base_url(),
            success_redirect_url: None,
            currency: default_currency(),
        }
    }
}

fn default_paymongo_base_url() -> String {
    "https://api.paymongo.com/v1".to_string()
}

fn default_currency() -> String {
    "PHP".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    pub pending_payment_timeout_minutes: i64,
    pub sweep_interval_seconds: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub agency_daily_rate: Decimal,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            pending_payment_timeout_minutes: 30,
            sweep_interval_seconds: 300,
            agency_daily_rate: Decimal::new(100000, 2),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SubscriptionConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub yearly_price: Decimal,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            yearly_price: Decimal::new(150000, 2),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://localynk.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("paymongo.enabled", false)?
            .set_default("booking.pending_payment_timeout_minutes", 30)?
            .set_default("booking.sweep_interval_seconds", 300)?
            .set_default("booking.agency_daily_rate", "1000.00")?
            .set_default("subscription.yearly_price", "1500.00")?

            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // LOCALYNK__PAYMONGO__SECRET_KEY -> paymongo.secret_key
            .add_source(Environment::with_prefix("LOCALYNK").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://localynk.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            paymongo: PayMongoConfig::default(),
            booking: BookingConfig::default(),
            subscription: SubscriptionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_business_constants() {
        let settings = Settings::default();
        assert_eq!(settings.booking.pending_payment_timeout_minutes, 30);
        assert_eq!(settings.booking.agency_daily_rate.to_string(), "1000.00");
        assert_eq!(settings.paymongo.currency, "PHP");
        assert!(!settings.paymongo.enabled);
    }
}
