use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub market: MarketConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Market policy: the tick grid and the quote-asset whitelist. A pair is
/// tradeable only when its quote asset appears in `quote_assets`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MarketConfig {
    pub price_tick: f64,
    pub amount_tick: f64,
    pub quote_assets: Vec<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            price_tick: 0.01,
            amount_tick: 0.000_000_01,
            quote_assets: vec!["BRL".to_string()],
        }
    }
}

impl AppConfig {
    /// Load config from YAML file based on environment
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config: Self =
            serde_yaml::from_str(&content).context("Failed to parse config yaml")?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// Environment variables take precedence over YAML config.
    /// Format: MB_<SECTION>_<FIELD> (uppercase with underscores)
    ///
    /// Supported overrides:
    /// - MB_GATEWAY_HOST: Gateway host (String)
    /// - MB_GATEWAY_PORT: Gateway port (u16)
    /// - MB_LOG_LEVEL: Log level (trace/debug/info/warn/error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MB_GATEWAY_HOST") {
            tracing::info!("Config override: gateway.host = {} (from MB_GATEWAY_HOST)", host);
            self.gateway.host = host;
        }
        if let Ok(port) = std::env::var("MB_GATEWAY_PORT")
            && let Ok(p) = port.parse::<u16>()
        {
            tracing::info!("Config override: gateway.port = {} (from MB_GATEWAY_PORT)", p);
            self.gateway.port = p;
        }
        if let Ok(level) = std::env::var("MB_LOG_LEVEL") {
            tracing::info!("Config override: log_level = {} (from MB_LOG_LEVEL)", level);
            self.log_level = level;
        }
    }

    /// Validate configuration at startup
    ///
    /// Returns an error if any critical configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.port == 0 {
            anyhow::bail!("Invalid gateway.port: must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log_level '{}': must be one of {:?}",
                self.log_level,
                valid_levels
            );
        }

        if self.market.price_tick <= 0.0 {
            anyhow::bail!("Invalid market.price_tick: must be > 0");
        }
        if self.market.amount_tick <= 0.0 {
            anyhow::bail!("Invalid market.amount_tick: must be > 0");
        }
        if self.market.quote_assets.is_empty() {
            anyhow::bail!("Invalid market.quote_assets: at least one quote asset required");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            log_level: "info".to_string(),
            log_dir: "./logs".to_string(),
            log_file: "matchbook.log".to_string(),
            use_json: false,
            rotation: "daily".to_string(),
            enable_tracing: true,
            gateway: GatewayConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            market: MarketConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let mut config = base_config();
        config.gateway.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = base_config();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_ticks() {
        let mut config = base_config();
        config.market.price_tick = 0.0;
        assert!(config.validate().is_err());

        let mut config = base_config();
        config.market.amount_tick = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_quote_whitelist() {
        let mut config = base_config();
        config.market.quote_assets.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_market_defaults() {
        let market = MarketConfig::default();
        assert_eq!(market.price_tick, 0.01);
        assert_eq!(market.amount_tick, 0.000_000_01);
        assert_eq!(market.quote_assets, vec!["BRL".to_string()]);
    }
}
