use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use validator::Validate;

use crate::tariff::{BillAssembler, PolicyTable, SurchargePolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub billing: BillingConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Fallback filter when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,hyper=warn,tower_http=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_cors: bool,
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 10,
            enable_cors: false,
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BillingConfig {
    /// Ft applied when a request does not carry one (satang/kWh)
    #[validate(range(min = 0.0))]
    pub default_ft_rate_satang: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub ratchet_percent: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub reactive_threshold: f64,
    #[validate(range(min = 0.0))]
    pub reactive_rate: f64,
    #[serde(default)]
    pub policy: PolicyTable,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_ft_rate_satang: 39.72,
            ratchet_percent: 70.0,
            reactive_threshold: 0.6197,
            reactive_rate: 56.07,
            policy: PolicyTable::default(),
        }
    }
}

fn to_decimal(name: &str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .with_context(|| format!("billing.{name} is not representable: {value}"))
}

impl BillingConfig {
    pub fn default_ft_rate(&self) -> Result<Decimal> {
        to_decimal("default_ft_rate_satang", self.default_ft_rate_satang)
    }

    pub fn surcharges(&self) -> Result<SurchargePolicy> {
        Ok(SurchargePolicy {
            ratchet_percent: to_decimal("ratchet_percent", self.ratchet_percent)?,
            reactive_threshold: to_decimal("reactive_threshold", self.reactive_threshold)?,
            reactive_rate: to_decimal("reactive_rate", self.reactive_rate)?,
        })
    }

    pub fn assembler(&self) -> Result<BillAssembler> {
        Ok(BillAssembler::new(self.policy, self.surcharges()?))
    }
}

impl Config {
    /// Built-in defaults, then `config/default.toml`, then `TARIFF__*` env vars
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("TARIFF__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.billing
            .validate()
            .context("invalid billing configuration")?;
        Ok(cfg)
    }
}
