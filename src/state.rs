use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::tariff::{RateCatalog, TariffEngine};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TariffEngine>,
    /// Ft used when a request leaves it out
    pub default_ft_rate: Decimal,
}

impl AppState {
    /// Build the engine over the published schedule. A corrupt catalog is
    /// fatal here, before the listener binds.
    pub fn new(cfg: &Config) -> Result<Self> {
        let catalog = RateCatalog::published()?;
        let engine = Arc::new(TariffEngine::new(catalog, cfg.billing.assembler()?));
        let default_ft_rate = cfg.billing.default_ft_rate()?;

        info!(
            combinations = engine.catalog().len(),
            %default_ft_rate,
            "tariff engine ready"
        );

        Ok(Self {
            engine,
            default_ft_rate,
        })
    }
}
