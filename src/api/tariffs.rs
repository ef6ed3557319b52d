//! Bill calculation and catalog endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::info;

use super::{error::ApiError, response::ApiResponse};
use crate::domain::{CustomerClass, Provider, TariffKey, TariffScheme, UsageRecord, VoltageTier};
use crate::state::AppState;
use crate::tariff::{BillBreakdown, FormulaVariant, RateEntry};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub provider: Provider,
    pub customer_class: CustomerClass,
    pub tariff_scheme: TariffScheme,
    pub voltage_tier: VoltageTier,
    /// Metered figures, read leniently so a bad value is reported by field
    #[serde(default)]
    pub usage: Map<String, Value>,
    /// Ft in satang/kWh; the configured default applies when absent
    pub ft_rate_satang: Option<Decimal>,
}

impl CalculateRequest {
    pub fn key(&self) -> TariffKey {
        TariffKey::new(
            self.provider,
            self.customer_class,
            self.tariff_scheme,
            self.voltage_tier,
        )
    }
}

/// POST /api/v1/calculate
pub async fn calculate(
    State(st): State<AppState>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<ApiResponse<BillBreakdown>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let key = req.key();
    let usage = UsageRecord::from_json(&req.usage)?;
    let ft_rate = req.ft_rate_satang.unwrap_or(st.default_ft_rate);

    let started = Instant::now();
    let bill = st.engine.calculate(&key, &usage, ft_rate)?;
    let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    info!(%key, total = %bill.total_amount, elapsed_us, "bill calculated");
    Ok(ApiResponse::success(bill).with_duration_us(elapsed_us))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub provider: Option<Provider>,
    pub customer_class: Option<CustomerClass>,
    pub tariff_scheme: Option<TariffScheme>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedTariff {
    pub key: TariffKey,
    pub provider: Provider,
    pub customer_class: CustomerClass,
    pub tariff_scheme: TariffScheme,
    pub voltage_tier: VoltageTier,
    /// Voltage bracket as the provider quotes it
    pub voltage_bracket: &'static str,
    pub formula: FormulaVariant,
    pub bills_demand: bool,
}

impl SupportedTariff {
    fn new(key: TariffKey, entry: &RateEntry) -> Self {
        let bills_demand = match entry {
            RateEntry::Normal(_) => false,
            RateEntry::Tou(rates) => rates.bills_demand(),
            RateEntry::Tod(_) => true,
        };
        Self {
            key,
            provider: key.provider,
            customer_class: key.customer_class,
            tariff_scheme: key.tariff_scheme,
            voltage_tier: key.voltage_tier,
            voltage_bracket: key.voltage_tier.bracket(key.provider),
            formula: entry.formula_variant(),
            bills_demand,
        }
    }
}

/// GET /api/v1/tariffs
pub async fn list_tariffs(
    State(st): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResponse<Vec<SupportedTariff>> {
    let catalog = st.engine.catalog();
    let tariffs: Vec<SupportedTariff> = catalog
        .iter()
        .filter(|(k, _)| q.provider.map_or(true, |p| k.provider == p))
        .filter(|(k, _)| q.customer_class.map_or(true, |c| k.customer_class == c))
        .filter(|(k, _)| q.tariff_scheme.map_or(true, |s| k.tariff_scheme == s))
        .map(|(k, entry)| SupportedTariff::new(*k, entry))
        .collect();

    let count = tariffs.len();
    ApiResponse::success(tariffs).with_count(count)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffDetail {
    pub key: TariffKey,
    pub formula: FormulaVariant,
    pub rates: RateEntry,
}

/// GET /api/v1/tariffs/:key
pub async fn get_tariff(
    State(st): State<AppState>,
    Path(raw): Path<String>,
) -> Result<ApiResponse<TariffDetail>, ApiError> {
    let key: TariffKey = raw.parse()?;
    let catalog = st.engine.catalog();
    let entry = catalog
        .lookup(&key)
        .ok_or_else(|| ApiError::NotFound(format!("tariff {key}")))?;

    Ok(ApiResponse::success(TariffDetail {
        key,
        formula: entry.formula_variant(),
        rates: entry.clone(),
    }))
}
