use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::formula::FormulaVariant;
use super::selector::is_legal;
use super::TariffError;
use crate::domain::{TariffKey, TariffScheme};

// ============================================================================
// Rate Entries
// ============================================================================

/// One block of a progressive energy schedule.
///
/// The block runs from `threshold_kwh` up to the next block's threshold; the
/// last block is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateTier {
    pub threshold_kwh: Decimal,
    pub rate_per_kwh: Decimal,
}

impl RateTier {
    pub fn new(threshold_kwh: Decimal, rate_per_kwh: Decimal) -> Self {
        Self {
            threshold_kwh,
            rate_per_kwh,
        }
    }
}

/// Normal scheme: block rate energy, no demand billing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredRates {
    pub service_charge: Decimal,
    pub tiers: Vec<RateTier>,
}

/// Time-of-use scheme.
///
/// Demand is billed per window only where a rate is configured; the published
/// schedule leaves off-peak demand unbilled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouRates {
    pub service_charge: Decimal,
    pub on_peak_energy_rate: Decimal,
    pub off_peak_energy_rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_peak_demand_rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_peak_demand_rate: Option<Decimal>,
}

impl TouRates {
    pub fn bills_demand(&self) -> bool {
        self.on_peak_demand_rate.is_some() || self.off_peak_demand_rate.is_some()
    }
}

/// Time-of-day scheme: three demand windows plus flat energy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodRates {
    pub service_charge: Decimal,
    pub on_peak_demand_rate: Decimal,
    pub partial_peak_demand_rate: Decimal,
    pub off_peak_demand_rate: Decimal,
    pub energy_rate: Decimal,
}

/// Numeric tariff parameters for one tariff key, shaped by scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum RateEntry {
    Normal(TieredRates),
    Tou(TouRates),
    Tod(TodRates),
}

impl RateEntry {
    pub fn scheme(&self) -> TariffScheme {
        match self {
            Self::Normal(_) => TariffScheme::Normal,
            Self::Tou(_) => TariffScheme::Tou,
            Self::Tod(_) => TariffScheme::Tod,
        }
    }

    pub fn formula_variant(&self) -> FormulaVariant {
        match self {
            Self::Normal(_) => FormulaVariant::TieredNormal,
            Self::Tou(_) => FormulaVariant::TimeOfUse,
            Self::Tod(_) => FormulaVariant::TimeOfDay,
        }
    }

    pub fn service_charge(&self) -> Decimal {
        match self {
            Self::Normal(r) => r.service_charge,
            Self::Tou(r) => r.service_charge,
            Self::Tod(r) => r.service_charge,
        }
    }

    /// Validate rates for consistency
    pub fn validate(&self) -> Result<(), String> {
        let non_negative = |name: &str, value: Decimal| {
            if value.is_sign_negative() && !value.is_zero() {
                Err(format!("{name} is negative: {value}"))
            } else {
                Ok(())
            }
        };

        non_negative("service_charge", self.service_charge())?;

        match self {
            Self::Normal(r) => {
                let Some(first) = r.tiers.first() else {
                    return Err("tier list is empty".to_string());
                };
                if !first.threshold_kwh.is_zero() {
                    return Err(format!(
                        "first tier must start at 0 kWh, starts at {}",
                        first.threshold_kwh
                    ));
                }
                for tier in &r.tiers {
                    non_negative("rate_per_kwh", tier.rate_per_kwh)?;
                }
                for (lower, upper) in r.tiers.iter().tuple_windows() {
                    if upper.threshold_kwh <= lower.threshold_kwh {
                        return Err(format!(
                            "tier thresholds must strictly increase: {} then {}",
                            lower.threshold_kwh, upper.threshold_kwh
                        ));
                    }
                }
            }
            Self::Tou(r) => {
                non_negative("on_peak_energy_rate", r.on_peak_energy_rate)?;
                non_negative("off_peak_energy_rate", r.off_peak_energy_rate)?;
                if let Some(rate) = r.on_peak_demand_rate {
                    non_negative("on_peak_demand_rate", rate)?;
                }
                if let Some(rate) = r.off_peak_demand_rate {
                    non_negative("off_peak_demand_rate", rate)?;
                }
            }
            Self::Tod(r) => {
                non_negative("on_peak_demand_rate", r.on_peak_demand_rate)?;
                non_negative("partial_peak_demand_rate", r.partial_peak_demand_rate)?;
                non_negative("off_peak_demand_rate", r.off_peak_demand_rate)?;
                non_negative("energy_rate", r.energy_rate)?;
            }
        }

        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Immutable mapping from tariff key to rates.
///
/// Only constructible through [`RateCatalog::from_entries`], so every live
/// catalog has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RateCatalog {
    entries: BTreeMap<TariffKey, RateEntry>,
}

impl RateCatalog {
    /// Build and validate a catalog. Any malformed row fails the whole load.
    pub fn from_entries(
        rows: impl IntoIterator<Item = (TariffKey, RateEntry)>,
    ) -> Result<Self, TariffError> {
        let mut entries = BTreeMap::new();

        for (key, entry) in rows {
            let corrupt = |reason: String| TariffError::CatalogIntegrity {
                key: key.to_string(),
                reason,
            };

            if entry.scheme() != key.tariff_scheme {
                return Err(corrupt(format!(
                    "{} rates filed under scheme '{}'",
                    entry.scheme(),
                    key.tariff_scheme
                )));
            }
            if !is_legal(key.customer_class, key.tariff_scheme, key.voltage_tier) {
                return Err(corrupt("combination is not offered".to_string()));
            }
            entry.validate().map_err(corrupt)?;

            if entries.insert(key, entry).is_some() {
                return Err(corrupt("duplicate entry".to_string()));
            }
        }

        Ok(Self { entries })
    }

    /// The built-in published schedule
    pub fn published() -> Result<Self, TariffError> {
        let rows = super::rates::published_rows()
            .into_iter()
            .map(|(raw, entry)| raw.parse::<TariffKey>().map(|key| (key, entry)))
            .collect::<Result<Vec<_>, _>>()?;
        let catalog = Self::from_entries(rows)?;
        info!(entries = catalog.len(), "loaded published rate catalog");
        Ok(catalog)
    }

    pub fn lookup(&self, key: &TariffKey) -> Option<&RateEntry> {
        self.entries.get(key)
    }

    /// Keys in provider, class, scheme, tier order
    pub fn keys(&self) -> impl Iterator<Item = &TariffKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TariffKey, &RateEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn residential_rates() -> RateEntry {
        RateEntry::Normal(TieredRates {
            service_charge: dec!(33.29),
            tiers: vec![
                RateTier::new(dec!(0), dec!(3.2484)),
                RateTier::new(dec!(150), dec!(4.2218)),
                RateTier::new(dec!(400), dec!(4.4217)),
            ],
        })
    }

    fn key(raw: &str) -> TariffKey {
        raw.parse().unwrap()
    }

    #[test]
    fn test_published_catalog_is_valid() {
        let catalog = RateCatalog::published().unwrap();
        assert!(!catalog.is_empty());
        for (_, entry) in catalog.iter() {
            assert!(entry.validate().is_ok());
        }
    }

    #[test]
    fn test_lookup() {
        let catalog =
            RateCatalog::from_entries([(key("mea_type-1.normal.low"), residential_rates())])
                .unwrap();
        assert!(catalog.lookup(&key("mea_type-1.normal.low")).is_some());
        assert!(catalog.lookup(&key("pea_type-1.normal.low")).is_none());
    }

    #[test]
    fn test_rejects_non_monotonic_tiers() {
        let entry = RateEntry::Normal(TieredRates {
            service_charge: dec!(8.19),
            tiers: vec![
                RateTier::new(dec!(0), dec!(2.3488)),
                RateTier::new(dec!(150), dec!(2.9882)),
                RateTier::new(dec!(150), dec!(3.2405)),
            ],
        });
        let err =
            RateCatalog::from_entries([(key("mea_type-1.normal.low"), entry)]).unwrap_err();
        assert!(matches!(err, TariffError::CatalogIntegrity { .. }));
    }

    #[test]
    fn test_rejects_first_tier_above_zero() {
        let entry = RateEntry::Normal(TieredRates {
            service_charge: dec!(8.19),
            tiers: vec![RateTier::new(dec!(15), dec!(2.3488))],
        });
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_rate() {
        let entry = RateEntry::Tod(TodRates {
            service_charge: dec!(312.24),
            on_peak_demand_rate: dec!(224.30),
            partial_peak_demand_rate: dec!(-29.91),
            off_peak_demand_rate: dec!(0),
            energy_rate: dec!(3.1271),
        });
        let err =
            RateCatalog::from_entries([(key("pea_type-4.tod.high"), entry)]).unwrap_err();
        match err {
            TariffError::CatalogIntegrity { key, reason } => {
                assert_eq!(key, "pea_type-4.tod.high");
                assert!(reason.contains("partial_peak_demand_rate"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_shape_mismatch() {
        let err = RateCatalog::from_entries([(key("mea_type-1.tou.low"), residential_rates())])
            .unwrap_err();
        assert!(matches!(err, TariffError::CatalogIntegrity { .. }));
    }

    #[test]
    fn test_rejects_illegal_combination() {
        let err = RateCatalog::from_entries([(key("mea_type-2.normal.low"), residential_rates())])
            .unwrap_err();
        assert!(matches!(err, TariffError::CatalogIntegrity { .. }));
    }

    #[test]
    fn test_rejects_duplicates() {
        let rows = [
            (key("mea_type-1.normal.low"), residential_rates()),
            (key("mea_type-1.normal.low"), residential_rates()),
        ];
        assert!(RateCatalog::from_entries(rows).is_err());
    }

    #[test]
    fn test_entry_serialization_is_tagged() {
        let json = serde_json::to_value(residential_rates()).unwrap();
        assert_eq!(json["scheme"], "normal");
        assert_eq!(json["service_charge"], "33.29");
    }
}
