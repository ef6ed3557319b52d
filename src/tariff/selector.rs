//! Maps a requested tariff to its rates and the formula that prices them.

use super::catalog::{RateCatalog, RateEntry};
use super::formula::FormulaBinding;
use super::TariffError;
use crate::domain::{CustomerClass, TariffKey, TariffScheme, VoltageTier};

use CustomerClass::*;
use TariffScheme::*;
use VoltageTier::*;

const ALL_TIERS: &[VoltageTier] = &[High, Medium, Low];
const BELOW_69KV: &[VoltageTier] = &[Medium, Low];

/// Combinations offered in the published schedule, identical for both providers
const LEGAL_COMBINATIONS: &[(CustomerClass, TariffScheme, &[VoltageTier])] = &[
    (Residential, Normal, &[Low]),
    (Residential, Tou, BELOW_69KV),
    (SmallGeneral, Tou, BELOW_69KV),
    (MediumGeneral, Tou, ALL_TIERS),
    (MediumGeneral, Tod, ALL_TIERS),
    (LargeGeneral, Tou, ALL_TIERS),
    (LargeGeneral, Tod, ALL_TIERS),
    (SpecificBusiness, Tou, ALL_TIERS),
    (NonProfit, Normal, ALL_TIERS),
    (NonProfit, Tou, ALL_TIERS),
    (WaterPumping, Normal, &[Low]),
    (WaterPumping, Tou, BELOW_69KV),
];

pub fn is_legal(class: CustomerClass, scheme: TariffScheme, tier: VoltageTier) -> bool {
    LEGAL_COMBINATIONS
        .iter()
        .any(|(c, s, tiers)| *c == class && *s == scheme && tiers.contains(&tier))
}

/// A tariff key resolved against a catalog snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTariff<'a> {
    pub key: TariffKey,
    pub binding: FormulaBinding<'a>,
}

/// Pure table lookup: the combination must be offered and present in the
/// catalog, otherwise `InvalidCombination`.
pub fn resolve<'a>(
    catalog: &'a RateCatalog,
    key: &TariffKey,
) -> Result<ResolvedTariff<'a>, TariffError> {
    let invalid = || TariffError::InvalidCombination {
        provider: key.provider,
        customer_class: key.customer_class,
        tariff_scheme: key.tariff_scheme,
        voltage_tier: key.voltage_tier,
    };

    if !is_legal(key.customer_class, key.tariff_scheme, key.voltage_tier) {
        return Err(invalid());
    }

    let binding = match catalog.lookup(key).ok_or_else(invalid)? {
        RateEntry::Normal(rates) => FormulaBinding::TieredNormal(rates),
        RateEntry::Tou(rates) => FormulaBinding::TimeOfUse(rates),
        RateEntry::Tod(rates) => FormulaBinding::TimeOfDay(rates),
    };

    Ok(ResolvedTariff { key: *key, binding })
}
