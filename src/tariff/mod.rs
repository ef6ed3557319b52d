//! Tariff calculation engine
//!
//! - `catalog`: immutable rate table, validated on construction
//! - `rates`: the built-in published schedule
//! - `selector`: legal combinations and key → formula binding
//! - `formula`: block-rate, TOU and TOD charge formulas
//! - `assembler`: surcharges, Ft, VAT and rounding

pub mod assembler;
pub mod bill;
pub mod catalog;
pub mod error;
pub mod formula;
pub mod rates;
pub mod selector;

pub use assembler::*;
pub use bill::*;
pub use catalog::*;
pub use error::*;
pub use formula::*;
pub use selector::*;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{TariffKey, UsageRecord};

/// Entry point for bill calculation.
///
/// Holds the current catalog snapshot. Calculations clone the `Arc` and work
/// against that snapshot, so a concurrent [`TariffEngine::reload`] never
/// changes rates under an in-flight bill.
pub struct TariffEngine {
    catalog: RwLock<Arc<RateCatalog>>,
    assembler: BillAssembler,
}

impl TariffEngine {
    pub fn new(catalog: RateCatalog, assembler: BillAssembler) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            assembler,
        }
    }

    /// Engine over the published schedule with default bill policy
    pub fn published() -> Result<Self, TariffError> {
        Ok(Self::new(RateCatalog::published()?, BillAssembler::default()))
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<RateCatalog> {
        self.catalog.read().clone()
    }

    /// Publish a new catalog. In-flight calculations keep their snapshot.
    pub fn reload(&self, catalog: RateCatalog) {
        let entries = catalog.len();
        *self.catalog.write() = Arc::new(catalog);
        debug!(entries, "rate catalog swapped");
    }

    /// Compute a bill. Either a complete breakdown or an error, never partial.
    #[instrument(skip(self, key, usage), fields(key = %key))]
    pub fn calculate(
        &self,
        key: &TariffKey,
        usage: &UsageRecord,
        ft_rate_satang: Decimal,
    ) -> Result<BillBreakdown, TariffError> {
        let catalog = self.catalog();
        let result = resolve(&catalog, key).and_then(|resolved| {
            let charges = resolved.binding.evaluate(usage)?;
            debug!(
                energy = %charges.energy_charge,
                demand = %charges.demand_charge,
                service = %charges.service_charge,
                "formula evaluated"
            );
            let raw = self.assembler.assemble(
                &charges,
                ft_rate_satang,
                usage.peak_kvar,
                usage.prior_max_demand_charge,
            )?;
            Ok(raw.finish(resolved.key, resolved.binding.variant()))
        });

        if let Err(e) = &result {
            warn!(error = %e, "bill calculation rejected");
        }
        result
    }

    /// Every key in the current catalog, in listing order
    pub fn list_supported_combinations(&self) -> Vec<TariffKey> {
        self.catalog().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerClass, Provider, TariffScheme, VoltageTier};
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::thread;

    fn key(raw: &str) -> TariffKey {
        raw.parse().unwrap()
    }

    #[test]
    fn test_residential_500_kwh() {
        let engine = TariffEngine::published().unwrap();
        let bill = engine
            .calculate(
                &key("mea_type-1.normal.low"),
                &UsageRecord::normal(dec!(500)),
                dec!(0),
            )
            .unwrap();
        assert_eq!(bill.energy_charge, dec!(1984.88));
        assert_eq!(bill.service_charge, dec!(33.29));
        assert_eq!(bill.demand_charge, dec!(0));
        assert_eq!(bill.formula, FormulaVariant::TieredNormal);
    }

    #[test]
    fn test_small_tou_scenario() {
        let engine = TariffEngine::published().unwrap();
        let bill = engine
            .calculate(
                &key("pea_type-2.tou.low"),
                &UsageRecord::tou(dec!(100), dec!(200)),
                dec!(0),
            )
            .unwrap();
        assert_eq!(bill.energy_charge.to_string(), "1107.20");
        assert_eq!(bill.subtotal.to_string(), "1140.49");
        assert_eq!(bill.tax.to_string(), "79.83");
        assert_eq!(bill.total_amount.to_string(), "1220.32");
    }

    #[test]
    fn test_small_general_normal_rejected() {
        let engine = TariffEngine::published().unwrap();
        let err = engine
            .calculate(
                &TariffKey::new(
                    Provider::Mea,
                    CustomerClass::SmallGeneral,
                    TariffScheme::Normal,
                    VoltageTier::Low,
                ),
                &UsageRecord::normal(dec!(100)),
                dec!(0),
            )
            .unwrap_err();
        assert!(matches!(err, TariffError::InvalidCombination { .. }));
    }

    #[test]
    fn test_negative_usage_rejected() {
        let engine = TariffEngine::published().unwrap();
        let err = engine
            .calculate(
                &key("mea_type-1.normal.low"),
                &UsageRecord::normal(dec!(-10)),
                dec!(0),
            )
            .unwrap_err();
        assert_eq!(err.field(), Some("totalKwh"));
    }

    #[test]
    fn test_tou_reactive_allowance_uses_largest_window() {
        let engine = TariffEngine::published().unwrap();
        let usage = UsageRecord::tou(dec!(1000), dec!(3000))
            .with_on_peak_kw(dec!(10))
            .with_off_peak_kw(dec!(200))
            .with_peak_kvar(dec!(100));
        let bill = engine
            .calculate(&key("mea_type-4.tou.low"), &usage, dec!(0))
            .unwrap();

        // 200 kW × 0.6197 leaves 123.94 kVAR free
        assert_eq!(bill.reactive_power_charge, dec!(0));
        assert_eq!(bill.demand_charge, dec!(2100.00));

        let bill = engine
            .calculate(
                &key("mea_type-4.tou.low"),
                &usage.clone().with_peak_kvar(dec!(130)),
                dec!(0),
            )
            .unwrap();
        // 6.06 kVAR over at 56.07
        assert_eq!(bill.reactive_power_charge, dec!(339.78));
    }

    #[rstest]
    #[case("mea_type-1.normal.low", UsageRecord::normal(Decimal::MAX), "totalKwh")]
    #[case("mea_type-1.tou.low", UsageRecord::tou(Decimal::MAX, dec!(0)), "onPeakKwh")]
    #[case(
        "mea_type-4.tou.low",
        UsageRecord::tou(dec!(0), dec!(0)).with_on_peak_kw(Decimal::MAX / dec!(100)),
        "onPeakKw"
    )]
    #[case(
        "mea_type-4.tod.low",
        UsageRecord::tod(dec!(1), Decimal::MAX / dec!(100), dec!(0), dec!(0)),
        "onPeakKw"
    )]
    #[case(
        "pea_type-3.tod.high",
        UsageRecord::tod(dec!(1), dec!(1), dec!(1), dec!(1)).with_peak_kvar(Decimal::MAX),
        "peakKvar"
    )]
    fn test_out_of_range_usage_is_an_error(
        #[case] raw: &str,
        #[case] usage: UsageRecord,
        #[case] field: &str,
    ) {
        let engine = TariffEngine::published().unwrap();
        let err = engine.calculate(&key(raw), &usage, dec!(40)).unwrap_err();
        assert_eq!(
            err,
            TariffError::AmountOverflow {
                field: field.to_string()
            }
        );
    }

    #[test]
    fn test_list_is_ordered() {
        let engine = TariffEngine::published().unwrap();
        let keys = engine.list_supported_combinations();
        assert_eq!(keys.len(), engine.catalog().len());
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(keys[0].to_string(), "mea_type-1.normal.low");
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let engine = TariffEngine::published().unwrap();
        let before = engine.catalog();

        let rows = before
            .iter()
            .filter(|(k, _)| k.provider == Provider::Pea)
            .map(|(k, e)| (*k, e.clone()));
        engine.reload(RateCatalog::from_entries(rows).unwrap());

        // Old snapshot untouched, new one only has PEA rows
        assert!(before.lookup(&key("mea_type-1.normal.low")).is_some());
        assert!(engine
            .list_supported_combinations()
            .iter()
            .all(|k| k.provider == Provider::Pea));
        assert!(matches!(
            engine.calculate(
                &key("mea_type-1.normal.low"),
                &UsageRecord::normal(dec!(1)),
                dec!(0)
            ),
            Err(TariffError::InvalidCombination { .. })
        ));
    }

    #[test]
    fn test_concurrent_calculations_agree() {
        let engine = Arc::new(TariffEngine::published().unwrap());
        let usage = UsageRecord::tod(dec!(50000), dec!(300), dec!(280), dec!(150))
            .with_peak_kvar(dec!(250))
            .with_prior_max_demand_charge(dec!(90000));
        let expected = engine
            .calculate(&key("pea_type-4.tod.low"), &usage, dec!(39.72))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let usage = usage.clone();
                thread::spawn(move || {
                    engine
                        .calculate(&key("pea_type-4.tod.low"), &usage, dec!(39.72))
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    proptest! {
        #[test]
        fn prop_calculate_is_idempotent(kwh in 0u32..100_000, ft in 0u32..10_000) {
            let engine = TariffEngine::published().unwrap();
            let usage = UsageRecord::normal(Decimal::from(kwh));
            let ft = Decimal::new(ft as i64, 2);
            let a = engine.calculate(&key("pea_type-6.normal.low"), &usage, ft).unwrap();
            let b = engine.calculate(&key("pea_type-6.normal.low"), &usage, ft).unwrap();
            prop_assert_eq!(
                serde_json::to_vec(&a).unwrap(),
                serde_json::to_vec(&b).unwrap()
            );
        }
    }
}
