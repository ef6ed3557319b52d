//! Published electricity tariff schedule.
//!
//! Base tariff only (before FT and VAT), in baht. Energy rates are baht/kWh,
//! demand rates baht/kW, service charges baht per month. MEA and PEA bill
//! from the same uniform national schedule, so each row is filed once per
//! provider under the composite key `<provider>_<class>.<scheme>.<tier>`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strum::IntoEnumIterator;

use super::catalog::{RateEntry, RateTier, TieredRates, TodRates, TouRates};
use crate::domain::Provider;

fn normal(service_charge: Decimal, tiers: &[(Decimal, Decimal)]) -> RateEntry {
    RateEntry::Normal(TieredRates {
        service_charge,
        tiers: tiers
            .iter()
            .map(|&(threshold, rate)| RateTier::new(threshold, rate))
            .collect(),
    })
}

fn tou(service_charge: Decimal, on_peak: Decimal, off_peak: Decimal) -> RateEntry {
    RateEntry::Tou(TouRates {
        service_charge,
        on_peak_energy_rate: on_peak,
        off_peak_energy_rate: off_peak,
        on_peak_demand_rate: None,
        off_peak_demand_rate: None,
    })
}

fn tou_with_demand(
    service_charge: Decimal,
    on_peak_demand: Decimal,
    on_peak: Decimal,
    off_peak: Decimal,
) -> RateEntry {
    RateEntry::Tou(TouRates {
        service_charge,
        on_peak_energy_rate: on_peak,
        off_peak_energy_rate: off_peak,
        on_peak_demand_rate: Some(on_peak_demand),
        off_peak_demand_rate: None,
    })
}

fn tod(
    service_charge: Decimal,
    on_peak_demand: Decimal,
    partial_peak_demand: Decimal,
    off_peak_demand: Decimal,
    energy: Decimal,
) -> RateEntry {
    RateEntry::Tod(TodRates {
        service_charge,
        on_peak_demand_rate: on_peak_demand,
        partial_peak_demand_rate: partial_peak_demand,
        off_peak_demand_rate: off_peak_demand,
        energy_rate: energy,
    })
}

/// Rows keyed by `<class>.<scheme>.<tier>`
fn schedule() -> Vec<(&'static str, RateEntry)> {
    // Demand-billed TOU, shared by medium/large/specific/non-profit classes
    let tou_demand_high =
        || tou_with_demand(dec!(312.24), dec!(74.14), dec!(4.1025), dec!(2.5849));
    let tou_demand_medium =
        || tou_with_demand(dec!(312.24), dec!(132.93), dec!(4.1839), dec!(2.6037));
    let tou_demand_low =
        || tou_with_demand(dec!(312.24), dec!(210.00), dec!(4.3297), dec!(2.6369));

    let tod_high = || tod(dec!(312.24), dec!(224.30), dec!(29.91), dec!(0), dec!(3.1271));
    let tod_medium = || tod(dec!(312.24), dec!(285.05), dec!(58.88), dec!(0), dec!(3.1501));
    let tod_low = || tod(dec!(312.24), dec!(332.71), dec!(68.22), dec!(0), dec!(3.1779));

    vec![
        // 1. Residential
        (
            "type-1.normal.low",
            normal(
                dec!(33.29),
                &[
                    (dec!(0), dec!(3.2484)),
                    (dec!(150), dec!(4.2218)),
                    (dec!(400), dec!(4.4217)),
                ],
            ),
        ),
        ("type-1.tou.medium", tou(dec!(312.24), dec!(5.1135), dec!(2.6037))),
        ("type-1.tou.low", tou(dec!(33.29), dec!(5.7982), dec!(2.6369))),
        // 2. Small general service
        ("type-2.tou.medium", tou(dec!(312.24), dec!(5.1135), dec!(2.6037))),
        ("type-2.tou.low", tou(dec!(33.29), dec!(5.7982), dec!(2.6369))),
        // 3. Medium general service
        ("type-3.tou.high", tou_demand_high()),
        ("type-3.tou.medium", tou_demand_medium()),
        ("type-3.tou.low", tou_demand_low()),
        ("type-3.tod.high", tod_high()),
        ("type-3.tod.medium", tod_medium()),
        ("type-3.tod.low", tod_low()),
        // 4. Large general service
        ("type-4.tou.high", tou_demand_high()),
        ("type-4.tou.medium", tou_demand_medium()),
        ("type-4.tou.low", tou_demand_low()),
        ("type-4.tod.high", tod_high()),
        ("type-4.tod.medium", tod_medium()),
        ("type-4.tod.low", tod_low()),
        // 5. Specific business
        ("type-5.tou.high", tou_demand_high()),
        ("type-5.tou.medium", tou_demand_medium()),
        ("type-5.tou.low", tou_demand_low()),
        // 6. Non-profit
        (
            "type-6.normal.high",
            normal(dec!(312.24), &[(dec!(0), dec!(3.4149))]),
        ),
        (
            "type-6.normal.medium",
            normal(dec!(312.24), &[(dec!(0), dec!(3.5849))]),
        ),
        (
            "type-6.normal.low",
            normal(dec!(20.00), &[(dec!(0), dec!(2.8013)), (dec!(10), dec!(3.8919))]),
        ),
        ("type-6.tou.high", tou_demand_high()),
        ("type-6.tou.medium", tou_demand_medium()),
        ("type-6.tou.low", tou_demand_low()),
        // 7. Agricultural water pumping
        (
            "type-7.normal.low",
            normal(dec!(115.16), &[(dec!(0), dec!(2.0889)), (dec!(100), dec!(3.2405))]),
        ),
        ("type-7.tou.medium", tou(dec!(204.07), dec!(5.1135), dec!(2.6037))),
        ("type-7.tou.low", tou(dec!(115.16), dec!(5.7982), dec!(2.6369))),
    ]
}

/// Every row of the schedule, once per provider, under its composite key
pub fn published_rows() -> Vec<(String, RateEntry)> {
    let rows = schedule();
    Provider::iter()
        .flat_map(|provider| {
            rows.iter()
                .map(move |(suffix, entry)| (format!("{provider}_{suffix}"), entry.clone()))
        })
        .collect()
}
