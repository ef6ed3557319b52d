//! Charge formulas, one per billing scheme.
//!
//! Every function here is pure over exact decimals. Usage is validated and
//! extracted before any of the arithmetic below runs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::bill::{BillLine, LineUnit};
use super::catalog::{RateTier, TieredRates, TodRates, TouRates};
use super::TariffError;
use crate::domain::{UsageField, UsageRecord};

/// Which of the three formulas a rate entry is priced with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FormulaVariant {
    TieredNormal,
    TimeOfUse,
    TimeOfDay,
}

// ============================================================================
// Formulas
// ============================================================================

/// Split usage across blocks in threshold order.
///
/// Returns `(tier, billed_kwh)` for every tier that bills a non-zero quantity.
/// The last tier takes whatever remains.
pub fn split_into_tiers(total_kwh: Decimal, tiers: &[RateTier]) -> Vec<(RateTier, Decimal)> {
    let mut remaining = total_kwh;
    let mut billed = Vec::with_capacity(tiers.len());

    for (i, tier) in tiers.iter().enumerate() {
        if remaining <= Decimal::ZERO {
            break;
        }
        let quantity = match tiers.get(i + 1) {
            Some(next) => remaining.min(next.threshold_kwh - tier.threshold_kwh),
            None => remaining,
        };
        billed.push((*tier, quantity));
        remaining -= quantity;
    }

    billed
}

pub fn compute_tiered_energy_charge(
    total_kwh: Decimal,
    tiers: &[RateTier],
) -> Result<Decimal, TariffError> {
    split_into_tiers(total_kwh, tiers)
        .iter()
        .try_fold(Decimal::ZERO, |acc, (tier, quantity)| {
            checked_add("totalKwh", acc, checked_mul("totalKwh", *quantity, tier.rate_per_kwh)?)
        })
}

pub fn compute_tou_energy_charge(
    on_peak_kwh: Decimal,
    off_peak_kwh: Decimal,
    on_peak_rate: Decimal,
    off_peak_rate: Decimal,
) -> Result<Decimal, TariffError> {
    checked_add(
        "energyCharge",
        checked_mul("onPeakKwh", on_peak_kwh, on_peak_rate)?,
        checked_mul("offPeakKwh", off_peak_kwh, off_peak_rate)?,
    )
}

/// Demand billed under TOU: each window only where the entry prices it
pub fn compute_tou_demand_charge(
    on_peak_kw: Option<Decimal>,
    off_peak_kw: Option<Decimal>,
    rates: &TouRates,
) -> Result<Decimal, TariffError> {
    let window = |field: &str, kw: Option<Decimal>, rate: Option<Decimal>| match (kw, rate) {
        (Some(kw), Some(rate)) => checked_mul(field, kw, rate),
        _ => Ok(Decimal::ZERO),
    };
    checked_add(
        "demandCharge",
        window("onPeakKw", on_peak_kw, rates.on_peak_demand_rate)?,
        window("offPeakKw", off_peak_kw, rates.off_peak_demand_rate)?,
    )
}

pub fn compute_tod_demand_charge(
    on_peak_kw: Decimal,
    partial_peak_kw: Decimal,
    off_peak_kw: Decimal,
    on_peak_rate: Decimal,
    partial_peak_rate: Decimal,
    off_peak_rate: Decimal,
) -> Result<Decimal, TariffError> {
    let on = checked_mul("onPeakKw", on_peak_kw, on_peak_rate)?;
    let partial = checked_mul("partialPeakKw", partial_peak_kw, partial_peak_rate)?;
    let off = checked_mul("offPeakKw", off_peak_kw, off_peak_rate)?;
    checked_add("demandCharge", checked_add("demandCharge", on, partial)?, off)
}

pub fn compute_flat_energy_charge(
    total_kwh: Decimal,
    energy_rate: Decimal,
) -> Result<Decimal, TariffError> {
    checked_mul("totalKwh", total_kwh, energy_rate)
}

/// `a × b`, or `AmountOverflow` naming the input that pushed it out of range
pub(crate) fn checked_mul(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, TariffError> {
    a.checked_mul(b).ok_or_else(|| overflow(field))
}

pub(crate) fn checked_add(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, TariffError> {
    a.checked_add(b).ok_or_else(|| overflow(field))
}

fn overflow(field: &str) -> TariffError {
    TariffError::AmountOverflow {
        field: field.to_string(),
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Rates bound to the formula that prices them
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormulaBinding<'a> {
    TieredNormal(&'a TieredRates),
    TimeOfUse(&'a TouRates),
    TimeOfDay(&'a TodRates),
}

/// Pre-surcharge charges produced by a formula
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeComponents {
    pub variant: FormulaVariant,
    pub energy_charge: Decimal,
    pub demand_charge: Decimal,
    pub service_charge: Decimal,
    pub total_kwh: Decimal,
    /// Largest billed demand window, used for the reactive power allowance
    pub peak_kw: Decimal,
    pub bills_demand: bool,
    pub lines: Vec<BillLine>,
}

impl FormulaBinding<'_> {
    pub fn variant(&self) -> FormulaVariant {
        match self {
            Self::TieredNormal(_) => FormulaVariant::TieredNormal,
            Self::TimeOfUse(_) => FormulaVariant::TimeOfUse,
            Self::TimeOfDay(_) => FormulaVariant::TimeOfDay,
        }
    }

    pub fn service_charge(&self) -> Decimal {
        match self {
            Self::TieredNormal(r) => r.service_charge,
            Self::TimeOfUse(r) => r.service_charge,
            Self::TimeOfDay(r) => r.service_charge,
        }
    }

    /// Fields this formula cannot price without
    pub fn required_fields(&self) -> Vec<UsageField> {
        match self {
            Self::TieredNormal(_) => vec![UsageField::TotalKwh],
            Self::TimeOfUse(r) => {
                let mut fields = vec![UsageField::OnPeakKwh, UsageField::OffPeakKwh];
                if r.on_peak_demand_rate.is_some() {
                    fields.push(UsageField::OnPeakKw);
                }
                if r.off_peak_demand_rate.is_some() {
                    fields.push(UsageField::OffPeakKw);
                }
                fields
            }
            Self::TimeOfDay(_) => vec![
                UsageField::TotalKwh,
                UsageField::OnPeakKw,
                UsageField::PartialPeakKw,
                UsageField::OffPeakKw,
            ],
        }
    }

    /// Price the usage. Fails on the first missing or negative input,
    /// before any charge is computed. Charges are priced ahead of their
    /// breakdown lines, so a line never holds an amount that overflowed.
    pub fn evaluate(&self, usage: &UsageRecord) -> Result<ChargeComponents, TariffError> {
        usage.check_magnitudes()?;
        for field in self.required_fields() {
            usage.require(field)?;
        }

        let service_charge = self.service_charge();
        let service_line = BillLine {
            label: "Service charge".to_string(),
            quantity: Some(Decimal::ONE),
            unit: Some(LineUnit::Month),
            rate: Some(service_charge),
            amount: service_charge,
        };

        let components = match self {
            Self::TieredNormal(rates) => {
                let total_kwh = usage.require(UsageField::TotalKwh)?;
                let energy_charge = compute_tiered_energy_charge(total_kwh, &rates.tiers)?;

                let mut lines: Vec<BillLine> = split_into_tiers(total_kwh, &rates.tiers)
                    .into_iter()
                    .enumerate()
                    .map(|(i, (tier, quantity))| {
                        let label = match rates.tiers.get(i + 1) {
                            Some(next) => format!(
                                "Energy {}-{} kWh",
                                tier.threshold_kwh, next.threshold_kwh
                            ),
                            None if i == 0 => "Energy".to_string(),
                            None => format!("Energy above {} kWh", tier.threshold_kwh),
                        };
                        BillLine::metered(label, quantity, LineUnit::Kwh, tier.rate_per_kwh)
                    })
                    .collect();
                lines.push(service_line);

                ChargeComponents {
                    variant: FormulaVariant::TieredNormal,
                    energy_charge,
                    demand_charge: Decimal::ZERO,
                    service_charge,
                    total_kwh,
                    peak_kw: Decimal::ZERO,
                    bills_demand: false,
                    lines,
                }
            }
            Self::TimeOfUse(rates) => {
                let on_peak_kwh = usage.require(UsageField::OnPeakKwh)?;
                let off_peak_kwh = usage.require(UsageField::OffPeakKwh)?;
                // Only windows the entry prices are billed
                let billed_on_peak_kw = rates.on_peak_demand_rate.and(usage.on_peak_kw);
                let billed_off_peak_kw = rates.off_peak_demand_rate.and(usage.off_peak_kw);

                let energy_charge = compute_tou_energy_charge(
                    on_peak_kwh,
                    off_peak_kwh,
                    rates.on_peak_energy_rate,
                    rates.off_peak_energy_rate,
                )?;
                let demand_charge =
                    compute_tou_demand_charge(billed_on_peak_kw, billed_off_peak_kw, rates)?;
                let total_kwh = checked_add("totalKwh", on_peak_kwh, off_peak_kwh)?;

                let mut lines = vec![
                    BillLine::metered(
                        "On-peak energy",
                        on_peak_kwh,
                        LineUnit::Kwh,
                        rates.on_peak_energy_rate,
                    ),
                    BillLine::metered(
                        "Off-peak energy",
                        off_peak_kwh,
                        LineUnit::Kwh,
                        rates.off_peak_energy_rate,
                    ),
                ];
                if let (Some(kw), Some(rate)) = (billed_on_peak_kw, rates.on_peak_demand_rate) {
                    lines.push(BillLine::metered("On-peak demand", kw, LineUnit::Kw, rate));
                }
                if let (Some(kw), Some(rate)) = (billed_off_peak_kw, rates.off_peak_demand_rate) {
                    lines.push(BillLine::metered("Off-peak demand", kw, LineUnit::Kw, rate));
                }
                lines.push(service_line);

                ChargeComponents {
                    variant: FormulaVariant::TimeOfUse,
                    energy_charge,
                    demand_charge,
                    service_charge,
                    total_kwh,
                    peak_kw: usage
                        .on_peak_kw
                        .unwrap_or_default()
                        .max(usage.off_peak_kw.unwrap_or_default()),
                    bills_demand: rates.bills_demand(),
                    lines,
                }
            }
            Self::TimeOfDay(rates) => {
                let total_kwh = usage.require(UsageField::TotalKwh)?;
                let on_peak_kw = usage.require(UsageField::OnPeakKw)?;
                let partial_peak_kw = usage.require(UsageField::PartialPeakKw)?;
                let off_peak_kw = usage.require(UsageField::OffPeakKw)?;

                let energy_charge = compute_flat_energy_charge(total_kwh, rates.energy_rate)?;
                let demand_charge = compute_tod_demand_charge(
                    on_peak_kw,
                    partial_peak_kw,
                    off_peak_kw,
                    rates.on_peak_demand_rate,
                    rates.partial_peak_demand_rate,
                    rates.off_peak_demand_rate,
                )?;

                let lines = vec![
                    BillLine::metered(
                        "On-peak demand",
                        on_peak_kw,
                        LineUnit::Kw,
                        rates.on_peak_demand_rate,
                    ),
                    BillLine::metered(
                        "Partial-peak demand",
                        partial_peak_kw,
                        LineUnit::Kw,
                        rates.partial_peak_demand_rate,
                    ),
                    BillLine::metered(
                        "Off-peak demand",
                        off_peak_kw,
                        LineUnit::Kw,
                        rates.off_peak_demand_rate,
                    ),
                    BillLine::metered("Energy", total_kwh, LineUnit::Kwh, rates.energy_rate),
                    service_line,
                ];

                ChargeComponents {
                    variant: FormulaVariant::TimeOfDay,
                    energy_charge,
                    demand_charge,
                    service_charge,
                    total_kwh,
                    peak_kw: on_peak_kw.max(partial_peak_kw).max(off_peak_kw),
                    bills_demand: true,
                    lines,
                }
            }
        };

        Ok(components)
    }
}
