//! Folds formula output into a final bill: surcharges, Ft, VAT, rounding.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bill::{BillLine, LineUnit, RawBill};
use super::formula::{checked_add, checked_mul, ChargeComponents, FormulaVariant};
use super::TariffError;

/// Value-added tax, fixed by law
pub const VAT_RATE: Decimal = dec!(0.07);

const HUNDRED: Decimal = dec!(100);

/// How the Ft rate (satang) turns into baht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FtBasis {
    /// `kWh × ft / 100`
    #[default]
    PerKwh,
    /// `base × (ft / 100) / 100`
    PercentOfBase,
}

/// Where the monthly service charge sits relative to VAT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceChargeTreatment {
    /// Inside the VAT base
    #[default]
    Taxed,
    /// Added after VAT
    PostTax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillPolicy {
    #[serde(default)]
    pub ft_basis: FtBasis,
    #[serde(default)]
    pub service_charge: ServiceChargeTreatment,
}

/// One policy per formula variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default)]
    pub tiered_normal: BillPolicy,
    #[serde(default)]
    pub time_of_use: BillPolicy,
    #[serde(default)]
    pub time_of_day: BillPolicy,
}

impl PolicyTable {
    pub fn for_variant(&self, variant: FormulaVariant) -> BillPolicy {
        match variant {
            FormulaVariant::TieredNormal => self.tiered_normal,
            FormulaVariant::TimeOfUse => self.time_of_use,
            FormulaVariant::TimeOfDay => self.time_of_day,
        }
    }
}

/// Demand ratchet and reactive power parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurchargePolicy {
    /// Billed demand is at least this share (percent) of the prior 12-month maximum
    pub ratchet_percent: Decimal,
    /// Free reactive power as a fraction of peak kW
    pub reactive_threshold: Decimal,
    /// Baht per kVAR above the allowance
    pub reactive_rate: Decimal,
}

impl Default for SurchargePolicy {
    fn default() -> Self {
        Self {
            ratchet_percent: dec!(70),
            reactive_threshold: dec!(0.6197),
            reactive_rate: dec!(56.07),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BillAssembler {
    pub policies: PolicyTable,
    pub surcharges: SurchargePolicy,
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), TariffError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(TariffError::InvalidMagnitude {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

impl BillAssembler {
    pub fn new(policies: PolicyTable, surcharges: SurchargePolicy) -> Self {
        Self {
            policies,
            surcharges,
        }
    }

    /// Combine formula charges into an unrounded bill.
    ///
    /// `peak_kvar` and `prior_max_demand_charge` only apply to schemes that
    /// bill demand.
    pub(crate) fn assemble(
        &self,
        charges: &ChargeComponents,
        ft_rate_satang: Decimal,
        peak_kvar: Option<Decimal>,
        prior_max_demand_charge: Option<Decimal>,
    ) -> Result<RawBill, TariffError> {
        ensure_non_negative("energyCharge", charges.energy_charge)?;
        ensure_non_negative("demandCharge", charges.demand_charge)?;
        ensure_non_negative("serviceCharge", charges.service_charge)?;
        ensure_non_negative("totalKwh", charges.total_kwh)?;
        ensure_non_negative("ftRateSatang", ft_rate_satang)?;
        if let Some(kvar) = peak_kvar {
            ensure_non_negative("peakKvar", kvar)?;
        }
        if let Some(prior) = prior_max_demand_charge {
            ensure_non_negative("priorMaxDemandCharge", prior)?;
        }

        let policy = self.policies.for_variant(charges.variant);
        let mut lines = charges.lines.clone();

        let mut demand_charge = charges.demand_charge;
        let mut reactive_power_charge = Decimal::ZERO;

        if charges.bills_demand {
            if let Some(prior) = prior_max_demand_charge {
                let floor =
                    checked_mul("priorMaxDemandCharge", prior, self.surcharges.ratchet_percent)?
                        / HUNDRED;
                if floor > demand_charge {
                    lines.push(BillLine::flat(
                        format!(
                            "Demand ratchet adjustment ({}% of {} prior maximum)",
                            self.surcharges.ratchet_percent, prior
                        ),
                        floor - demand_charge,
                    ));
                    debug!(%floor, computed = %demand_charge, "demand ratchet applied");
                    demand_charge = floor;
                }
            }

            if let Some(kvar) = peak_kvar {
                let allowance =
                    checked_mul("peakKw", charges.peak_kw, self.surcharges.reactive_threshold)?;
                let excess = (kvar - allowance).max(Decimal::ZERO);
                if excess > Decimal::ZERO {
                    reactive_power_charge =
                        checked_mul("peakKvar", excess, self.surcharges.reactive_rate)?;
                    lines.push(BillLine::metered(
                        "Reactive power",
                        excess,
                        LineUnit::Kvar,
                        self.surcharges.reactive_rate,
                    ));
                }
            }
        } else if peak_kvar.is_some() || prior_max_demand_charge.is_some() {
            debug!(variant = %charges.variant, "scheme bills no demand, ignoring demand extras");
        }

        let base_tariff = checked_add(
            "subtotal",
            checked_add("subtotal", charges.energy_charge, demand_charge)?,
            reactive_power_charge,
        )?;

        let ft_rate_baht = ft_rate_satang / HUNDRED;
        let fuel_adjustment_charge = match policy.ft_basis {
            FtBasis::PerKwh => checked_mul("ftRateSatang", charges.total_kwh, ft_rate_baht)?,
            FtBasis::PercentOfBase => {
                checked_mul("ftRateSatang", base_tariff, ft_rate_baht)? / HUNDRED
            }
        };
        lines.push(BillLine {
            label: "Fuel adjustment (Ft)".to_string(),
            quantity: match policy.ft_basis {
                FtBasis::PerKwh => Some(charges.total_kwh),
                FtBasis::PercentOfBase => None,
            },
            unit: match policy.ft_basis {
                FtBasis::PerKwh => Some(LineUnit::Kwh),
                FtBasis::PercentOfBase => None,
            },
            rate: Some(ft_rate_baht),
            amount: fuel_adjustment_charge,
        });

        let (taxed_service, post_tax_service) = match policy.service_charge {
            ServiceChargeTreatment::Taxed => (charges.service_charge, Decimal::ZERO),
            ServiceChargeTreatment::PostTax => (Decimal::ZERO, charges.service_charge),
        };

        let taxable_amount = checked_add(
            "totalAmount",
            checked_add("totalAmount", base_tariff, fuel_adjustment_charge)?,
            taxed_service,
        )?;
        let tax = checked_mul("totalAmount", taxable_amount, VAT_RATE)?;
        lines.push(BillLine {
            label: "VAT 7%".to_string(),
            quantity: Some(taxable_amount),
            unit: None,
            rate: Some(VAT_RATE),
            amount: tax,
        });

        let total_amount = checked_add(
            "totalAmount",
            checked_add("totalAmount", taxable_amount, tax)?,
            post_tax_service,
        )?;

        Ok(RawBill {
            energy_charge: charges.energy_charge,
            demand_charge,
            reactive_power_charge,
            service_charge: charges.service_charge,
            subtotal: checked_add("subtotal", base_tariff, charges.service_charge)?,
            fuel_adjustment_charge,
            tax,
            total_amount,
            components: lines,
        })
    }
}
