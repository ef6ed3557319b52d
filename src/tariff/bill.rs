use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::formula::FormulaVariant;
use crate::domain::TariffKey;

/// Unit a breakdown line is metered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LineUnit {
    Kwh,
    Kw,
    Kvar,
    Month,
}

/// One itemised row of a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillLine {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<LineUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    pub amount: Decimal,
}

impl BillLine {
    /// Metered line: `quantity × rate`. The product must already be known to
    /// fit, as the charge formulas check it first.
    pub fn metered(
        label: impl Into<String>,
        quantity: Decimal,
        unit: LineUnit,
        rate: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            quantity: Some(quantity),
            unit: Some(unit),
            rate: Some(rate),
            amount: quantity * rate,
        }
    }

    /// Flat amount with no metered quantity
    pub fn flat(label: impl Into<String>, amount: Decimal) -> Self {
        Self {
            label: label.into(),
            quantity: None,
            unit: None,
            rate: None,
            amount,
        }
    }

    fn rounded(&self) -> Self {
        Self {
            amount: round_money(self.amount),
            ..self.clone()
        }
    }
}

/// Final bill, every monetary figure rounded to satang
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillBreakdown {
    pub tariff_key: TariffKey,
    pub formula: FormulaVariant,
    pub energy_charge: Decimal,
    /// Billed demand, after any ratchet uplift; zero for schemes without demand
    pub demand_charge: Decimal,
    pub reactive_power_charge: Decimal,
    pub service_charge: Decimal,
    /// Energy + demand + reactive power + service, before Ft and VAT
    pub subtotal: Decimal,
    pub fuel_adjustment_charge: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub components: Vec<BillLine>,
}

/// Unrounded figures as they leave the assembler
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawBill {
    pub energy_charge: Decimal,
    pub demand_charge: Decimal,
    pub reactive_power_charge: Decimal,
    pub service_charge: Decimal,
    pub subtotal: Decimal,
    pub fuel_adjustment_charge: Decimal,
    pub tax: Decimal,
    pub total_amount: Decimal,
    pub components: Vec<BillLine>,
}

impl RawBill {
    /// Round each figure on its own; totals are not re-derived from rounded parts
    pub(crate) fn finish(self, tariff_key: TariffKey, formula: FormulaVariant) -> BillBreakdown {
        BillBreakdown {
            tariff_key,
            formula,
            energy_charge: round_money(self.energy_charge),
            demand_charge: round_money(self.demand_charge),
            reactive_power_charge: round_money(self.reactive_power_charge),
            service_charge: round_money(self.service_charge),
            subtotal: round_money(self.subtotal),
            fuel_adjustment_charge: round_money(self.fuel_adjustment_charge),
            tax: round_money(self.tax),
            total_amount: round_money(self.total_amount),
            components: self.components.iter().map(BillLine::rounded).collect(),
        }
    }
}

/// Half-up to two decimal places, always carrying scale 2
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)).to_string(), "1.01");
        assert_eq!(round_money(dec!(1.0049)).to_string(), "1.00");
        assert_eq!(round_money(dec!(1220.3243)).to_string(), "1220.32");
        assert_eq!(round_money(dec!(0)).to_string(), "0.00");
        assert_eq!(round_money(dec!(33.29)).to_string(), "33.29");
    }

    #[test]
    fn test_metered_line() {
        let line = BillLine::metered("On-peak energy", dec!(100), LineUnit::Kwh, dec!(5.7982));
        assert_eq!(line.amount, dec!(579.82));
        assert_eq!(line.unit, Some(LineUnit::Kwh));
    }

    #[test]
    fn test_line_serialization_skips_empty_fields() {
        let line = BillLine::flat("Service charge", dec!(33.29));
        let json = serde_json::to_value(&line).unwrap();
        assert!(json.get("quantity").is_none());
        assert!(json.get("rate").is_none());
        assert_eq!(json["amount"], "33.29");
    }
}
