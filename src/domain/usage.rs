use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::tariff::TariffError;

/// Metered figures for one billing period.
///
/// Every field is optional on the wire; which ones are required depends on
/// the formula the tariff key resolves to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Energy over the period (kWh), normal and TOD schemes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_kwh: Option<Decimal>,
    /// On-peak energy (kWh), TOU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_peak_kwh: Option<Decimal>,
    /// Off-peak energy (kWh), TOU
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_peak_kwh: Option<Decimal>,
    /// Highest on-peak demand (kW)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_peak_kw: Option<Decimal>,
    /// Highest partial-peak demand (kW), TOD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_peak_kw: Option<Decimal>,
    /// Highest off-peak demand (kW)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_peak_kw: Option<Decimal>,
    /// Highest reactive power (kVAR)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_kvar: Option<Decimal>,
    /// Highest demand charge over the trailing 12 months
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_max_demand_charge: Option<Decimal>,
}

/// Names a single field of [`UsageRecord`], rendered with its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum UsageField {
    TotalKwh,
    OnPeakKwh,
    OffPeakKwh,
    OnPeakKw,
    PartialPeakKw,
    OffPeakKw,
    PeakKvar,
    PriorMaxDemandCharge,
}

impl UsageField {
    pub fn get(&self, usage: &UsageRecord) -> Option<Decimal> {
        match self {
            Self::TotalKwh => usage.total_kwh,
            Self::OnPeakKwh => usage.on_peak_kwh,
            Self::OffPeakKwh => usage.off_peak_kwh,
            Self::OnPeakKw => usage.on_peak_kw,
            Self::PartialPeakKw => usage.partial_peak_kw,
            Self::OffPeakKw => usage.off_peak_kw,
            Self::PeakKvar => usage.peak_kvar,
            Self::PriorMaxDemandCharge => usage.prior_max_demand_charge,
        }
    }

    fn slot<'a>(&self, usage: &'a mut UsageRecord) -> &'a mut Option<Decimal> {
        match self {
            Self::TotalKwh => &mut usage.total_kwh,
            Self::OnPeakKwh => &mut usage.on_peak_kwh,
            Self::OffPeakKwh => &mut usage.off_peak_kwh,
            Self::OnPeakKw => &mut usage.on_peak_kw,
            Self::PartialPeakKw => &mut usage.partial_peak_kw,
            Self::OffPeakKw => &mut usage.off_peak_kw,
            Self::PeakKvar => &mut usage.peak_kvar,
            Self::PriorMaxDemandCharge => &mut usage.prior_max_demand_charge,
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

impl UsageRecord {
    /// Usage for a normal (block rate) bill
    pub fn normal(total_kwh: Decimal) -> Self {
        Self {
            total_kwh: Some(total_kwh),
            ..Default::default()
        }
    }

    /// Usage for a TOU bill without demand
    pub fn tou(on_peak_kwh: Decimal, off_peak_kwh: Decimal) -> Self {
        Self {
            on_peak_kwh: Some(on_peak_kwh),
            off_peak_kwh: Some(off_peak_kwh),
            ..Default::default()
        }
    }

    /// Usage for a TOD bill
    pub fn tod(
        total_kwh: Decimal,
        on_peak_kw: Decimal,
        partial_peak_kw: Decimal,
        off_peak_kw: Decimal,
    ) -> Self {
        Self {
            total_kwh: Some(total_kwh),
            on_peak_kw: Some(on_peak_kw),
            partial_peak_kw: Some(partial_peak_kw),
            off_peak_kw: Some(off_peak_kw),
            ..Default::default()
        }
    }

    pub fn with_on_peak_kw(mut self, kw: Decimal) -> Self {
        self.on_peak_kw = Some(kw);
        self
    }

    pub fn with_off_peak_kw(mut self, kw: Decimal) -> Self {
        self.off_peak_kw = Some(kw);
        self
    }

    pub fn with_peak_kvar(mut self, kvar: Decimal) -> Self {
        self.peak_kvar = Some(kvar);
        self
    }

    pub fn with_prior_max_demand_charge(mut self, charge: Decimal) -> Self {
        self.prior_max_demand_charge = Some(charge);
        self
    }

    /// Read usage from a loosely typed JSON object, as it arrives on the wire.
    ///
    /// Numbers and numeric strings are accepted and `null` counts as absent.
    /// Anything else fails with `NonNumeric` naming the field. Unknown keys
    /// are ignored.
    pub fn from_json(fields: &Map<String, Value>) -> Result<Self, TariffError> {
        let mut usage = Self::default();
        for field in UsageField::iter() {
            let raw = match fields.get(&field.to_string()) {
                None | Some(Value::Null) => continue,
                Some(raw) => raw,
            };
            let parsed = match raw {
                Value::Number(n) => parse_decimal(&n.to_string()),
                Value::String(s) => parse_decimal(s.trim()),
                _ => None,
            };
            let value = parsed.ok_or_else(|| TariffError::NonNumeric {
                field: field.to_string(),
                raw: raw.to_string(),
            })?;
            *field.slot(&mut usage) = Some(value);
        }
        Ok(usage)
    }

    /// Reject any supplied magnitude below zero, whether or not the
    /// resolved formula would read it.
    pub fn check_magnitudes(&self) -> Result<(), TariffError> {
        for field in UsageField::iter() {
            if let Some(value) = field.get(self) {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(TariffError::InvalidMagnitude {
                        field: field.to_string(),
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fetch a field the formula cannot do without.
    pub fn require(&self, field: UsageField) -> Result<Decimal, TariffError> {
        field
            .get(self)
            .ok_or_else(|| TariffError::MissingField(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_field_wire_names() {
        assert_eq!(UsageField::TotalKwh.to_string(), "totalKwh");
        assert_eq!(UsageField::PartialPeakKw.to_string(), "partialPeakKw");
        assert_eq!(
            UsageField::PriorMaxDemandCharge.to_string(),
            "priorMaxDemandCharge"
        );
    }

    #[test]
    fn test_negative_magnitude_names_the_field() {
        let usage = UsageRecord::tou(dec!(10), dec!(-1));
        match usage.check_magnitudes() {
            Err(TariffError::InvalidMagnitude { field, value }) => {
                assert_eq!(field, "offPeakKwh");
                assert_eq!(value, dec!(-1));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_negative_optional_extra_is_rejected() {
        let usage = UsageRecord::normal(dec!(100)).with_peak_kvar(dec!(-0.5));
        assert!(matches!(
            usage.check_magnitudes(),
            Err(TariffError::InvalidMagnitude { .. })
        ));
    }

    #[test]
    fn test_zero_is_accepted() {
        let usage = UsageRecord::tod(dec!(0), dec!(0), dec!(0), dec!(0));
        assert!(usage.check_magnitudes().is_ok());
    }

    #[test]
    fn test_require_missing() {
        let usage = UsageRecord::normal(dec!(5));
        assert_eq!(usage.require(UsageField::TotalKwh).unwrap(), dec!(5));
        match usage.require(UsageField::OnPeakKw) {
            Err(TariffError::MissingField(field)) => assert_eq!(field, "onPeakKw"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_json_accepts_numbers_and_strings() {
        let fields = serde_json::json!({
            "onPeakKwh": 100,
            "offPeakKwh": " 200.5 ",
            "onPeakKw": 1.5e2,
            "peakKvar": null,
            "meterId": "A-17"
        });
        let usage = UsageRecord::from_json(fields.as_object().unwrap()).unwrap();
        assert_eq!(usage.on_peak_kwh, Some(dec!(100)));
        assert_eq!(usage.off_peak_kwh, Some(dec!(200.5)));
        assert_eq!(usage.on_peak_kw, Some(dec!(150)));
        assert_eq!(usage.peak_kvar, None);
        assert_eq!(usage.total_kwh, None);
    }

    #[test]
    fn test_from_json_names_non_numeric_field() {
        for raw in [serde_json::json!("lots"), serde_json::json!(true), serde_json::json!([1])] {
            let fields = serde_json::json!({ "totalKwh": 10, "partialPeakKw": raw });
            match UsageRecord::from_json(fields.as_object().unwrap()) {
                Err(TariffError::NonNumeric { field, .. }) => assert_eq!(field, "partialPeakKw"),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn test_from_json_keeps_negative_for_magnitude_check() {
        let fields = serde_json::json!({ "totalKwh": "-4" });
        let usage = UsageRecord::from_json(fields.as_object().unwrap()).unwrap();
        assert!(matches!(
            usage.check_magnitudes(),
            Err(TariffError::InvalidMagnitude { .. })
        ));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let usage: UsageRecord =
            serde_json::from_str(r#"{"onPeakKwh": 100, "offPeakKwh": "200.5"}"#).unwrap();
        assert_eq!(usage.on_peak_kwh, Some(dec!(100)));
        assert_eq!(usage.off_peak_kwh, Some(dec!(200.5)));
        assert!(usage.total_kwh.is_none());
    }
}
