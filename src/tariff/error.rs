use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{CustomerClass, Provider, TariffScheme, VoltageTier};

/// Errors raised while resolving a tariff or computing a bill
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TariffError {
    #[error(
        "No tariff for {provider} {customer_class} on scheme '{tariff_scheme}' \
         at voltage '{voltage_tier}'"
    )]
    InvalidCombination {
        provider: Provider,
        customer_class: CustomerClass,
        tariff_scheme: TariffScheme,
        voltage_tier: VoltageTier,
    },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid magnitude for {field}: {value} (must be zero or positive)")]
    InvalidMagnitude { field: String, value: Decimal },

    #[error("Invalid number for {field}: {raw}")]
    NonNumeric { field: String, raw: String },

    #[error("{field} is too large to bill")]
    AmountOverflow { field: String },

    #[error("Malformed tariff key: '{0}'")]
    MalformedKey(String),

    #[error("Corrupt rate catalog entry {key}: {reason}")]
    CatalogIntegrity { key: String, reason: String },
}

impl TariffError {
    /// Field name for errors caused by a specific request input
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field)
            | Self::InvalidMagnitude { field, .. }
            | Self::NonNumeric { field, .. }
            | Self::AmountOverflow { field } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let error = TariffError::InvalidCombination {
            provider: Provider::Mea,
            customer_class: CustomerClass::SmallGeneral,
            tariff_scheme: TariffScheme::Normal,
            voltage_tier: VoltageTier::Low,
        };
        assert_eq!(
            error.to_string(),
            "No tariff for mea type-2 on scheme 'normal' at voltage 'low'"
        );

        let error = TariffError::InvalidMagnitude {
            field: "totalKwh".to_string(),
            value: dec!(-3),
        };
        assert_eq!(
            error.to_string(),
            "Invalid magnitude for totalKwh: -3 (must be zero or positive)"
        );
    }

    #[test]
    fn test_field() {
        let missing = TariffError::MissingField("onPeakKw".to_string());
        assert_eq!(missing.field(), Some("onPeakKw"));

        let garbled = TariffError::NonNumeric {
            field: "totalKwh".to_string(),
            raw: "\"lots\"".to_string(),
        };
        assert_eq!(garbled.field(), Some("totalKwh"));

        let overflow = TariffError::AmountOverflow {
            field: "peakKvar".to_string(),
        };
        assert_eq!(overflow.field(), Some("peakKvar"));
        assert_eq!(overflow.to_string(), "peakKvar is too large to bill");

        let corrupt = TariffError::CatalogIntegrity {
            key: "mea_type-1.normal.low".to_string(),
            reason: "negative rate".to_string(),
        };
        assert_eq!(corrupt.field(), None);
    }
}
