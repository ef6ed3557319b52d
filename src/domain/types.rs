use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use crate::tariff::TariffError;

// ============================================================================
// Tariff Vocabulary
// ============================================================================

/// Distribution utility that issues the bill.
///
/// Both authorities bill from the same regulator-published schedule, the
/// split only matters for which voltage brackets they quote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    /// Metropolitan Electricity Authority (Bangkok, Nonthaburi, Samut Prakan)
    Mea,
    /// Provincial Electricity Authority (everywhere else)
    Pea,
}

/// Customer class as numbered in the published schedule.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum CustomerClass {
    /// Residential
    #[serde(rename = "type-1")]
    #[strum(serialize = "type-1")]
    Residential,
    /// Small general service
    #[serde(rename = "type-2")]
    #[strum(serialize = "type-2")]
    SmallGeneral,
    /// Medium general service
    #[serde(rename = "type-3")]
    #[strum(serialize = "type-3")]
    MediumGeneral,
    /// Large general service
    #[serde(rename = "type-4")]
    #[strum(serialize = "type-4")]
    LargeGeneral,
    /// Specific business (hotels, guest houses)
    #[serde(rename = "type-5")]
    #[strum(serialize = "type-5")]
    SpecificBusiness,
    /// Government agencies and non-profit organisations
    #[serde(rename = "type-6")]
    #[strum(serialize = "type-6")]
    NonProfit,
    /// Agricultural water pumping
    #[serde(rename = "type-7")]
    #[strum(serialize = "type-7")]
    WaterPumping,
}

/// Billing method.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TariffScheme {
    /// Progressive block rate on monthly energy
    Normal,
    /// Time of use: on-peak / off-peak energy
    Tou,
    /// Time of day: three demand windows plus flat energy
    Tod,
}

/// Service voltage bracket.
///
/// PEA quotes 22-33 kV / below 22 kV, MEA quotes 12-24 kV / below 12 kV for
/// the same two lower brackets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum VoltageTier {
    /// 69 kV and above
    High,
    /// 22-33 kV (PEA), 12-24 kV (MEA)
    Medium,
    /// Below 22 kV (PEA), below 12 kV (MEA)
    Low,
}

impl VoltageTier {
    /// Human readable bracket as quoted by the given provider
    pub fn bracket(&self, provider: Provider) -> &'static str {
        match (self, provider) {
            (Self::High, _) => "69 kV and above",
            (Self::Medium, Provider::Mea) => "12-24 kV",
            (Self::Medium, Provider::Pea) => "22-33 kV",
            (Self::Low, Provider::Mea) => "below 12 kV",
            (Self::Low, Provider::Pea) => "below 22 kV",
        }
    }
}

// ============================================================================
// Tariff Key
// ============================================================================

/// Lookup key into the rate catalog.
///
/// Renders as `<provider>_<class>.<scheme>.<tier>`, e.g. `mea_type-1.normal.low`.
/// Field order drives the catalog listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TariffKey {
    pub provider: Provider,
    pub customer_class: CustomerClass,
    pub tariff_scheme: TariffScheme,
    pub voltage_tier: VoltageTier,
}

impl TariffKey {
    pub fn new(
        provider: Provider,
        customer_class: CustomerClass,
        tariff_scheme: TariffScheme,
        voltage_tier: VoltageTier,
    ) -> Self {
        Self {
            provider,
            customer_class,
            tariff_scheme,
            voltage_tier,
        }
    }
}

impl fmt::Display for TariffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}.{}.{}",
            self.provider, self.customer_class, self.tariff_scheme, self.voltage_tier
        )
    }
}

impl FromStr for TariffKey {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TariffError::MalformedKey(s.to_string());

        let (provider, rest) = s.split_once('_').ok_or_else(malformed)?;
        let mut parts = rest.split('.');
        let (Some(class), Some(scheme), Some(tier), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        Ok(Self {
            provider: provider.parse().map_err(|_| malformed())?,
            customer_class: class.parse().map_err(|_| malformed())?,
            tariff_scheme: scheme.parse().map_err(|_| malformed())?,
            voltage_tier: tier.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for TariffKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TariffKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = TariffKey::new(
            Provider::Mea,
            CustomerClass::Residential,
            TariffScheme::Normal,
            VoltageTier::Low,
        );
        assert_eq!(key.to_string(), "mea_type-1.normal.low");
    }

    #[test]
    fn test_key_parsing() {
        let key: TariffKey = "pea_type-4.tod.high".parse().unwrap();
        assert_eq!(key.provider, Provider::Pea);
        assert_eq!(key.customer_class, CustomerClass::LargeGeneral);
        assert_eq!(key.tariff_scheme, TariffScheme::Tod);
        assert_eq!(key.voltage_tier, VoltageTier::High);

        // Case-insensitive on every segment
        let upper: TariffKey = "PEA_TYPE-4.TOD.HIGH".parse().unwrap();
        assert_eq!(upper, key);
    }

    #[test]
    fn test_key_parsing_rejects_garbage() {
        for raw in [
            "",
            "mea",
            "mea_type-1.normal",
            "mea_type-1.normal.low.extra",
            "egat_type-1.normal.low",
            "mea_type-9.normal.low",
            "mea_type-1.flat.low",
            "mea_type-1.normal.ultra",
        ] {
            let err = raw.parse::<TariffKey>().unwrap_err();
            assert!(matches!(err, TariffError::MalformedKey(_)), "{raw}");
        }
    }

    #[test]
    fn test_key_ordering() {
        let a: TariffKey = "mea_type-1.tou.low".parse().unwrap();
        let b: TariffKey = "mea_type-2.normal.high".parse().unwrap();
        let c: TariffKey = "pea_type-1.normal.low".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_serialization() {
        let key: TariffKey = "mea_type-3.tou.medium".parse().unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"mea_type-3.tou.medium\"");
        let back: TariffKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);

        let class: CustomerClass = serde_json::from_str("\"type-5\"").unwrap();
        assert_eq!(class, CustomerClass::SpecificBusiness);
    }

    #[test]
    fn test_voltage_bracket() {
        assert_eq!(VoltageTier::Medium.bracket(Provider::Mea), "12-24 kV");
        assert_eq!(VoltageTier::Medium.bracket(Provider::Pea), "22-33 kV");
    }
}
