//! Measurement units for product doses and stock quantities.
//!
//! Every unit belongs to one [`Dimension`] and has a fixed factor relative to
//! that dimension's base unit (gram, millilitre, or a single piece). Conversion
//! is only defined inside a dimension.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Mass,
    Volume,
    Count,
}

/// Serialized as its short symbol; deserialized through [`FromStr`], so JSON
/// bodies and query strings accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Unit {
    #[serde(rename = "mg")]
    Milligram,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "t")]
    Tonne,
    #[serde(rename = "ml")]
    Millilitre,
    #[serde(rename = "cl")]
    Centilitre,
    #[serde(rename = "l")]
    Litre,
    #[serde(rename = "m3")]
    CubicMetre,
    #[serde(rename = "unit")]
    Piece,
}

impl Unit {
    pub const ALL: [Unit; 9] = [
        Unit::Milligram,
        Unit::Gram,
        Unit::Kilogram,
        Unit::Tonne,
        Unit::Millilitre,
        Unit::Centilitre,
        Unit::Litre,
        Unit::CubicMetre,
        Unit::Piece,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Milligram => "mg",
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Tonne => "t",
            Unit::Millilitre => "ml",
            Unit::Centilitre => "cl",
            Unit::Litre => "l",
            Unit::CubicMetre => "m3",
            Unit::Piece => "unit",
        }
    }

    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Milligram | Unit::Gram | Unit::Kilogram | Unit::Tonne => Dimension::Mass,
            Unit::Millilitre | Unit::Centilitre | Unit::Litre | Unit::CubicMetre => {
                Dimension::Volume
            }
            Unit::Piece => Dimension::Count,
        }
    }

    /// Size of one of `self` expressed in the dimension's base unit.
    pub fn base_factor(self) -> Decimal {
        match self {
            Unit::Milligram => Decimal::new(1, 3),
            Unit::Gram => Decimal::ONE,
            Unit::Kilogram => Decimal::from(1_000),
            Unit::Tonne => Decimal::from(1_000_000),
            Unit::Millilitre => Decimal::ONE,
            Unit::Centilitre => Decimal::TEN,
            Unit::Litre => Decimal::from(1_000),
            Unit::CubicMetre => Decimal::from(1_000_000),
            Unit::Piece => Decimal::ONE,
        }
    }

    pub fn is_compatible_with(self, other: Unit) -> bool {
        self.dimension() == other.dimension()
    }

    /// Convert `amount` expressed in `self` into `target`.
    pub fn convert(self, amount: Decimal, target: Unit) -> DomainResult<Decimal> {
        if !self.is_compatible_with(target) {
            return Err(DomainError::UnitMismatch {
                from: self,
                to: target,
            });
        }
        if self == target {
            return Ok(amount);
        }
        let in_base = amount
            .checked_mul(self.base_factor())
            .ok_or_else(DomainError::out_of_range)?;
        let converted = in_base
            .checked_div(target.base_factor())
            .ok_or_else(DomainError::out_of_range)?;
        Ok(converted.normalize())
    }
}

impl core::fmt::Display for Unit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Unit::ALL
            .into_iter()
            .find(|u| u.as_str() == wanted)
            .or(match wanted.as_str() {
                "units" => Some(Unit::Piece),
                _ => None,
            })
            .ok_or_else(|| DomainError::validation(format!("unknown unit '{s}'")))
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn grams_to_kilograms() {
        assert_eq!(Unit::Gram.convert(dec!(2000), Unit::Kilogram).unwrap(), dec!(2));
    }

    #[test]
    fn millilitres_to_litres() {
        assert_eq!(Unit::Millilitre.convert(dec!(250), Unit::Litre).unwrap(), dec!(0.25));
    }

    #[test]
    fn mass_to_volume_is_a_unit_mismatch() {
        let err = Unit::Kilogram.convert(dec!(1), Unit::Litre).unwrap_err();
        assert_eq!(
            err,
            DomainError::UnitMismatch {
                from: Unit::Kilogram,
                to: Unit::Litre
            }
        );
    }

    #[test]
    fn parse_accepts_uppercase_litre() {
        assert_eq!("L".parse::<Unit>().unwrap(), Unit::Litre);
        assert_eq!("units".parse::<Unit>().unwrap(), Unit::Piece);
        assert!("bushel".parse::<Unit>().is_err());
    }

    #[test]
    fn serde_uses_short_symbols() {
        let json = serde_json::to_string(&Unit::CubicMetre).unwrap();
        assert_eq!(json, "\"m3\"");
        let back: Unit = serde_json::from_str("\"L\"").unwrap();
        assert_eq!(back, Unit::Litre);
    }

    #[test]
    fn serde_accepts_every_spelling_from_str_accepts() {
        for raw in ["KG", " Kg ", "ML", "Units", "M3"] {
            let json = format!("\"{raw}\"");
            let from_json: Unit = serde_json::from_str(&json).unwrap();
            assert_eq!(from_json, raw.parse::<Unit>().unwrap());
        }
        assert!(serde_json::from_str::<Unit>("\"bushel\"").is_err());
    }

    proptest! {
        /// Converting there and back within a dimension preserves the amount.
        #[test]
        fn conversion_is_reversible_within_dimension(
            grams in 0u64..10_000_000u64,
            idx_a in 0usize..4,
            idx_b in 0usize..4,
        ) {
            let mass = [Unit::Milligram, Unit::Gram, Unit::Kilogram, Unit::Tonne];
            let amount = Decimal::from(grams);
            let there = mass[idx_a].convert(amount, mass[idx_b]).unwrap();
            let back = mass[idx_b].convert(there, mass[idx_a]).unwrap();
            prop_assert_eq!(back, amount);
        }
    }
}
