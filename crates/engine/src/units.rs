//! Unit conversion collaborator.

use rust_decimal::Decimal;

use larder_core::{DomainError, DomainResult};

/// Converts quantities between named units.
///
/// `density` is grams per millilitre and is only consulted when converting
/// between volume and weight.
pub trait UnitConverter: Send + Sync {
    fn convert(&self, quantity: Decimal, from: &str, to: &str, density: Option<Decimal>) -> DomainResult<Decimal>;

    /// How many `to` units one `from` unit represents.
    fn factor(&self, from: &str, to: &str, density: Option<Decimal>) -> DomainResult<Decimal> {
        self.convert(Decimal::ONE, from, to, density)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Volume,
    Weight,
    Count,
}

/// Kitchen volume, weight and count units.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUnitConverter;

impl StandardUnitConverter {
    /// Size of `unit` in its dimension's base (ml, g or each).
    fn lookup(unit: &str) -> Option<(Dimension, Decimal)> {
        use Dimension::*;
        let (dimension, base) = match unit {
            "tsp" | "teaspoon" | "teaspoons" => (Volume, Decimal::new(492892159375, 11)),
            "tbsp" | "tablespoon" | "tablespoons" => (Volume, Decimal::new(1478676478125, 11)),
            "cup" | "cups" => (Volume, Decimal::new(2365882365, 7)),
            "ml" | "milliliter" | "milliliters" => (Volume, Decimal::ONE),
            "l" | "liter" | "liters" => (Volume, Decimal::from(1000)),
            "fl_oz" | "fl oz" => (Volume, Decimal::new(295735295625, 10)),
            "g" | "gram" | "grams" => (Weight, Decimal::ONE),
            "kg" | "kilogram" | "kilograms" => (Weight, Decimal::from(1000)),
            "oz" | "ounce" | "ounces" => (Weight, Decimal::new(28349523125, 9)),
            "lb" | "lbs" | "pound" | "pounds" => (Weight, Decimal::new(45359237, 5)),
            "each" | "ea" | "count" => (Count, Decimal::ONE),
            "dozen" => (Count, Decimal::from(12)),
            _ => return None,
        };
        Some((dimension, base))
    }
}

impl UnitConverter for StandardUnitConverter {
    fn convert(&self, quantity: Decimal, from: &str, to: &str, density: Option<Decimal>) -> DomainResult<Decimal> {
        let from_key = from.trim().to_lowercase();
        let to_key = to.trim().to_lowercase();
        // Identical units need no table entry (e.g. "inch" for ribbon).
        if from_key == to_key {
            return Ok(quantity);
        }

        let unknown = |u: &str| DomainError::conversion(format!("unknown unit '{u}'"));
        let (from_dim, from_base) = Self::lookup(&from_key).ok_or_else(|| unknown(from))?;
        let (to_dim, to_base) = Self::lookup(&to_key).ok_or_else(|| unknown(to))?;

        let base = quantity * from_base;
        let bridged = match (from_dim, to_dim) {
            (a, b) if a == b => base,
            (Dimension::Volume, Dimension::Weight) => base * require_density(density, from, to)?,
            (Dimension::Weight, Dimension::Volume) => base / require_density(density, from, to)?,
            _ => {
                return Err(DomainError::conversion(format!(
                    "cannot convert '{from}' to '{to}'"
                )));
            }
        };
        Ok(bridged / to_base)
    }
}

fn require_density(density: Option<Decimal>, from: &str, to: &str) -> DomainResult<Decimal> {
    match density {
        Some(d) if d > Decimal::ZERO => Ok(d),
        _ => Err(DomainError::conversion(format!(
            "converting '{from}' to '{to}' requires a positive density"
        ))),
    }
}
