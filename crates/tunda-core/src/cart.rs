use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    Kg,
    Piece,
    Bunch,
    Litre,
    Bag,
}

impl std::fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitOfMeasure::Kg => write!(f, "kg"),
            UnitOfMeasure::Piece => write!(f, "piece"),
            UnitOfMeasure::Bunch => write!(f, "bunch"),
            UnitOfMeasure::Litre => write!(f, "litre"),
            UnitOfMeasure::Bag => write!(f, "bag"),
        }
    }
}

/// The administrative location of the farm a listing ships from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FarmLocation {
    pub farm_id: i64,
    pub sub_county_id: i64,
    pub county_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub listing_ref: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub farm: FarmLocation,
    pub unit_of_measure: UnitOfMeasure,
    /// Informational; weight surcharges only count `kg` lines.
    #[serde(default)]
    pub product_is_weighted: bool,
}

impl CartItem {
    /// `quantity × unit_price`, or `None` when the product does not fit
    /// in a `Decimal`.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    /// Quantity contributing to the cart weight, zero for non-`kg` lines.
    #[must_use]
    pub fn weight_kg(&self) -> Decimal {
        if self.unit_of_measure == UnitOfMeasure::Kg {
            self.quantity
        } else {
            Decimal::ZERO
        }
    }

    /// Checks the per-line invariants. `index` is used to name the
    /// offending field.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] when `quantity <= 0`,
    /// `unit_price < 0`, or their product overflows.
    pub fn validate(&self, index: usize) -> Result<(), CoreError> {
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::invalid(
                format!("cart_items[{index}].quantity"),
                format!("must be greater than zero, got {}", self.quantity),
            ));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(CoreError::invalid(
                format!("cart_items[{index}].unit_price"),
                format!("must not be negative, got {}", self.unit_price),
            ));
        }
        if self.line_total().is_none() {
            return Err(CoreError::invalid(
                format!("cart_items[{index}].quantity"),
                format!(
                    "{} x {} is too large to price",
                    self.quantity, self.unit_price
                ),
            ));
        }
        Ok(())
    }
}

/// Subtotal and `kg` weight of a whole cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub weight_kg: Decimal,
}

impl CartTotals {
    /// Sums every line with checked arithmetic.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] naming the first line at which the
    /// subtotal or the weight overflows.
    pub fn of(items: &[CartItem]) -> Result<Self, CoreError> {
        let mut totals = Self {
            subtotal: Decimal::ZERO,
            weight_kg: Decimal::ZERO,
        };
        for (index, item) in items.iter().enumerate() {
            let overflow = || {
                CoreError::invalid(
                    format!("cart_items[{index}].quantity"),
                    "cart total is too large to price",
                )
            };
            let line = item.line_total().ok_or_else(overflow)?;
            totals.subtotal = totals.subtotal.checked_add(line).ok_or_else(overflow)?;
            totals.weight_kg = totals
                .weight_kg
                .checked_add(item.weight_kg())
                .ok_or_else(overflow)?;
        }
        totals.subtotal = totals.subtotal.round_dp(2);
        Ok(totals)
    }
}

/// Distinct farms of a cart in first-seen order.
#[must_use]
pub fn distinct_farms(items: &[CartItem]) -> Vec<FarmLocation> {
    let mut farms: Vec<FarmLocation> = Vec::new();
    for item in items {
        if !farms.iter().any(|f| f.farm_id == item.farm.farm_id) {
            farms.push(item.farm);
        }
    }
    farms
}
