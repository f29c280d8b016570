use serde::{Deserialize, Serialize};

use crate::errors::PricingError;

/// Quantity bounds copied from the product record, when it has them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLimits {
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
}

impl OrderLimits {
    pub fn new(min_order_quantity: Option<u32>, stock_quantity: Option<u32>) -> Self {
        Self { min_order_quantity, stock_quantity }
    }

    pub fn lower_bound(&self) -> i64 {
        i64::from(self.min_order_quantity.unwrap_or(1).max(1))
    }
}

pub fn ensure_positive(field: &str, value: f64) -> Result<f64, PricingError> {
    if !value.is_finite() {
        return Err(PricingError::invalid_input(field, "must be a finite number"));
    }
    if value <= 0.0 {
        return Err(PricingError::invalid_input(
            field,
            format!("must be greater than zero, got {value}"),
        ));
    }
    Ok(value)
}

pub fn ensure_vat_rate(field: &str, value: f64) -> Result<f64, PricingError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(PricingError::invalid_input(
            field,
            format!("must be a percentage between 0 and 100, got {value}"),
        ));
    }
    Ok(value)
}

pub fn ensure_waste_rate(value: Option<f64>) -> Result<Option<f64>, PricingError> {
    match value {
        Some(rate) if !rate.is_finite() || rate < 0.0 => Err(PricingError::invalid_input(
            "waste_rate",
            format!("must be a non-negative fraction, got {rate}"),
        )),
        other => Ok(other),
    }
}

/// Checks a requested quantity against zero and the product's bounds.
///
/// Out-of-range quantities are errors; they are never clamped.
pub fn ensure_quantity(field: &str, quantity: i64, limits: &OrderLimits) -> Result<u64, PricingError> {
    if quantity <= 0 {
        return Err(PricingError::invalid_input(
            field,
            format!("must be greater than zero, got {quantity}"),
        ));
    }

    let minimum = limits.lower_bound();
    if quantity < minimum {
        return Err(PricingError::invalid_input(
            field,
            format!("{quantity} is below the minimum order quantity of {minimum}"),
        ));
    }

    if let Some(stock) = limits.stock_quantity {
        if quantity > i64::from(stock) {
            return Err(PricingError::invalid_input(
                field,
                format!("{quantity} exceeds the available stock of {stock}"),
            ));
        }
    }

    u64::try_from(quantity)
        .map_err(|_| PricingError::invalid_input(field, format!("{quantity} is out of range")))
}
