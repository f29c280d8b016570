use serde::{Deserialize, Serialize};

use crate::domain::currency::Currency;
use crate::errors::PricingError;
use crate::pricing::validation::OrderLimits;
use crate::pricing::{
    CustomCutRequest, FormulaRequest, PricingMode, StandardRequest, UnitRequest,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Roll,
    Sheet,
    DigitalPrint,
    Box,
    Sticker,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Roll => "roll",
            Self::Sheet => "sheet",
            Self::DigitalPrint => "digital_print",
            Self::Box => "box",
            Self::Sticker => "sticker",
        }
    }
}

/// A catalog row as the backend store returns it. Optional fields only exist
/// for the product types that use them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub product_type: ProductType,
    #[serde(default)]
    pub weight_gsm: Option<f64>,
    #[serde(default)]
    pub width_cm: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub sheets_per_package: Option<u32>,
    #[serde(default)]
    pub ton_price: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    pub vat_rate: f64,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    /// Price with the active product formula instead of the type's built-in calculation.
    #[serde(default)]
    pub formula_priced: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_currency() -> Currency {
    Currency::Try
}

fn default_active() -> bool {
    true
}

/// What a customer typed on the product page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuoteInput {
    pub quantity: i64,
    #[serde(default)]
    pub width_cm: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub length_cm: Option<f64>,
    #[serde(default)]
    pub waste_rate: Option<f64>,
}

impl ProductRecord {
    pub fn limits(&self) -> OrderLimits {
        OrderLimits::new(self.min_order_quantity, self.stock_quantity)
    }

    /// Chooses the calculation for this product and fills it from the record
    /// plus the customer's input.
    pub fn pricing_mode(&self, input: &ProductQuoteInput) -> Result<PricingMode, PricingError> {
        if !self.is_active {
            return Err(PricingError::invalid_input(
                "product",
                format!("`{}` is not available for sale", self.id.0),
            ));
        }

        let limits = self.limits();

        if self.formula_priced {
            return Ok(PricingMode::Formula(FormulaRequest {
                width_cm: input.width_cm.or(self.width_cm).ok_or_else(|| customer_input("width_cm"))?,
                height_cm: input
                    .height_cm
                    .or(self.height_cm)
                    .ok_or_else(|| customer_input("height_cm"))?,
                weight_gsm: self.require(self.weight_gsm, "weight_gsm")?,
                quantity: input.quantity,
                ton_price: self.require(self.ton_price, "ton_price")?,
                vat_rate: self.vat_rate,
                waste_rate: input.waste_rate,
                limits,
            }));
        }

        match self.product_type {
            ProductType::Roll | ProductType::Sheet => Ok(PricingMode::Standard(StandardRequest {
                width_cm: input.width_cm.or(self.width_cm).ok_or_else(|| customer_input("width_cm"))?,
                length_cm: input
                    .length_cm
                    .or(self.height_cm)
                    .ok_or_else(|| customer_input("length_cm"))?,
                weight_gsm: self.require(self.weight_gsm, "weight_gsm")?,
                package_count: input.quantity,
                limits,
            })),
            ProductType::DigitalPrint => Ok(PricingMode::CustomCut(CustomCutRequest {
                width_cm: input.width_cm.ok_or_else(|| customer_input("width_cm"))?,
                height_cm: input.height_cm.ok_or_else(|| customer_input("height_cm"))?,
                package_count: input.quantity,
                weight_gsm: self.require(self.weight_gsm, "weight_gsm")?,
                sheets_per_package: self.require(self.sheets_per_package, "sheets_per_package")?,
                ton_price: self.require(self.ton_price, "ton_price")?,
                currency: self.currency,
                vat_rate: self.vat_rate,
                waste_rate: input.waste_rate,
                limits,
            })),
            ProductType::Box => Ok(PricingMode::PerBox(self.unit_request(input, limits)?)),
            ProductType::Sticker => Ok(PricingMode::PerSheet(self.unit_request(input, limits)?)),
        }
    }

    fn unit_request(
        &self,
        input: &ProductQuoteInput,
        limits: OrderLimits,
    ) -> Result<UnitRequest, PricingError> {
        Ok(UnitRequest {
            unit_price: self.require(self.unit_price, "unit_price")?,
            currency: self.currency,
            quantity: input.quantity,
            vat_rate: self.vat_rate,
            limits,
        })
    }

    fn require<T>(&self, value: Option<T>, field: &str) -> Result<T, PricingError> {
        value.ok_or_else(|| {
            PricingError::missing_reference(format!("{field} on product `{}`", self.id.0))
        })
    }
}

fn customer_input(field: &str) -> PricingError {
    PricingError::invalid_input(field, "is required for this product")
}
