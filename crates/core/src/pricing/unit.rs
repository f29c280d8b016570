use crate::errors::PricingError;

use super::validation::{ensure_positive, ensure_quantity, ensure_vat_rate};
use super::{
    finish_quote, PricingContext, PricingModeKind, PricingTraceStep, Quote, QuoteBreakdown,
    UnitRequest,
};

/// Boxes sold whole (e.g. A4 ream boxes). At least one box, at most the stock.
pub fn quote_per_box(request: &UnitRequest, context: &PricingContext) -> Result<Quote, PricingError> {
    quote_units(PricingModeKind::PerBox, "box_count", request, context)
}

/// Single sheets (stickers). The product's minimum order quantity is the floor.
pub fn quote_per_sheet(
    request: &UnitRequest,
    context: &PricingContext,
) -> Result<Quote, PricingError> {
    quote_units(PricingModeKind::PerSheet, "sheet_count", request, context)
}

fn quote_units(
    mode: PricingModeKind,
    quantity_field: &str,
    request: &UnitRequest,
    context: &PricingContext,
) -> Result<Quote, PricingError> {
    let quantity = ensure_quantity(quantity_field, request.quantity, &request.limits)?;
    let unit_price = ensure_positive("unit_price", request.unit_price)?;
    let vat_rate = ensure_vat_rate("vat_rate", request.vat_rate)?;
    let exchange_rate = context.exchange_rates.rate_to_try(request.currency)?;

    let subtotal_foreign = unit_price * quantity as f64;
    let subtotal = subtotal_foreign * exchange_rate;

    let trace = vec![
        PricingTraceStep::new(
            "subtotal_foreign",
            format!("{unit_price} {} * {quantity}", request.currency),
            subtotal_foreign,
        ),
        PricingTraceStep::new(
            "subtotal_try",
            format!("* {} rate {exchange_rate}", request.currency),
            subtotal,
        ),
    ];

    finish_quote(
        mode,
        subtotal,
        vat_rate,
        QuoteBreakdown::Unit {
            quantity,
            unit_price,
            currency: request.currency,
            exchange_rate,
            unit_price_try: unit_price * exchange_rate,
        },
        trace,
    )
}

#[cfg(test)]
mod tests {
    use super::{quote_per_box, quote_per_sheet};
    use crate::domain::currency::{Currency, ExchangeRates};
    use crate::errors::PricingError;
    use crate::pricing::validation::OrderLimits;
    use crate::pricing::{PricingContext, UnitRequest};

    const TOLERANCE: f64 = 1e-6;

    fn context() -> PricingContext {
        PricingContext::new(
            ExchangeRates::default().with_rate(Currency::Eur, 37.80).with_rate(Currency::Usd, 34.50),
        )
    }

    fn request(quantity: i64, limits: OrderLimits) -> UnitRequest {
        UnitRequest { unit_price: 10.0, currency: Currency::Eur, quantity, vat_rate: 10.0, limits }
    }

    #[test]
    fn prices_euro_boxes_in_lira() {
        let quote = quote_per_box(&request(3, OrderLimits::new(None, Some(40))), &context())
            .expect("quote");

        assert!((quote.subtotal() - 1134.00).abs() < TOLERANCE);
        assert!((quote.vat_amount() - 113.40).abs() < TOLERANCE);
        assert!((quote.total() - 1247.40).abs() < TOLERANCE);
    }

    #[test]
    fn box_count_cannot_exceed_stock() {
        let error = quote_per_box(&request(41, OrderLimits::new(None, Some(40))), &context())
            .expect_err("over stock");
        assert!(matches!(error, PricingError::InvalidInput { ref field, .. } if field == "box_count"));
    }

    #[test]
    fn zero_boxes_is_invalid() {
        assert!(matches!(
            quote_per_box(&request(0, OrderLimits::default()), &context()),
            Err(PricingError::InvalidInput { .. })
        ));
    }

    #[test]
    fn sheet_orders_below_minimum_are_rejected_before_pricing() {
        // No rates loaded: a MissingReferenceData error here would mean arithmetic ran first.
        let context = PricingContext::new(ExchangeRates::default());
        let error = quote_per_sheet(&request(10, OrderLimits::new(Some(50), None)), &context)
            .expect_err("below moq");
        assert!(matches!(error, PricingError::InvalidInput { ref field, .. } if field == "sheet_count"));
    }

    #[test]
    fn sheet_orders_at_minimum_are_priced() {
        let mut request = request(50, OrderLimits::new(Some(50), Some(1000)));
        request.currency = Currency::Try;
        request.unit_price = 2.5;

        let quote = quote_per_sheet(&request, &context()).expect("quote");
        assert!((quote.subtotal() - 125.0).abs() < TOLERANCE);
        assert!((quote.total() - 137.5).abs() < TOLERANCE);
    }
}
