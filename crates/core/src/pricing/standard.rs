use crate::errors::PricingError;

use super::validation::{ensure_positive, ensure_quantity, ensure_vat_rate};
use super::{
    finish_quote, PricingContext, PricingModeKind, PricingTraceStep, Quote, QuoteBreakdown,
    StandardRequest,
};

/// Prices roll/sheet paper against the active standard formula.
///
/// A roll is cut into reference sheets (70x100 cm unless configured
/// otherwise); each sheet costs the formula's base price, adjusted linearly
/// for weight around the reference weight and converted to TRY.
pub fn quote_standard(
    request: &StandardRequest,
    context: &PricingContext,
) -> Result<Quote, PricingError> {
    let width = ensure_positive("width_cm", request.width_cm)?;
    let length = ensure_positive("length_cm", request.length_cm)?;
    let weight = ensure_positive("weight_gsm", request.weight_gsm)?;
    let packages = ensure_quantity("package_count", request.package_count, &request.limits)?;

    let formula = context
        .standard_formula
        .as_ref()
        .ok_or_else(|| PricingError::missing_reference("active standard pricing formula"))?;
    let vat_rate = ensure_vat_rate("formula.vat_rate", formula.vat_rate)?;
    let exchange_rate = context.exchange_rates.rate_to_try(formula.currency)?;

    let sheet_area = context.reference_sheet.area_cm2();
    let roll_area = width * length;
    let sheets_per_roll = (roll_area / sheet_area).floor();
    if sheets_per_roll < 1.0 {
        return Err(PricingError::invalid_input(
            "length_cm",
            format!(
                "a {width}x{length} cm roll is smaller than one {}x{} cm sheet",
                context.reference_sheet.width_cm, context.reference_sheet.height_cm
            ),
        ));
    }

    let reference_weight =
        formula.reference_weight_gsm.unwrap_or(context.default_reference_weight_gsm);
    let weight_multiplier = 1.0 + (weight - reference_weight) * formula.weight_factor;
    let price_per_sheet_foreign = formula.base_price_foreign * weight_multiplier;
    if !price_per_sheet_foreign.is_finite() || price_per_sheet_foreign <= 0.0 {
        return Err(PricingError::invalid_input(
            "weight_gsm",
            format!("weight {weight} g/m² gives a non-positive sheet price under the active formula"),
        ));
    }

    let price_per_sheet_try = price_per_sheet_foreign * exchange_rate;
    let package_count = packages as f64;
    let subtotal = price_per_sheet_try * sheets_per_roll * package_count;

    // sheets_per_roll is a floored, positive float here.
    let sheets_per_roll_count = sheets_per_roll as u64;
    let total_sheets = sheets_per_roll_count.saturating_mul(packages);

    let trace = vec![
        PricingTraceStep::new("roll_area", format!("{width} cm * {length} cm"), roll_area),
        PricingTraceStep::new(
            "sheets_per_roll",
            format!("floor({roll_area} / {sheet_area})"),
            sheets_per_roll,
        ),
        PricingTraceStep::new(
            "price_per_sheet_foreign",
            format!(
                "{} * (1 + ({weight} - {reference_weight}) * {})",
                formula.base_price_foreign, formula.weight_factor
            ),
            price_per_sheet_foreign,
        ),
        PricingTraceStep::new(
            "price_per_sheet_try",
            format!("* {} rate {exchange_rate}", formula.currency),
            price_per_sheet_try,
        ),
    ];

    finish_quote(
        PricingModeKind::Standard,
        subtotal,
        vat_rate,
        QuoteBreakdown::Standard {
            roll_area_cm2: roll_area,
            sheet_area_cm2: sheet_area,
            sheets_per_roll: sheets_per_roll_count,
            total_sheets,
            price_per_sheet_foreign,
            price_per_sheet_try,
            currency: formula.currency,
            exchange_rate,
        },
        trace,
    )
}

#[cfg(test)]
mod tests {
    use super::quote_standard;
    use crate::domain::currency::{Currency, ExchangeRates};
    use crate::domain::pricing_rules::StandardFormula;
    use crate::errors::PricingError;
    use crate::pricing::validation::OrderLimits;
    use crate::pricing::{PricingContext, QuoteBreakdown, ReferenceSheet, StandardRequest};

    const TOLERANCE: f64 = 1e-6;

    fn formula() -> StandardFormula {
        StandardFormula {
            product_type: "roll".to_string(),
            base_price_foreign: 1.00,
            weight_factor: 0.01,
            vat_rate: 20.0,
            currency: Currency::Usd,
            reference_weight_gsm: Some(80.0),
        }
    }

    fn context() -> PricingContext {
        PricingContext::new(ExchangeRates::default().with_rate(Currency::Usd, 34.50))
            .with_standard_formula(formula())
    }

    fn request(width_cm: f64, length_cm: f64, weight_gsm: f64, package_count: i64) -> StandardRequest {
        StandardRequest { width_cm, length_cm, weight_gsm, package_count, limits: OrderLimits::default() }
    }

    #[test]
    fn one_sheet_roll_at_reference_weight() {
        let quote = quote_standard(&request(70.0, 100.0, 80.0, 2), &context()).expect("quote");

        let QuoteBreakdown::Standard { sheets_per_roll, total_sheets, price_per_sheet_try, .. } =
            quote.breakdown
        else {
            panic!("standard breakdown expected");
        };
        assert_eq!(sheets_per_roll, 1);
        assert_eq!(total_sheets, 2);
        assert!((price_per_sheet_try - 34.50).abs() < TOLERANCE);
        assert!((quote.subtotal() - 69.00).abs() < TOLERANCE);
        assert!((quote.vat_amount() - 13.80).abs() < TOLERANCE);
        assert!((quote.total() - 82.80).abs() < TOLERANCE);
    }

    #[test]
    fn heavier_paper_scales_the_sheet_price_linearly() {
        let quote = quote_standard(&request(140.0, 100.0, 90.0, 1), &context()).expect("quote");

        // 2 sheets, 1.00 * (1 + 10 * 0.01) = 1.10 USD each.
        assert!((quote.subtotal() - 2.0 * 1.10 * 34.50).abs() < TOLERANCE);
    }

    #[test]
    fn reference_weight_falls_back_to_context_default() {
        let mut formula = formula();
        formula.reference_weight_gsm = None;
        let context = PricingContext::new(ExchangeRates::default().with_rate(Currency::Usd, 34.50))
            .with_standard_formula(formula)
            .with_default_reference_weight(70.0);

        let quote = quote_standard(&request(70.0, 100.0, 80.0, 1), &context).expect("quote");
        assert!((quote.subtotal() - 1.10 * 34.50).abs() < TOLERANCE);
    }

    #[test]
    fn configurable_reference_sheet_changes_sheet_count() {
        let context = context().with_reference_sheet(ReferenceSheet { width_cm: 35.0, height_cm: 50.0 });
        let quote = quote_standard(&request(70.0, 100.0, 80.0, 1), &context).expect("quote");
        assert!(matches!(quote.breakdown, QuoteBreakdown::Standard { sheets_per_roll: 4, .. }));
    }

    #[test]
    fn missing_formula_is_missing_reference_data() {
        let context = PricingContext::new(ExchangeRates::default().with_rate(Currency::Usd, 34.50));
        let error = quote_standard(&request(70.0, 100.0, 80.0, 1), &context).expect_err("no formula");
        assert!(matches!(error, PricingError::MissingReferenceData { .. }));
    }

    #[test]
    fn missing_rate_is_not_treated_as_one() {
        let context = PricingContext::new(ExchangeRates::default()).with_standard_formula(formula());
        let error = quote_standard(&request(70.0, 100.0, 80.0, 1), &context).expect_err("no rate");
        assert!(matches!(error, PricingError::MissingReferenceData { ref what } if what.contains("USD")));
    }

    #[test]
    fn invalid_input_is_reported_before_missing_data() {
        let context = PricingContext::new(ExchangeRates::default());
        let error = quote_standard(&request(70.0, 100.0, 80.0, 0), &context).expect_err("zero");
        assert!(matches!(error, PricingError::InvalidInput { ref field, .. } if field == "package_count"));
    }

    #[test]
    fn roll_smaller_than_a_sheet_is_rejected() {
        let error = quote_standard(&request(50.0, 100.0, 80.0, 1), &context()).expect_err("too small");
        assert!(matches!(error, PricingError::InvalidInput { .. }));
    }

    #[test]
    fn weight_adjustment_below_zero_is_rejected() {
        let error = quote_standard(&request(70.0, 100.0, 1.0, 1), &{
            let mut formula = formula();
            formula.weight_factor = 0.02;
            context().with_standard_formula(formula)
        })
        .expect_err("negative price");
        assert!(matches!(error, PricingError::InvalidInput { ref field, .. } if field == "weight_gsm"));
    }
}
