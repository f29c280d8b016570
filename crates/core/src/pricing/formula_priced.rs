use crate::errors::PricingError;
use crate::formula::{Bindings, Variable};

use super::validation::{ensure_positive, ensure_quantity, ensure_vat_rate, ensure_waste_rate};
use super::{
    finish_quote, FormulaRequest, PricingContext, PricingModeKind, PricingTraceStep, Quote,
    QuoteBreakdown,
};

/// Prices a product with the active admin product formula; the formula result is the TRY subtotal.
pub fn quote_formula(
    request: &FormulaRequest,
    context: &PricingContext,
) -> Result<Quote, PricingError> {
    let width = ensure_positive("width_cm", request.width_cm)?;
    let height = ensure_positive("height_cm", request.height_cm)?;
    let weight = ensure_positive("weight_gsm", request.weight_gsm)?;
    let ton_price = ensure_positive("ton_price", request.ton_price)?;
    let quantity = ensure_quantity("quantity", request.quantity, &request.limits)?;
    let vat_rate = ensure_vat_rate("vat_rate", request.vat_rate)?;
    let waste_rate = ensure_waste_rate(request.waste_rate)?;

    let formula = context
        .product_formula
        .as_ref()
        .ok_or_else(|| PricingError::missing_reference("active product pricing formula"))?;

    let mut bindings = Bindings::new()
        .bind(Variable::Width, width)
        .bind(Variable::Height, height)
        .bind(Variable::Weight, weight)
        .bind(Variable::Quantity, quantity as f64)
        .bind(Variable::TonPrice, ton_price);
    context.bind_rates(formula, &mut bindings)?;

    let formula_result = formula.evaluate(&bindings)?;
    let mut trace = vec![PricingTraceStep::new(
        "formula",
        format!("`{}`", formula.source()),
        formula_result,
    )];

    let mut subtotal = formula_result;
    if let Some(rate) = waste_rate {
        subtotal *= 1.0 + rate;
        trace.push(PricingTraceStep::new("waste_adjustment", format!("* (1 + {rate})"), subtotal));
    }

    finish_quote(
        PricingModeKind::Formula,
        subtotal,
        vat_rate,
        QuoteBreakdown::Formula {
            formula: formula.source().to_string(),
            formula_result,
            waste_rate,
        },
        trace,
    )
}
