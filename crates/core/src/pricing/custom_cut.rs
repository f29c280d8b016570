use crate::errors::PricingError;
use crate::formula::{Bindings, Variable};

use super::validation::{ensure_positive, ensure_quantity, ensure_vat_rate, ensure_waste_rate};
use super::{
    finish_quote, CustomCutRequest, PricingContext, PricingModeKind, PricingTraceStep, Quote,
    QuoteBreakdown,
};

/// Prices digital print paper cut to an arbitrary width x height.
///
/// Built-in path: the paper's weight is priced at the product's ton price and
/// converted to TRY. When an active custom-cut formula is loaded it replaces
/// that base price. The flat cutting fee per package and VAT are applied in
/// both cases.
pub fn quote_custom_cut(
    request: &CustomCutRequest,
    context: &PricingContext,
) -> Result<Quote, PricingError> {
    let width = ensure_positive("width_cm", request.width_cm)?;
    let height = ensure_positive("height_cm", request.height_cm)?;
    let weight = ensure_positive("weight_gsm", request.weight_gsm)?;
    let ton_price = ensure_positive("ton_price", request.ton_price)?;
    if request.sheets_per_package == 0 {
        return Err(PricingError::invalid_input("sheets_per_package", "must be greater than zero"));
    }
    let packages = ensure_quantity("package_count", request.package_count, &request.limits)?;
    let vat_rate = ensure_vat_rate("vat_rate", request.vat_rate)?;
    let waste_rate = ensure_waste_rate(request.waste_rate)?;

    let fee = context
        .cutting_fee
        .as_ref()
        .filter(|fee| fee.is_active)
        .ok_or_else(|| PricingError::missing_reference("active cutting fee"))?;
    if !fee.fee_per_package.is_finite() || fee.fee_per_package < 0.0 {
        return Err(PricingError::invalid_input(
            "cutting_fee.fee_per_package",
            format!("must be zero or positive, got {}", fee.fee_per_package),
        ));
    }
    let fee_per_package_try =
        fee.fee_per_package * context.exchange_rates.rate_to_try(fee.currency)?;

    let package_count = packages as f64;
    let area_per_sheet_m2 = (width * height) / 10_000.0;
    let total_sheets = u64::from(request.sheets_per_package).saturating_mul(packages);
    let total_area_m2 = area_per_sheet_m2 * total_sheets as f64;
    let total_weight_kg = total_area_m2 * (weight / 1000.0);

    let mut trace = vec![
        PricingTraceStep::new(
            "area_per_sheet_m2",
            format!("{width} cm * {height} cm / 10000"),
            area_per_sheet_m2,
        ),
        PricingTraceStep::new(
            "total_area_m2",
            format!("* {total_sheets} sheets"),
            total_area_m2,
        ),
        PricingTraceStep::new(
            "total_weight_kg",
            format!("* {weight} g/m² / 1000"),
            total_weight_kg,
        ),
    ];

    let (mut base_price_try, exchange_rate, formula_source, fee_in_formula, waste_in_formula) =
        match &context.custom_cut_formula {
            None => {
                let rate = context.exchange_rates.rate_to_try(request.currency)?;
                let price_per_kg = ton_price / 1000.0;
                let base = total_weight_kg * price_per_kg * rate;
                trace.push(PricingTraceStep::new(
                    "base_price_try",
                    format!("kg * {price_per_kg} {}/kg * rate {rate}", request.currency),
                    base,
                ));
                (base, Some(rate), None, false, false)
            }
            Some(formula) => {
                let mut bindings = Bindings::new()
                    .bind(Variable::Width, width)
                    .bind(Variable::Height, height)
                    .bind(Variable::Weight, weight)
                    .bind(Variable::Quantity, package_count)
                    .bind(Variable::TonPrice, ton_price)
                    .bind(Variable::CuttingFee, fee_per_package_try)
                    .bind(Variable::WasteRate, waste_rate.unwrap_or(0.0));
                context.bind_rates(formula, &mut bindings)?;
                let base = formula.evaluate(&bindings)?;
                trace.push(PricingTraceStep::new(
                    "base_price_try",
                    format!("formula `{}`", formula.source()),
                    base,
                ));
                (
                    base,
                    None,
                    Some(formula.source().to_string()),
                    formula.references(Variable::CuttingFee),
                    formula.references(Variable::WasteRate),
                )
            }
        };

    if let Some(rate) = waste_rate.filter(|_| !waste_in_formula) {
        base_price_try *= 1.0 + rate;
        trace.push(PricingTraceStep::new(
            "waste_adjustment",
            format!("* (1 + {rate})"),
            base_price_try,
        ));
    }

    let cutting_fee_total = if fee_in_formula { 0.0 } else { fee_per_package_try * package_count };
    trace.push(PricingTraceStep::new(
        "cutting_fee_total",
        format!("{fee_per_package_try} TRY * {packages} packages"),
        cutting_fee_total,
    ));

    let subtotal = base_price_try + cutting_fee_total;

    finish_quote(
        PricingModeKind::CustomCut,
        subtotal,
        vat_rate,
        QuoteBreakdown::CustomCut {
            area_per_sheet_m2,
            total_sheets,
            total_area_m2,
            total_weight_kg,
            base_price_try,
            cutting_fee_total,
            exchange_rate,
            formula: formula_source,
        },
        trace,
    )
}
