pub mod custom_cut;
pub mod formula_priced;
pub mod standard;
pub mod unit;
pub mod validation;

use serde::{Deserialize, Serialize};

use crate::domain::currency::{Currency, ExchangeRates};
use crate::domain::pricing_rules::{CuttingFee, StandardFormula};
use crate::errors::PricingError;
use crate::formula::{Bindings, Formula, Variable};

use self::validation::OrderLimits;

pub const DEFAULT_REFERENCE_WEIGHT_GSM: f64 = 80.0;

/// Sheet size the standard calculation divides a roll into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSheet {
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Default for ReferenceSheet {
    fn default() -> Self {
        Self { width_cm: 70.0, height_cm: 100.0 }
    }
}

impl ReferenceSheet {
    pub fn area_cm2(&self) -> f64 {
        self.width_cm * self.height_cm
    }
}

/// Reference data snapshot for one pricing request.
///
/// Built once from whatever was last loaded and passed to every calculator by
/// reference. Nothing in `pricing` reads rates, fees or formulas from anywhere
/// else.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingContext {
    pub exchange_rates: ExchangeRates,
    pub standard_formula: Option<StandardFormula>,
    pub cutting_fee: Option<CuttingFee>,
    pub product_formula: Option<Formula>,
    pub custom_cut_formula: Option<Formula>,
    pub reference_sheet: ReferenceSheet,
    pub default_reference_weight_gsm: f64,
}

impl PricingContext {
    pub fn new(exchange_rates: ExchangeRates) -> Self {
        Self {
            exchange_rates,
            standard_formula: None,
            cutting_fee: None,
            product_formula: None,
            custom_cut_formula: None,
            reference_sheet: ReferenceSheet::default(),
            default_reference_weight_gsm: DEFAULT_REFERENCE_WEIGHT_GSM,
        }
    }

    pub fn with_standard_formula(mut self, formula: StandardFormula) -> Self {
        self.standard_formula = Some(formula);
        self
    }

    pub fn with_cutting_fee(mut self, fee: CuttingFee) -> Self {
        self.cutting_fee = Some(fee);
        self
    }

    pub fn with_product_formula(mut self, formula: Formula) -> Self {
        self.product_formula = Some(formula);
        self
    }

    pub fn with_custom_cut_formula(mut self, formula: Formula) -> Self {
        self.custom_cut_formula = Some(formula);
        self
    }

    pub fn with_reference_sheet(mut self, sheet: ReferenceSheet) -> Self {
        self.reference_sheet = sheet;
        self
    }

    pub fn with_default_reference_weight(mut self, weight_gsm: f64) -> Self {
        self.default_reference_weight_gsm = weight_gsm;
        self
    }

    /// Binds `usd_rate`/`eur_rate` only when the formula reads them, so a
    /// formula that ignores a currency does not need its rate loaded.
    pub(crate) fn bind_rates(
        &self,
        formula: &Formula,
        bindings: &mut Bindings,
    ) -> Result<(), PricingError> {
        if formula.references(Variable::UsdRate) {
            bindings.insert(Variable::UsdRate, self.exchange_rates.rate_to_try(Currency::Usd)?);
        }
        if formula.references(Variable::EurRate) {
            bindings.insert(Variable::EurRate, self.exchange_rates.rate_to_try(Currency::Eur)?);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardRequest {
    pub width_cm: f64,
    pub length_cm: f64,
    pub weight_gsm: f64,
    pub package_count: i64,
    #[serde(default)]
    pub limits: OrderLimits,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomCutRequest {
    pub width_cm: f64,
    pub height_cm: f64,
    pub package_count: i64,
    pub weight_gsm: f64,
    pub sheets_per_package: u32,
    pub ton_price: f64,
    pub currency: Currency,
    pub vat_rate: f64,
    #[serde(default)]
    pub waste_rate: Option<f64>,
    #[serde(default)]
    pub limits: OrderLimits,
}

/// Fixed-unit sale: boxes of reams, or single sticker sheets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitRequest {
    pub unit_price: f64,
    pub currency: Currency,
    pub quantity: i64,
    pub vat_rate: f64,
    #[serde(default)]
    pub limits: OrderLimits,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormulaRequest {
    pub width_cm: f64,
    pub height_cm: f64,
    pub weight_gsm: f64,
    pub quantity: i64,
    pub ton_price: f64,
    pub vat_rate: f64,
    #[serde(default)]
    pub waste_rate: Option<f64>,
    #[serde(default)]
    pub limits: OrderLimits,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PricingMode {
    Standard(StandardRequest),
    CustomCut(CustomCutRequest),
    PerBox(UnitRequest),
    PerSheet(UnitRequest),
    Formula(FormulaRequest),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModeKind {
    Standard,
    CustomCut,
    PerBox,
    PerSheet,
    Formula,
}

impl PricingMode {
    pub fn kind(&self) -> PricingModeKind {
        match self {
            Self::Standard(_) => PricingModeKind::Standard,
            Self::CustomCut(_) => PricingModeKind::CustomCut,
            Self::PerBox(_) => PricingModeKind::PerBox,
            Self::PerSheet(_) => PricingModeKind::PerSheet,
            Self::Formula(_) => PricingModeKind::Formula,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: f64,
}

impl PricingTraceStep {
    pub fn new(stage: &str, detail: impl Into<String>, amount: f64) -> Self {
        Self { stage: stage.to_string(), detail: detail.into(), amount }
    }
}

/// The TRY-denominated figures every variant produces. Unrounded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: f64,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub total: f64,
}

impl QuoteTotals {
    pub fn from_subtotal(subtotal: f64, vat_rate: f64) -> Self {
        let vat_amount = subtotal * (vat_rate / 100.0);
        Self { subtotal, vat_rate, vat_amount, total: subtotal + vat_amount }
    }

    pub fn display(&self) -> DisplayTotals {
        DisplayTotals {
            subtotal: format_amount(self.subtotal),
            vat_amount: format_amount(self.vat_amount),
            total: format_amount(self.total),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTotals {
    pub subtotal: String,
    pub vat_amount: String,
    pub total: String,
}

/// Two-decimal presentation. The only place amounts are rounded.
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", round_for_display(value))
}

pub fn round_for_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteBreakdown {
    Standard {
        roll_area_cm2: f64,
        sheet_area_cm2: f64,
        sheets_per_roll: u64,
        total_sheets: u64,
        price_per_sheet_foreign: f64,
        price_per_sheet_try: f64,
        currency: Currency,
        exchange_rate: f64,
    },
    CustomCut {
        area_per_sheet_m2: f64,
        total_sheets: u64,
        total_area_m2: f64,
        total_weight_kg: f64,
        base_price_try: f64,
        cutting_fee_total: f64,
        exchange_rate: Option<f64>,
        formula: Option<String>,
    },
    Unit {
        quantity: u64,
        unit_price: f64,
        currency: Currency,
        exchange_rate: f64,
        unit_price_try: f64,
    },
    Formula {
        formula: String,
        formula_result: f64,
        waste_rate: Option<f64>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub mode: PricingModeKind,
    pub totals: QuoteTotals,
    pub breakdown: QuoteBreakdown,
    pub trace: Vec<PricingTraceStep>,
}

impl Quote {
    pub fn subtotal(&self) -> f64 {
        self.totals.subtotal
    }

    pub fn vat_amount(&self) -> f64 {
        self.totals.vat_amount
    }

    pub fn total(&self) -> f64 {
        self.totals.total
    }
}

/// Shared tail of every variant: subtotal, then VAT, then total.
pub(crate) fn finish_quote(
    mode: PricingModeKind,
    subtotal: f64,
    vat_rate: f64,
    breakdown: QuoteBreakdown,
    mut trace: Vec<PricingTraceStep>,
) -> Result<Quote, PricingError> {
    if !subtotal.is_finite() || subtotal < 0.0 {
        return Err(PricingError::invalid_input(
            "subtotal",
            format!("calculation produced an unusable subtotal ({subtotal})"),
        ));
    }

    let totals = QuoteTotals::from_subtotal(subtotal, vat_rate);
    trace.push(PricingTraceStep::new("subtotal", "pre-VAT amount in TRY", totals.subtotal));
    trace.push(PricingTraceStep::new(
        "vat",
        format!("subtotal * {vat_rate}%"),
        totals.vat_amount,
    ));
    trace.push(PricingTraceStep::new("total", "subtotal + vat", totals.total));

    Ok(Quote { mode, totals, breakdown, trace })
}

pub fn quote(mode: &PricingMode, context: &PricingContext) -> Result<Quote, PricingError> {
    match mode {
        PricingMode::Standard(request) => standard::quote_standard(request, context),
        PricingMode::CustomCut(request) => custom_cut::quote_custom_cut(request, context),
        PricingMode::PerBox(request) => unit::quote_per_box(request, context),
        PricingMode::PerSheet(request) => unit::quote_per_sheet(request, context),
        PricingMode::Formula(request) => formula_priced::quote_formula(request, context),
    }
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, mode: &PricingMode, context: &PricingContext) -> Result<Quote, PricingError>;
}

#[derive(Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, mode: &PricingMode, context: &PricingContext) -> Result<Quote, PricingError> {
        quote(mode, context)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        format_amount, quote, DeterministicPricingEngine, PricingContext, PricingEngine,
        PricingMode, PricingModeKind, QuoteTotals, UnitRequest,
    };
    use crate::domain::currency::{Currency, ExchangeRates};
    use crate::errors::PricingError;
    use crate::pricing::validation::OrderLimits;

    const TOLERANCE: f64 = 1e-6;

    fn assert_invariants(totals: &QuoteTotals) {
        assert!((totals.total - (totals.subtotal + totals.vat_amount)).abs() < TOLERANCE);
        assert!((totals.vat_amount - totals.subtotal * totals.vat_rate / 100.0).abs() < TOLERANCE);
        assert!(totals.total >= totals.subtotal && totals.subtotal >= 0.0);
    }

    #[test]
    fn totals_hold_vat_invariants_across_rates() {
        for (subtotal, vat_rate) in [(0.0, 20.0), (69.0, 20.0), (1134.0, 10.0), (206.04, 0.0), (1.0, 100.0)] {
            assert_invariants(&QuoteTotals::from_subtotal(subtotal, vat_rate));
        }
    }

    #[test]
    fn display_rounds_only_at_presentation() {
        let totals = QuoteTotals::from_subtotal(206.038_466_9, 20.0);
        assert_eq!(totals.display().total, "247.25");
        assert!((totals.total - 247.246_160_28).abs() < TOLERANCE);
        assert_eq!(format_amount(13.8), "13.80");
    }

    #[test]
    fn mode_deserializes_from_tagged_json() {
        let mode: PricingMode = serde_json::from_str(
            r#"{"mode":"per_box","unit_price":10.0,"currency":"EUR","quantity":3,"vat_rate":10}"#,
        )
        .expect("decode");
        assert_eq!(mode.kind(), PricingModeKind::PerBox);
    }

    #[test]
    fn engine_dispatches_to_variant_and_is_deterministic() {
        let context =
            PricingContext::new(ExchangeRates::default().with_rate(Currency::Eur, 37.80));
        let mode = PricingMode::PerBox(UnitRequest {
            unit_price: 10.0,
            currency: Currency::Eur,
            quantity: 3,
            vat_rate: 10.0,
            limits: OrderLimits::new(None, Some(10)),
        });

        let engine = DeterministicPricingEngine;
        let first = engine.price(&mode, &context).expect("first quote");
        let second = quote(&mode, &context).expect("second quote");

        assert_eq!(first, second);
        assert_eq!(first.total().to_bits(), second.total().to_bits());
        assert_eq!(first.mode, PricingModeKind::PerBox);
        assert_invariants(&first.totals);
    }

    #[test]
    fn missing_rate_surfaces_through_dispatch() {
        let context = PricingContext::new(ExchangeRates::default());
        let mode = PricingMode::PerSheet(UnitRequest {
            unit_price: 2.0,
            currency: Currency::Usd,
            quantity: 100,
            vat_rate: 20.0,
            limits: OrderLimits::default(),
        });

        assert!(matches!(quote(&mode, &context), Err(PricingError::MissingReferenceData { .. })));
    }
}
