//! Reference data: exchange rates, cutting fee, formulas and the product
//! catalog, as last fetched from the backend store.
//!
//! Nothing here is cached. Each `ReferenceSource::load` returns whatever the
//! store holds right now, and `ReferenceData::context` turns that snapshot
//! into the explicit `PricingContext` the calculators consume.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PricingSettings;
use crate::domain::currency::{ExchangeRate, ExchangeRates};
use crate::domain::pricing_rules::{CuttingFee, PriceFormulaRecord, StandardFormula};
use crate::domain::product::{ProductId, ProductRecord};
use crate::formula::{Formula, FormulaError, FormulaKind};
use crate::pricing::PricingContext;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReferenceError {
    #[error("failed to read reference data `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse reference data `{path}`: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported reference data format `{path}`; expected .json or .toml")]
    UnsupportedFormat { path: String },
    #[error("price formula `{name}` is invalid: {error}")]
    Formula { name: String, error: FormulaError },
    #[error("invalid reference data: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub exchange_rates: Vec<ExchangeRate>,
    pub cutting_fee: Option<CuttingFee>,
    pub standard_formulas: Vec<StandardFormula>,
    pub price_formulas: Vec<PriceFormulaRecord>,
    pub products: Vec<ProductRecord>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceSummary {
    pub exchange_rates: usize,
    pub cutting_fee_active: bool,
    pub standard_formulas: usize,
    pub active_price_formulas: usize,
    pub products: usize,
}

impl ReferenceData {
    /// Admin save-time checks: rates are usable, every active formula
    /// compiles, product ids are unique.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        self.exchange_rates()?;
        for record in self.price_formulas.iter().filter(|record| record.is_active) {
            compile(record)?;
        }

        let mut seen = BTreeSet::new();
        for product in &self.products {
            if !seen.insert(&product.id) {
                return Err(ReferenceError::Invalid(format!(
                    "product id `{}` appears more than once",
                    product.id.0
                )));
            }
        }

        Ok(())
    }

    pub fn exchange_rates(&self) -> Result<ExchangeRates, ReferenceError> {
        ExchangeRates::from_records(&self.exchange_rates)
            .map_err(|error| ReferenceError::Invalid(error.to_string()))
    }

    pub fn product(&self, id: &ProductId) -> Option<&ProductRecord> {
        self.products.iter().find(|product| &product.id == id)
    }

    /// The first active formula of `kind`. Later active ones are ignored.
    pub fn active_formula(&self, kind: FormulaKind) -> Result<Option<Formula>, ReferenceError> {
        let mut active = self
            .price_formulas
            .iter()
            .filter(|record| record.is_active && record.kind == kind);
        let Some(first) = active.next() else {
            return Ok(None);
        };

        let ignored: Vec<&str> = active.map(|record| record.name.as_str()).collect();
        if !ignored.is_empty() {
            tracing::warn!(
                event_name = "reference.formula.duplicate_active",
                correlation_id = "reference",
                kind = ?kind,
                selected = %first.name,
                ignored = ?ignored,
                "more than one active price formula; using the first"
            );
        }

        compile(first).map(Some)
    }

    /// Standard formula for a product type, or the first one when the caller
    /// has no product in hand.
    pub fn standard_formula(&self, product_type: Option<&str>) -> Option<&StandardFormula> {
        product_type
            .and_then(|wanted| {
                self.standard_formulas
                    .iter()
                    .find(|formula| formula.product_type.eq_ignore_ascii_case(wanted))
            })
            .or_else(|| self.standard_formulas.first())
    }

    pub fn context(
        &self,
        settings: &PricingSettings,
        product_type: Option<&str>,
    ) -> Result<PricingContext, ReferenceError> {
        let mut context = PricingContext::new(self.exchange_rates()?)
            .with_reference_sheet(settings.reference_sheet())
            .with_default_reference_weight(settings.default_reference_weight_gsm);

        if let Some(formula) = self.standard_formula(product_type) {
            context = context.with_standard_formula(formula.clone());
        }
        if let Some(fee) = &self.cutting_fee {
            context = context.with_cutting_fee(fee.clone());
        }
        if let Some(formula) = self.active_formula(FormulaKind::Product)? {
            context = context.with_product_formula(formula);
        }
        if let Some(formula) = self.active_formula(FormulaKind::CustomCut)? {
            context = context.with_custom_cut_formula(formula);
        }

        Ok(context)
    }

    pub fn summary(&self) -> ReferenceSummary {
        ReferenceSummary {
            exchange_rates: self.exchange_rates.len(),
            cutting_fee_active: self.cutting_fee.as_ref().is_some_and(|fee| fee.is_active),
            standard_formulas: self.standard_formulas.len(),
            active_price_formulas: self.price_formulas.iter().filter(|r| r.is_active).count(),
            products: self.products.len(),
        }
    }
}

fn compile(record: &PriceFormulaRecord) -> Result<Formula, ReferenceError> {
    record
        .compile()
        .map_err(|error| ReferenceError::Formula { name: record.name.clone(), error })
}

pub trait ReferenceSource: Send + Sync {
    fn load(&self) -> Result<ReferenceData, ReferenceError>;
}

/// Reads a JSON or TOML export of the backend tables on every call.
#[derive(Clone, Debug)]
pub struct FileReferenceSource {
    path: PathBuf,
}

impl FileReferenceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file without the save-time checks, for tools that report on
    /// broken records rather than refusing them.
    pub fn read(&self) -> Result<ReferenceData, ReferenceError> {
        let path_label = self.path.display().to_string();
        let format = self
            .path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase);

        let raw = std::fs::read_to_string(&self.path).map_err(|error| ReferenceError::Read {
            path: path_label.clone(),
            message: error.to_string(),
        })?;

        let data: ReferenceData = match format.as_deref() {
            Some("json") => serde_json::from_str(&raw).map_err(|error| ReferenceError::Parse {
                path: path_label.clone(),
                message: error.to_string(),
            })?,
            Some("toml") => toml::from_str(&raw).map_err(|error| ReferenceError::Parse {
                path: path_label.clone(),
                message: error.to_string(),
            })?,
            _ => return Err(ReferenceError::UnsupportedFormat { path: path_label }),
        };

        tracing::debug!(
            event_name = "reference.read",
            correlation_id = "reference",
            path = %path_label,
            products = data.products.len(),
            "reference data read"
        );
        Ok(data)
    }
}

impl ReferenceSource for FileReferenceSource {
    fn load(&self) -> Result<ReferenceData, ReferenceError> {
        let data = self.read()?;
        data.validate()?;
        Ok(data)
    }
}

/// Fixed in-memory data, for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct StaticReferenceSource {
    data: ReferenceData,
}

impl StaticReferenceSource {
    pub fn new(data: ReferenceData) -> Self {
        Self { data }
    }
}

impl ReferenceSource for StaticReferenceSource {
    fn load(&self) -> Result<ReferenceData, ReferenceError> {
        Ok(self.data.clone())
    }
}
