use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::currency::Currency;
use crate::formula::{Formula, FormulaError, FormulaKind, Variable};

/// Admin-configured linear price rule for roll and sheet paper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardFormula {
    pub product_type: String,
    pub base_price_foreign: f64,
    pub weight_factor: f64,
    pub vat_rate: f64,
    pub currency: Currency,
    /// Weight the base price refers to; the configured default applies when unset.
    #[serde(default)]
    pub reference_weight_gsm: Option<f64>,
}

/// Flat fee charged per package on custom-cut orders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CuttingFee {
    pub fee_per_package: f64,
    #[serde(default = "default_fee_currency")]
    pub currency: Currency,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_fee_currency() -> Currency {
    Currency::Try
}

fn default_true() -> bool {
    true
}

/// An admin-authored arithmetic formula as stored by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceFormulaRecord {
    pub name: String,
    pub formula: String,
    /// Human descriptions of the variables the admin intends to use.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub kind: FormulaKind,
}

impl PriceFormulaRecord {
    /// Parses the expression and checks the declared variable names.
    ///
    /// This is the save-time check: a record that compiles here cannot fail on
    /// syntax or unknown names during checkout.
    pub fn compile(&self) -> Result<Formula, FormulaError> {
        for name in self.variables.keys() {
            let known = Variable::from_name(name.trim())
                .map(|variable| self.kind.allows(variable))
                .unwrap_or(false);
            if !known {
                return Err(FormulaError::UnknownDeclaredVariable { name: name.clone() });
            }
        }
        Formula::parse(&self.formula, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{CuttingFee, PriceFormulaRecord};
    use crate::domain::currency::Currency;
    use crate::formula::{FormulaError, FormulaKind};

    #[test]
    fn compile_rejects_undeclarable_variables() {
        let mut variables = BTreeMap::new();
        variables.insert("width".to_string(), "sheet width in cm".to_string());
        variables.insert("margin".to_string(), "profit margin".to_string());

        let record = PriceFormulaRecord {
            name: "digital".to_string(),
            formula: "width * 2".to_string(),
            variables,
            is_active: true,
            kind: FormulaKind::Product,
        };

        assert_eq!(
            record.compile(),
            Err(FormulaError::UnknownDeclaredVariable { name: "margin".to_string() })
        );
    }

    #[test]
    fn compile_returns_a_reusable_formula() {
        let record = PriceFormulaRecord {
            name: "custom cut".to_string(),
            formula: "width * height * cutting_fee".to_string(),
            variables: BTreeMap::new(),
            is_active: true,
            kind: FormulaKind::CustomCut,
        };

        let formula = record.compile().expect("compiles");
        assert_eq!(formula.variables().len(), 3);
    }

    #[test]
    fn cutting_fee_defaults_to_active_try() {
        let fee: CuttingFee = serde_json::from_str(r#"{"fee_per_package": 100}"#).expect("decode");
        assert_eq!(fee.currency, Currency::Try);
        assert!(fee.is_active);
    }
}
