pub mod lexer;
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::parser::{BinaryOp, Expr};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("unexpected character `{character}` at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("invalid number `{literal}` at position {position}")]
    InvalidNumber { literal: String, position: usize },
    #[error("unknown variable `{name}` at position {position}")]
    UnknownVariable { name: String, position: usize },
    #[error("unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str, position: usize },
    #[error("formula nests deeper than {limit} levels at position {position}")]
    TooDeeplyNested { position: usize, limit: usize },
    #[error("formula has {tokens} tokens; at most {limit} are allowed")]
    TooLong { tokens: usize, limit: usize },
    #[error("formula ended early, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("variable map declares unknown variable `{name}`")]
    UnknownDeclaredVariable { name: String },
    #[error("unknown binding `{name}`")]
    UnknownBinding { name: String },
    #[error("variable `{name}` has no value bound")]
    UnboundVariable { name: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("formula result is not a finite number")]
    NonFiniteResult,
}

/// Which variable whitelist a formula is checked against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaKind {
    #[default]
    Product,
    CustomCut,
}

impl FormulaKind {
    pub fn allows(self, variable: Variable) -> bool {
        match self {
            Self::Product => !matches!(variable, Variable::CuttingFee | Variable::WasteRate),
            Self::CustomCut => true,
        }
    }

    pub fn variables(self) -> impl Iterator<Item = Variable> {
        Variable::ALL.into_iter().filter(move |variable| self.allows(*variable))
    }
}

impl std::str::FromStr for FormulaKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "product" => Ok(Self::Product),
            "custom_cut" => Ok(Self::CustomCut),
            other => Err(format!("unsupported formula kind `{other}` (expected product|custom_cut)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Width,
    Height,
    Weight,
    Quantity,
    TonPrice,
    UsdRate,
    EurRate,
    CuttingFee,
    WasteRate,
}

impl Variable {
    pub const ALL: [Variable; 9] = [
        Variable::Width,
        Variable::Height,
        Variable::Weight,
        Variable::Quantity,
        Variable::TonPrice,
        Variable::UsdRate,
        Variable::EurRate,
        Variable::CuttingFee,
        Variable::WasteRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::Quantity => "quantity",
            Self::TonPrice => "ton_price",
            Self::UsdRate => "usd_rate",
            Self::EurRate => "eur_rate",
            Self::CuttingFee => "cutting_fee",
            Self::WasteRate => "waste_rate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variable| variable.name() == name)
    }
}

/// Values bound to formula variables for one evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<Variable, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, variable: Variable, value: f64) -> Self {
        self.values.insert(variable, value);
        self
    }

    pub fn insert(&mut self, variable: Variable, value: f64) {
        self.values.insert(variable, value);
    }

    pub fn get(&self, variable: Variable) -> Option<f64> {
        self.values.get(&variable).copied()
    }

    /// Builds bindings from caller-supplied names, rejecting names outside the kind's whitelist.
    pub fn from_named(
        named: &BTreeMap<String, f64>,
        kind: FormulaKind,
    ) -> Result<Self, FormulaError> {
        let mut bindings = Self::new();
        for (name, value) in named {
            let variable = Variable::from_name(name.trim())
                .filter(|variable| kind.allows(*variable))
                .ok_or_else(|| FormulaError::UnknownBinding { name: name.clone() })?;
            bindings.insert(variable, *value);
        }
        Ok(bindings)
    }
}

/// A parsed admin formula, ready to evaluate against any number of bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    source: String,
    kind: FormulaKind,
    expr: Expr,
    variables: BTreeSet<Variable>,
}

impl Formula {
    pub fn parse(source: &str, kind: FormulaKind) -> Result<Self, FormulaError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::parse(&tokens, kind)?;

        let mut variables = BTreeSet::new();
        expr.visit_variables(&mut |variable| {
            variables.insert(variable);
        });

        Ok(Self { source: source.to_string(), kind, expr, variables })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> FormulaKind {
        self.kind
    }

    /// Variables the expression actually reads, in declaration order.
    pub fn variables(&self) -> &BTreeSet<Variable> {
        &self.variables
    }

    pub fn references(&self, variable: Variable) -> bool {
        self.variables.contains(&variable)
    }

    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64, FormulaError> {
        let value = evaluate(&self.expr, bindings)?;
        if !value.is_finite() {
            return Err(FormulaError::NonFiniteResult);
        }
        Ok(value)
    }
}

fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Variable(variable) => bindings
            .get(*variable)
            .ok_or(FormulaError::UnboundVariable { name: variable.name() }),
        Expr::Negate(inner) => Ok(-evaluate(inner, bindings)?),
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, bindings)?;
            let right = evaluate(right, bindings)?;
            match op {
                BinaryOp::Add => Ok(left + right),
                BinaryOp::Sub => Ok(left - right),
                BinaryOp::Mul => Ok(left * right),
                BinaryOp::Div => {
                    if right == 0.0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    Ok(left / right)
                }
            }
        }
    }
}

/// Parses and evaluates in one step, for the admin "preview" action.
pub fn preview(
    source: &str,
    kind: FormulaKind,
    named_bindings: &BTreeMap<String, f64>,
) -> Result<f64, FormulaError> {
    let formula = Formula::parse(source, kind)?;
    let bindings = Bindings::from_named(named_bindings, kind)?;
    formula.evaluate(&bindings)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{preview, Bindings, Formula, FormulaError, FormulaKind, Variable};

    const TOLERANCE: f64 = 1e-9;

    fn eval(source: &str) -> Result<f64, FormulaError> {
        Formula::parse(source, FormulaKind::Product)?.evaluate(&Bindings::new())
    }

    #[test]
    fn evaluates_ton_price_formula_over_bindings() {
        let formula = Formula::parse(
            "(width * height * weight * quantity * ton_price) / 1000000",
            FormulaKind::Product,
        )
        .expect("parse");
        let bindings = Bindings::new()
            .bind(Variable::Width, 70.0)
            .bind(Variable::Height, 100.0)
            .bind(Variable::Weight, 80.0)
            .bind(Variable::Quantity, 1.0)
            .bind(Variable::TonPrice, 850.0);

        let result = formula.evaluate(&bindings).expect("evaluate");
        assert!((result - 476.0).abs() < TOLERANCE, "got {result}");
    }

    #[test]
    fn honours_precedence_and_left_associativity() {
        assert!((eval("2 + 3 * 4").expect("eval") - 14.0).abs() < TOLERANCE);
        assert!((eval("(2 + 3) * 4").expect("eval") - 20.0).abs() < TOLERANCE);
        assert!((eval("10 - 4 - 3").expect("eval") - 3.0).abs() < TOLERANCE);
        assert!((eval("100 / 10 / 5").expect("eval") - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn supports_unary_minus() {
        assert!((eval("-3 * -2").expect("eval") - 6.0).abs() < TOLERANCE);
        assert!((eval("4 - -1").expect("eval") - 5.0).abs() < TOLERANCE);
        assert!((eval("-(1 + 2)").expect("eval") + 3.0).abs() < TOLERANCE);
    }

    #[test]
    fn reports_referenced_variables() {
        let formula = Formula::parse("width * width + usd_rate", FormulaKind::Product).expect("parse");
        let names: Vec<&str> = formula.variables().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["width", "usd_rate"]);
        assert!(formula.references(Variable::UsdRate));
        assert!(!formula.references(Variable::EurRate));
    }

    #[test]
    fn unbound_variable_fails_instead_of_reading_zero() {
        let formula = Formula::parse("width * eur_rate", FormulaKind::Product).expect("parse");
        let error = formula
            .evaluate(&Bindings::new().bind(Variable::Width, 10.0))
            .expect_err("eur_rate is unbound");
        assert_eq!(error, FormulaError::UnboundVariable { name: "eur_rate" });
    }

    #[test]
    fn unknown_identifier_fails_at_parse_time() {
        let error = Formula::parse("width * discount", FormulaKind::CustomCut).expect_err("unknown");
        assert_eq!(error, FormulaError::UnknownVariable { name: "discount".to_string(), position: 8 });
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval("1 / (2 - 2)"), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let formula = Formula::parse("width / 3 * height", FormulaKind::Product).expect("parse");
        let bindings = Bindings::new().bind(Variable::Width, 33.0).bind(Variable::Height, 48.7);
        let first = formula.evaluate(&bindings).expect("first");
        let second = formula.evaluate(&bindings).expect("second");
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn preview_rejects_bindings_outside_whitelist() {
        let mut named = BTreeMap::new();
        named.insert("width".to_string(), 10.0);
        named.insert("waste_rate".to_string(), 0.1);

        let error = preview("width", FormulaKind::Product, &named).expect_err("waste_rate");
        assert_eq!(error, FormulaError::UnknownBinding { name: "waste_rate".to_string() });

        let value = preview("width * (1 + waste_rate)", FormulaKind::CustomCut, &named)
            .expect("custom-cut preview");
        assert!((value - 11.0).abs() < TOLERANCE);
    }
}
