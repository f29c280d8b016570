use std::collections::BTreeMap;

use paperquote_core::config::{AppConfig, LoadOptions};
use paperquote_core::formula::{preview as preview_formula, Formula, FormulaKind};
use paperquote_core::reference::FileReferenceSource;
use serde_json::json;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_REFERENCE_DATA, EXIT_REJECTED};

const CHECK: &str = "formula check";
const PREVIEW: &str = "formula preview";

/// Checks one expression, or every formula record in the reference file
/// (inactive drafts included) when no expression is given.
pub fn check(options: LoadOptions, expression: Option<(String, FormulaKind)>) -> CommandResult {
    if let Some((source, kind)) = expression {
        return match Formula::parse(&source, kind) {
            Ok(formula) => {
                let variables: Vec<&str> =
                    formula.variables().iter().map(|variable| variable.name()).collect();
                CommandResult::success_with_details(
                    CHECK,
                    format!("formula is valid; reads [{}]", variables.join(", ")),
                    Some(json!({ "kind": kind, "variables": variables })),
                )
            }
            Err(error) => {
                CommandResult::failure(CHECK, "formula_evaluation", error.to_string(), EXIT_REJECTED)
            }
        };
    }

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                CHECK,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    let data = match FileReferenceSource::new(&config.reference.path).read() {
        Ok(data) => data,
        Err(error) => {
            return CommandResult::failure(
                CHECK,
                "reference_data",
                error.to_string(),
                EXIT_REFERENCE_DATA,
            );
        }
    };

    let mut lines = Vec::with_capacity(data.price_formulas.len());
    let mut failures = 0usize;
    for record in &data.price_formulas {
        let state = if record.is_active { "active" } else { "inactive" };
        match record.compile() {
            Ok(_) => lines.push(format!("- [ok] {} ({:?}, {state})", record.name, record.kind)),
            Err(error) => {
                failures += 1;
                lines.push(format!("- [fail] {} ({:?}, {state}): {error}", record.name, record.kind));
            }
        }
    }

    if failures > 0 {
        return CommandResult::failure(
            CHECK,
            "formula_evaluation",
            format!("{failures} of {} formulas are invalid\n{}", lines.len(), lines.join("\n")),
            EXIT_REJECTED,
        );
    }

    let summary = format!("{} formulas are valid", lines.len());
    if lines.is_empty() {
        return CommandResult::success(CHECK, summary);
    }
    CommandResult::success(CHECK, format!("{summary}\n{}", lines.join("\n")))
}

pub fn preview(source: &str, kind: FormulaKind, bindings: &[(String, f64)]) -> CommandResult {
    let named: BTreeMap<String, f64> = bindings.iter().cloned().collect();
    match preview_formula(source, kind, &named) {
        Ok(result) => CommandResult::success_with_details(
            PREVIEW,
            format!("result = {result}"),
            Some(json!({ "result": result })),
        ),
        Err(error) => {
            CommandResult::failure(PREVIEW, "formula_evaluation", error.to_string(), EXIT_REJECTED)
        }
    }
}

/// Parses `--bind name=value`.
pub fn parse_binding(raw: &str) -> Result<(String, f64), String> {
    let (name, value) =
        raw.split_once('=').ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("`{}` is not a number", value.trim()))?;
    Ok((name.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::{check, parse_binding, preview};
    use paperquote_core::config::LoadOptions;
    use paperquote_core::formula::FormulaKind;
    use serde_json::Value;

    fn payload(output: &str) -> Value {
        serde_json::from_str(output).expect("command output should be valid JSON")
    }

    #[test]
    fn bindings_parse_from_name_value_pairs() {
        assert_eq!(parse_binding("width=70"), Ok(("width".to_string(), 70.0)));
        assert_eq!(parse_binding(" usd_rate = 34.5 "), Ok(("usd_rate".to_string(), 34.5)));
        assert!(parse_binding("width").is_err());
        assert!(parse_binding("width=wide").is_err());
    }

    #[test]
    fn preview_evaluates_against_supplied_bindings() {
        let bindings = [
            ("width".to_string(), 70.0),
            ("height".to_string(), 100.0),
            ("weight".to_string(), 80.0),
            ("quantity".to_string(), 1.0),
            ("ton_price".to_string(), 850.0),
        ];
        let result = preview(
            "(width * height * weight * quantity * ton_price) / 1000000",
            FormulaKind::Product,
            &bindings,
        );

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload(&result.output)["details"]["result"], 476.0);
    }

    #[test]
    fn preview_reports_unbound_variables() {
        let result = preview("width * height", FormulaKind::Product, &[("width".to_string(), 1.0)]);
        assert_eq!(result.exit_code, 4);
        assert_eq!(payload(&result.output)["error_class"], "formula_evaluation");
    }

    #[test]
    fn single_expression_check_does_not_need_reference_data() {
        let result = check(
            LoadOptions::default(),
            Some(("cutting_fee * quantity".to_string(), FormulaKind::CustomCut)),
        );
        assert_eq!(result.exit_code, 0);
        let output = payload(&result.output);
        assert_eq!(output["details"]["variables"][0], "quantity");

        let rejected =
            check(LoadOptions::default(), Some(("cutting_fee".to_string(), FormulaKind::Product)));
        assert_eq!(rejected.exit_code, 4);
    }
}
