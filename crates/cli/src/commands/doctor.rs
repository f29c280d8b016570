use paperquote_core::config::{AppConfig, LoadOptions};
use paperquote_core::reference::{FileReferenceSource, ReferenceData, ReferenceSource};
use paperquote_core::Currency;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_REFERENCE_DATA};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = match report.checks.iter().find(|check| check.status == CheckStatus::Fail) {
        None => 0,
        Some(check) if check.name == "config_validation" => EXIT_CONFIG,
        Some(_) => EXIT_REFERENCE_DATA,
    };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });

            match FileReferenceSource::new(&config.reference.path).load() {
                Ok(data) => {
                    checks.push(DoctorCheck {
                        name: "reference_data",
                        status: CheckStatus::Pass,
                        details: format!("loaded `{}`", config.reference.path.display()),
                    });
                    checks.extend(readiness_checks(&data));
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "reference_data",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.extend(skipped("reference data did not load"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "reference_data",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.extend(skipped("configuration did not load"));
        }
    }

    // Skipped checks describe optional features; only failures block readiness.
    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn readiness_checks(data: &ReferenceData) -> Vec<DoctorCheck> {
    let summary = data.summary();
    let mut checks = Vec::new();

    let missing_rates: Vec<&str> = [Currency::Usd, Currency::Eur]
        .into_iter()
        .filter(|currency| !data.exchange_rates.iter().any(|rate| rate.currency == *currency))
        .map(Currency::code)
        .collect();
    checks.push(if missing_rates.is_empty() {
        DoctorCheck {
            name: "exchange_rates",
            status: CheckStatus::Pass,
            details: format!("{} rates loaded", summary.exchange_rates),
        }
    } else {
        DoctorCheck {
            name: "exchange_rates",
            status: CheckStatus::Fail,
            details: format!(
                "no rate for {}; quotes in that currency will be refused",
                missing_rates.join(", ")
            ),
        }
    });

    checks.push(if summary.standard_formulas > 0 {
        DoctorCheck {
            name: "standard_formula",
            status: CheckStatus::Pass,
            details: format!("{} standard formulas", summary.standard_formulas),
        }
    } else {
        DoctorCheck {
            name: "standard_formula",
            status: CheckStatus::Fail,
            details: "no standard formula; roll and sheet quotes will be refused".to_string(),
        }
    });

    checks.push(if summary.cutting_fee_active {
        DoctorCheck {
            name: "cutting_fee",
            status: CheckStatus::Pass,
            details: "active cutting fee loaded".to_string(),
        }
    } else {
        DoctorCheck {
            name: "cutting_fee",
            status: CheckStatus::Fail,
            details: "no active cutting fee; custom-cut quotes will be refused".to_string(),
        }
    });

    checks.push(if summary.active_price_formulas > 0 {
        DoctorCheck {
            name: "price_formulas",
            status: CheckStatus::Pass,
            details: format!("{} active formulas compile", summary.active_price_formulas),
        }
    } else {
        DoctorCheck {
            name: "price_formulas",
            status: CheckStatus::Skipped,
            details: "no active formula; formula-priced products are unavailable".to_string(),
        }
    });

    checks
}

fn skipped(reason: &str) -> Vec<DoctorCheck> {
    ["exchange_rates", "standard_formula", "cutting_fee", "price_formulas"]
        .into_iter()
        .map(|name| DoctorCheck {
            name,
            status: CheckStatus::Skipped,
            details: format!("skipped because {reason}"),
        })
        .collect()
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
