pub mod config;
pub mod doctor;
pub mod formula;
pub mod quote;

use paperquote_core::config::{AppConfig, LoadOptions};
use paperquote_core::reference::{FileReferenceSource, ReferenceData, ReferenceSource};
use paperquote_core::PricingError;
use serde::Serialize;

pub const EXIT_INTERNAL: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_REFERENCE_DATA: u8 = 3;
pub const EXIT_REJECTED: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_details(command, message, None)
    }

    pub fn success_with_details(
        command: &str,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Missing reference data is an operator problem; everything else means
    /// the request itself was refused.
    pub fn pricing_failure(command: &str, error: &PricingError) -> Self {
        let exit_code = match error {
            PricingError::MissingReferenceData { .. } => EXIT_REFERENCE_DATA,
            PricingError::InvalidInput { .. } | PricingError::FormulaEvaluation(_) => EXIT_REJECTED,
        };
        Self::failure(command, error.class(), error.to_string(), exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Config plus a fresh read of the reference file, or the failure to report.
pub(crate) fn load_reference(
    command: &str,
    options: LoadOptions,
) -> Result<(AppConfig, ReferenceData), CommandResult> {
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;

    let data = FileReferenceSource::new(&config.reference.path).load().map_err(|error| {
        CommandResult::failure(command, "reference_data", error.to_string(), EXIT_REFERENCE_DATA)
    })?;

    Ok((config, data))
}
