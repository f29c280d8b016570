use std::env;
use std::fs;
use std::path::Path;

use paperquote_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field<'a> {
    key: &'static str,
    env_key: &'static str,
    value: &'a str,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let reference_overridden = options.overrides.reference_path.is_some();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let reference_path = config.reference.path.display().to_string();
    let sheet_width = config.pricing.reference_sheet_width_cm.to_string();
    let sheet_height = config.pricing.reference_sheet_height_cm.to_string();
    let reference_weight = config.pricing.default_reference_weight_gsm.to_string();
    let port = config.server.port.to_string();
    let shutdown = config.server.graceful_shutdown_secs.to_string();
    let log_format = format!("{:?}", config.logging.format);

    let fields = [
        Field { key: "reference.path", env_key: "PAPERQUOTE_REFERENCE_PATH", value: &reference_path },
        Field {
            key: "pricing.reference_sheet_width_cm",
            env_key: "PAPERQUOTE_PRICING_REFERENCE_SHEET_WIDTH_CM",
            value: &sheet_width,
        },
        Field {
            key: "pricing.reference_sheet_height_cm",
            env_key: "PAPERQUOTE_PRICING_REFERENCE_SHEET_HEIGHT_CM",
            value: &sheet_height,
        },
        Field {
            key: "pricing.default_reference_weight_gsm",
            env_key: "PAPERQUOTE_PRICING_DEFAULT_REFERENCE_WEIGHT_GSM",
            value: &reference_weight,
        },
        Field {
            key: "server.bind_address",
            env_key: "PAPERQUOTE_SERVER_BIND_ADDRESS",
            value: &config.server.bind_address,
        },
        Field { key: "server.port", env_key: "PAPERQUOTE_SERVER_PORT", value: &port },
        Field {
            key: "server.graceful_shutdown_secs",
            env_key: "PAPERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS",
            value: &shutdown,
        },
        Field { key: "logging.level", env_key: "PAPERQUOTE_LOGGING_LEVEL", value: &config.logging.level },
        Field { key: "logging.format", env_key: "PAPERQUOTE_LOGGING_FORMAT", value: &log_format },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = if field.key == "reference.path" && reference_overridden {
            "flag (--reference)".to_string()
        } else {
            field_source(
                field.key,
                field.env_key,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            )
        };
        lines.push(render_line(field.key, field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var(env_key).is_ok_and(|value| !value.trim().is_empty()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;
    use toml::Value;

    #[test]
    fn dotted_paths_resolve_into_nested_tables() {
        let doc: Value = "[pricing]\nreference_sheet_width_cm = 50.0\n".parse().expect("toml");
        assert!(contains_path(&doc, "pricing.reference_sheet_width_cm"));
        assert!(!contains_path(&doc, "pricing.reference_sheet_height_cm"));
        assert!(!contains_path(&doc, "server.port"));
    }
}
