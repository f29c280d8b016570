use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::{ReferenceSheet, DEFAULT_REFERENCE_WEIGHT_GSM};

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["paperquote.toml", "config/paperquote.toml"];

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub reference: ReferenceConfig,
    pub pricing: PricingSettings,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceConfig {
    /// JSON or TOML export of the backend's rate, fee, formula and product tables.
    pub path: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    pub reference_sheet_width_cm: f64,
    pub reference_sheet_height_cm: f64,
    pub default_reference_weight_gsm: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        let sheet = ReferenceSheet::default();
        Self {
            reference_sheet_width_cm: sheet.width_cm,
            reference_sheet_height_cm: sheet.height_cm,
            default_reference_weight_gsm: DEFAULT_REFERENCE_WEIGHT_GSM,
        }
    }
}

impl PricingSettings {
    pub fn reference_sheet(&self) -> ReferenceSheet {
        ReferenceSheet {
            width_cm: self.reference_sheet_width_cm,
            height_cm: self.reference_sheet_height_cm,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub reference_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub bind_address: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reference: ReferenceConfig { path: PathBuf::from("data/reference.json") },
            pricing: PricingSettings::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(reference) = patch.reference {
            if let Some(path) = reference.path {
                self.reference.path = path;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(width) = pricing.reference_sheet_width_cm {
                self.pricing.reference_sheet_width_cm = width;
            }
            if let Some(height) = pricing.reference_sheet_height_cm {
                self.pricing.reference_sheet_height_cm = height;
            }
            if let Some(weight) = pricing.default_reference_weight_gsm {
                self.pricing.default_reference_weight_gsm = weight;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PAPERQUOTE_REFERENCE_PATH") {
            self.reference.path = PathBuf::from(value);
        }

        if let Some(value) = read_env("PAPERQUOTE_PRICING_REFERENCE_SHEET_WIDTH_CM") {
            self.pricing.reference_sheet_width_cm =
                parse_f64("PAPERQUOTE_PRICING_REFERENCE_SHEET_WIDTH_CM", &value)?;
        }
        if let Some(value) = read_env("PAPERQUOTE_PRICING_REFERENCE_SHEET_HEIGHT_CM") {
            self.pricing.reference_sheet_height_cm =
                parse_f64("PAPERQUOTE_PRICING_REFERENCE_SHEET_HEIGHT_CM", &value)?;
        }
        if let Some(value) = read_env("PAPERQUOTE_PRICING_DEFAULT_REFERENCE_WEIGHT_GSM") {
            self.pricing.default_reference_weight_gsm =
                parse_f64("PAPERQUOTE_PRICING_DEFAULT_REFERENCE_WEIGHT_GSM", &value)?;
        }

        if let Some(value) = read_env("PAPERQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PAPERQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("PAPERQUOTE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PAPERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PAPERQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PAPERQUOTE_LOGGING_LEVEL").or_else(|| read_env("PAPERQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PAPERQUOTE_LOGGING_FORMAT").or_else(|| read_env("PAPERQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(reference_path) = overrides.reference_path {
            self.reference.path = reference_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_reference(&self.reference)?;
        validate_pricing(&self.pricing)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The file `load` would read: the explicit path if it exists, else the first
/// default candidate present in the working directory.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_reference(reference: &ReferenceConfig) -> Result<(), ConfigError> {
    if reference.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("reference.path must not be empty".to_string()));
    }

    let supported = reference
        .path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| matches!(extension.to_ascii_lowercase().as_str(), "json" | "toml"))
        .unwrap_or(false);
    if !supported {
        return Err(ConfigError::Validation(format!(
            "reference.path `{}` must end in .json or .toml",
            reference.path.display()
        )));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingSettings) -> Result<(), ConfigError> {
    let dimensions = [
        ("pricing.reference_sheet_width_cm", pricing.reference_sheet_width_cm),
        ("pricing.reference_sheet_height_cm", pricing.reference_sheet_height_cm),
        ("pricing.default_reference_weight_gsm", pricing.default_reference_weight_gsm),
    ];
    for (key, value) in dimensions {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Validation(format!("{key} must be a positive number")));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    reference: Option<ReferencePatch>,
    pricing: Option<PricingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ReferencePatch {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    reference_sheet_width_cm: Option<f64>,
    reference_sheet_height_cm: Option<f64>,
    default_reference_weight_gsm: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;
        ensure(config.pricing.reference_sheet().area_cm2() == 7000.0, "default sheet is 70x100")?;
        ensure(config.pricing.default_reference_weight_gsm == 80.0, "default weight is 80 gsm")?;
        ensure(config.logging.format == LogFormat::Compact, "default format is compact")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PAPERQUOTE_DATA_DIR", "/srv/paperquote");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paperquote.toml");
            fs::write(
                &path,
                r#"
[reference]
path = "${TEST_PAPERQUOTE_DATA_DIR}/reference.toml"

[pricing]
default_reference_weight_gsm = 90.0
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.reference.path == PathBuf::from("/srv/paperquote/reference.toml"),
                "reference path should be interpolated from environment",
            )?;
            ensure(
                config.pricing.default_reference_weight_gsm == 90.0,
                "pricing section should be read from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_PAPERQUOTE_DATA_DIR"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("paperquote.toml");
        fs::write(&path, "[reference]\npath = \"${PAPERQUOTE_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let error = match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Ok(_) => return Err("expected interpolation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "PAPERQUOTE_TEST_UNSET_VAR"),
            "error should name the unset variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAPERQUOTE_LOG_LEVEL", "warn");
        env::set_var("PAPERQUOTE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["PAPERQUOTE_LOG_LEVEL", "PAPERQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAPERQUOTE_SERVER_PORT", "9090");
        env::set_var("PAPERQUOTE_PRICING_REFERENCE_SHEET_WIDTH_CM", "35");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("paperquote.toml");
            fs::write(
                &path,
                r#"
[reference]
path = "from-file.json"

[pricing]
reference_sheet_width_cm = 50.0
reference_sheet_height_cm = 70.0

[server]
port = 7070

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    reference_path: Some(PathBuf::from("from-override.toml")),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.reference.path == PathBuf::from("from-override.toml"),
                "override reference path should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(
                config.pricing.reference_sheet_width_cm == 35.0,
                "env sheet width should win over file",
            )?;
            ensure(
                config.pricing.reference_sheet_height_cm == 70.0,
                "file sheet height should win over default",
            )?;
            Ok(())
        })();

        clear_vars(&["PAPERQUOTE_SERVER_PORT", "PAPERQUOTE_PRICING_REFERENCE_SHEET_WIDTH_CM"]);
        result
    }

    #[test]
    fn malformed_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAPERQUOTE_SERVER_PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "PAPERQUOTE_SERVER_PORT"),
                "error should name the env key",
            )
        })();

        clear_vars(&["PAPERQUOTE_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PAPERQUOTE_PRICING_DEFAULT_REFERENCE_WEIGHT_GSM", "-5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("pricing.default_reference_weight_gsm")
            );
            ensure(has_message, "validation failure should name the pricing key")
        })();

        clear_vars(&["PAPERQUOTE_PRICING_DEFAULT_REFERENCE_WEIGHT_GSM"]);
        result
    }

    #[test]
    fn reference_file_must_be_json_or_toml() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                reference_path: Some(PathBuf::from("reference.csv")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("reference.path")),
            "validation failure should mention reference.path",
        )
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let missing = dir.path().join("absent.toml");
        let result = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(ref path)) if *path == missing),
            "missing required file should be reported",
        )
    }
}
