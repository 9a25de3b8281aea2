use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::amount::MAX_MINOR_UNIT_EXPONENT;
use crate::errors::ConfigurationError;
use crate::evaluator::ApprovalEvaluator;
use crate::supplemental::SupplementalRule;
use crate::tiers::Tier;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub currency: CurrencyConfig,
    pub logging: LoggingConfig,
    pub policy: PolicyConfig,
}

#[derive(Clone, Debug)]
pub struct CurrencyConfig {
    pub code: String,
    pub minor_unit_exponent: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Separate TOML file holding `[[tiers]]` and `[[supplemental_rules]]`.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub tiers: Vec<Tier>,
    #[serde(default)]
    pub supplemental_rules: Vec<SupplementalRule>,
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
    pub currency_code: Option<String>,
    pub minor_unit_exponent: Option<u32>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub policy_file: Option<PathBuf>,
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
    #[error("approval policy is invalid: {0}")]
    Policy(#[from] ConfigurationError),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyConfig { code: "USD".to_string(), minor_unit_exponent: 2 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            file: None,
            tiers: vec![
                default_tier(
                    "standard",
                    1,
                    "Standard",
                    0,
                    Some(99_999),
                    0,
                    "Processed without additional approval",
                ),
                default_tier(
                    "manager",
                    2,
                    "Manager",
                    100_000,
                    Some(999_999),
                    1,
                    "Requires approval from a manager",
                ),
                default_tier(
                    "director",
                    3,
                    "Director",
                    1_000_000,
                    Some(9_999_999),
                    2,
                    "Requires approval from a manager and a director",
                ),
                default_tier(
                    "executive",
                    4,
                    "Executive",
                    10_000_000,
                    None,
                    3,
                    "Requires approval from a manager, a director and an executive",
                ),
            ],
            supplemental_rules: vec![SupplementalRule {
                id: "wire-eft-step-up".to_string(),
                applies_to_categories: vec!["wire".to_string(), "eft".to_string()],
                threshold_amount: 1_000_000,
                requirement_tag: "step-up-verification".to_string(),
                unconditional: false,
            }],
        }
    }
}

fn default_tier(
    id: &str,
    level: u32,
    name: &str,
    min_amount: i64,
    max_amount: Option<i64>,
    required_approvers: u32,
    description: &str,
) -> Tier {
    Tier {
        id: id.to_string(),
        level,
        name: name.to_string(),
        min_amount,
        max_amount,
        required_approvers,
        description: description.to_string(),
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
    /// Loads every layer and confirms the policy builds into an evaluator.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let config = Self::load_settings(options)?;
        config.build_evaluator()?;

        debug!(
            event_name = "engine.config.loaded",
            currency = %config.currency.code,
            minor_unit_exponent = config.currency.minor_unit_exponent,
            tiers = config.policy.tiers.len(),
            supplemental_rules = config.policy.supplemental_rules.len(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Loads every layer but only validates currency and logging settings.
    /// The policy tables are read, not checked.
    pub fn load_settings(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_toml::<ConfigPatch>(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tierwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.load_policy_file()?;
        config.validate_settings()?;

        Ok(config)
    }

    pub fn build_evaluator(&self) -> Result<ApprovalEvaluator, ConfigError> {
        Ok(ApprovalEvaluator::from_config(&self.policy)?)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(currency) = patch.currency {
            if let Some(code) = currency.code {
                self.currency.code = code;
            }
            if let Some(minor_unit_exponent) = currency.minor_unit_exponent {
                self.currency.minor_unit_exponent = minor_unit_exponent;
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

        if let Some(policy) = patch.policy {
            if let Some(file) = policy.file {
                self.policy.file = Some(file);
            }
            if let Some(tiers) = policy.tiers {
                self.policy.tiers = tiers;
            }
            if let Some(supplemental_rules) = policy.supplemental_rules {
                self.policy.supplemental_rules = supplemental_rules;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TIERWISE_CURRENCY_CODE") {
            self.currency.code = value;
        }
        if let Some(value) = read_env("TIERWISE_CURRENCY_MINOR_UNIT_EXPONENT") {
            self.currency.minor_unit_exponent =
                parse_u32("TIERWISE_CURRENCY_MINOR_UNIT_EXPONENT", &value)?;
        }

        let log_level =
            read_env("TIERWISE_LOGGING_LEVEL").or_else(|| read_env("TIERWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TIERWISE_LOGGING_FORMAT").or_else(|| read_env("TIERWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("TIERWISE_POLICY_FILE") {
            self.policy.file = Some(PathBuf::from(value));
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(currency_code) = overrides.currency_code {
            self.currency.code = currency_code;
        }
        if let Some(minor_unit_exponent) = overrides.minor_unit_exponent {
            self.currency.minor_unit_exponent = minor_unit_exponent;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(policy_file) = overrides.policy_file {
            self.policy.file = Some(policy_file);
        }
    }

    fn load_policy_file(&mut self) -> Result<(), ConfigError> {
        let Some(path) = self.policy.file.clone() else {
            return Ok(());
        };
        if !path.exists() {
            return Err(ConfigError::MissingConfigFile(path));
        }

        let patch = read_toml::<PolicyFilePatch>(&path)?;
        if let Some(tiers) = patch.tiers {
            self.policy.tiers = tiers;
        }
        if let Some(supplemental_rules) = patch.supplemental_rules {
            self.policy.supplemental_rules = supplemental_rules;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_settings()?;
        ApprovalEvaluator::from_config(&self.policy)?;
        Ok(())
    }

    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        validate_currency(&self.currency)?;
        validate_logging(&self.logging)
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tierwise.toml"), PathBuf::from("config/tierwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<T>(&interpolated)
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

fn validate_currency(currency: &CurrencyConfig) -> Result<(), ConfigError> {
    let code = currency.code.trim();
    if code.len() != 3 || !code.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(ConfigError::Validation(
            "currency.code must be a three-letter uppercase ISO 4217 code (e.g. `USD`)"
                .to_string(),
        ));
    }

    if currency.minor_unit_exponent > MAX_MINOR_UNIT_EXPONENT {
        return Err(ConfigError::Validation(format!(
            "currency.minor_unit_exponent must be in range 0..={MAX_MINOR_UNIT_EXPONENT}"
        )));
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

/// Value of `key`, treating unset and blank variables alike.
pub fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    currency: Option<CurrencyPatch>,
    logging: Option<LoggingPatch>,
    policy: Option<PolicyPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrencyPatch {
    code: Option<String>,
    minor_unit_exponent: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyPatch {
    file: Option<PathBuf>,
    tiers: Option<Vec<Tier>>,
    supplemental_rules: Option<Vec<SupplementalRule>>,
}

#[derive(Debug, Default, Deserialize)]
struct PolicyFilePatch {
    tiers: Option<Vec<Tier>>,
    supplemental_rules: Option<Vec<SupplementalRule>>,
}
