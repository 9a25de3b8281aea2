use std::fs;
use std::path::{Path, PathBuf};

use tierwise_core::config::{read_env, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct FieldSources<'a> {
    config_file_doc: Option<&'a Value>,
    config_file_path: Option<&'a Path>,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::config_failure(
                "config",
                format!("config validation failed: {error}"),
            );
        }
    };

    let config_file_path = detect_config_path(explicit_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources = FieldSources {
        config_file_doc: config_file_doc.as_ref(),
        config_file_path: config_file_path.as_deref(),
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "currency.code",
        &config.currency.code,
        sources.field_source("currency.code", &["TIERWISE_CURRENCY_CODE"]),
    ));
    lines.push(render_line(
        "currency.minor_unit_exponent",
        &config.currency.minor_unit_exponent.to_string(),
        sources.field_source(
            "currency.minor_unit_exponent",
            &["TIERWISE_CURRENCY_MINOR_UNIT_EXPONENT"],
        ),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        sources.field_source("logging.level", &["TIERWISE_LOGGING_LEVEL", "TIERWISE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        sources
            .field_source("logging.format", &["TIERWISE_LOGGING_FORMAT", "TIERWISE_LOG_FORMAT"]),
    ));

    let policy_file = config
        .policy
        .file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "policy.file",
        &policy_file,
        sources.field_source("policy.file", &["TIERWISE_POLICY_FILE"]),
    ));

    let policy_file_doc = load_config_file_doc(config.policy.file.as_deref());
    lines.push(render_line(
        "policy.tiers",
        &format!("{} tiers", config.policy.tiers.len()),
        sources.table_source("tiers", config.policy.file.as_deref(), policy_file_doc.as_ref()),
    ));
    lines.push(render_line(
        "policy.supplemental_rules",
        &format!("{} rules", config.policy.supplemental_rules.len()),
        sources.table_source(
            "supplemental_rules",
            config.policy.file.as_deref(),
            policy_file_doc.as_ref(),
        ),
    ));

    CommandResult::text(lines.join("\n"))
}

impl FieldSources<'_> {
    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| read_env(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = self.config_file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .config_file_path
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }

    /// The policy file only replaces the tables it declares; anything else
    /// keeps its main-config or default source.
    fn table_source(
        &self,
        table: &str,
        policy_file: Option<&Path>,
        policy_file_doc: Option<&Value>,
    ) -> String {
        if let (Some(path), Some(doc)) = (policy_file, policy_file_doc) {
            if contains_path(doc, table) {
                return format!("policy file ({})", path.display());
            }
        }
        self.field_source(&format!("policy.{table}"), &[])
    }
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("tierwise.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tierwise.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
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
    use toml::Value;

    use super::contains_path;

    #[test]
    fn nested_paths_are_detected_in_toml_documents() {
        let doc = "[currency]\ncode = \"EUR\"\n\n[[policy.tiers]]\nid = \"a\"\n"
            .parse::<Value>()
            .unwrap_or_else(|error| panic!("fixture should parse: {error}"));

        assert!(contains_path(&doc, "currency.code"));
        assert!(contains_path(&doc, "policy.tiers"));
        assert!(!contains_path(&doc, "currency.minor_unit_exponent"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
