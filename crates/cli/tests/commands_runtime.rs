use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

use serde_json::Value;
use tempfile::TempDir;
use tierwise_cli::commands::evaluate::{self, EvaluateArgs};
use tierwise_cli::commands::{config, doctor, tiers};
use tierwise_core::config::LoadOptions;

const GAPPED_POLICY: &str = r#"
[[policy.tiers]]
id = "low"
level = 1
name = "Low"
min_amount = 0
max_amount = 999
required_approvers = 0

[[policy.tiers]]
id = "high"
level = 2
name = "High"
min_amount = 1001
required_approvers = 1
"#;

#[test]
fn evaluate_reports_step_up_for_large_wire() {
    with_env(&[], || {
        let result = evaluate::run(
            default_options(),
            &EvaluateArgs {
                amount: "10000.00".to_string(),
                category: Some("wire".to_string()),
                json: true,
                ..EvaluateArgs::default()
            },
        );
        assert_eq!(result.exit_code, 0, "expected successful evaluation");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "evaluate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["currency"], "USD");
        assert_eq!(payload["amount_major"], "10000.00");
        assert_eq!(payload["decision"]["matched_tier"]["name"], "Director");
        assert_eq!(payload["decision"]["required_approvers"], 2);
        assert_eq!(payload["decision"]["supplemental_requirements"][0], "step-up-verification");
        assert_eq!(payload["decision"]["is_immediately_approvable"], false);
    });
}

#[test]
fn evaluate_just_below_threshold_skips_step_up() {
    with_env(&[], || {
        let result = evaluate::run(
            default_options(),
            &EvaluateArgs {
                amount: "999999".to_string(),
                category: Some("wire".to_string()),
                minor_units: true,
                json: true,
            },
        );
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["decision"]["matched_tier"]["id"], "manager");
        assert_eq!(payload["decision"]["supplemental_requirements"], Value::Array(Vec::new()));
    });
}

#[test]
fn evaluate_zero_is_immediately_approvable_in_human_output() {
    with_env(&[], || {
        let result = evaluate::run(
            default_options(),
            &EvaluateArgs { amount: "0".to_string(), ..EvaluateArgs::default() },
        );
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("decision: Standard tier (level 1) for USD 0.00"));
        assert!(result.output.contains("- immediately_approvable = true"));
        assert!(result.output.contains("[uncategorized]"));
    });
}

#[test]
fn evaluate_rejects_negative_and_nan_amounts() {
    with_env(&[], || {
        for raw in ["-1", "NaN"] {
            let result = evaluate::run(
                default_options(),
                &EvaluateArgs {
                    amount: raw.to_string(),
                    category: Some("wire".to_string()),
                    ..EvaluateArgs::default()
                },
            );
            assert_eq!(result.exit_code, 3, "expected invalid amount exit code for {raw}");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "evaluate");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "invalid_amount");
        }
    });
}

#[test]
fn evaluate_returns_config_failure_for_gapped_policy() {
    with_env(&[], || {
        let dir = temp_dir();
        let path = write_file(&dir, "tierwise.toml", GAPPED_POLICY);

        let result = evaluate::run(
            options_for(path),
            &EvaluateArgs { amount: "5".to_string(), ..EvaluateArgs::default() },
        );
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("gap"));
    });
}

#[test]
fn evaluate_uses_currency_exponent_from_env() {
    let vars = [("TIERWISE_CURRENCY_CODE", "JPY"), ("TIERWISE_CURRENCY_MINOR_UNIT_EXPONENT", "0")];
    with_env(&vars, || {
        let result = evaluate::run(
            default_options(),
            &EvaluateArgs { amount: "100000".to_string(), json: true, ..EvaluateArgs::default() },
        );
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["currency"], "JPY");
        assert_eq!(payload["amount_major"], "100000");
        assert_eq!(payload["decision"]["amount"], 100_000);
        assert_eq!(payload["decision"]["matched_tier"]["id"], "manager");
    });
}

#[test]
fn tiers_lists_default_policy_as_json() {
    with_env(&[], || {
        let result = tiers::run(default_options(), true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "tiers");
        assert_eq!(payload["tiers"].as_array().map(Vec::len), Some(4));
        assert_eq!(payload["tiers"][3]["max_amount"], Value::Null);
        assert_eq!(payload["supplemental_rules"][0]["requirement_tag"], "step-up-verification");
    });
}

#[test]
fn tiers_human_output_renders_major_units() {
    with_env(&[], || {
        let result = tiers::run(default_options(), false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("- [1] standard Standard: 0.00 ..= 999.99, approvers 0"));
        assert!(result.output.contains("- [4] executive Executive: 100000.00 .. unbounded"));
        assert!(result.output.contains("step-up-verification at >= 10000.00 for wire, eft"));
    });
}

#[test]
fn config_reports_env_and_file_sources() {
    with_env(&[("TIERWISE_LOG_LEVEL", "warn")], || {
        let dir = temp_dir();
        let path = write_file(&dir, "tierwise.toml", "[currency]\ncode = \"EUR\"\n");

        let result = config::run(options_for(path));
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("- currency.code = EUR (source: file ("));
        assert!(result.output.contains("- logging.level = warn (source: env (TIERWISE_LOG_LEVEL))"));
        assert!(result.output.contains("- currency.minor_unit_exponent = 2 (source: default)"));
        assert!(result.output.contains("- policy.tiers = 4 tiers (source: default)"));
    });
}

#[test]
fn doctor_passes_with_default_policy() {
    with_env(&[], || {
        let result = doctor::run(default_options(), true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(3));
        assert_eq!(payload["checks"][2]["name"], "tier_boundaries");
    });
}

#[test]
fn doctor_skips_policy_checks_when_config_fails() {
    with_env(&[("TIERWISE_LOGGING_LEVEL", "verbose")], || {
        let result = doctor::run(default_options(), false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation"));
        assert!(result.output.contains("- [skip] policy_construction"));
    });
}

#[test]
fn config_ignores_blank_env_when_attributing_sources() {
    with_env(&[("TIERWISE_CURRENCY_CODE", "")], || {
        let dir = temp_dir();
        let path = write_file(&dir, "tierwise.toml", "[currency]\ncode = \"EUR\"\n");

        let result = config::run(options_for(path));
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("- currency.code = EUR (source: file ("));
        assert!(!result.output.contains("env (TIERWISE_CURRENCY_CODE)"));
    });
}

#[test]
fn config_credits_policy_file_only_for_tables_it_declares() {
    with_env(&[], || {
        let dir = temp_dir();
        let policy_path = write_file(
            &dir,
            "policy.toml",
            r#"
[[tiers]]
id = "all"
level = 1
name = "All"
min_amount = 0
required_approvers = 1
"#,
        );
        let config_path = write_file(
            &dir,
            "tierwise.toml",
            &format!("[policy]\nfile = {:?}\n", policy_path.display().to_string()),
        );

        let result = config::run(options_for(config_path));
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert!(result.output.contains("- policy.tiers = 1 tiers (source: policy file ("));
        assert!(result
            .output
            .contains("- policy.supplemental_rules = 1 rules (source: default)"));
    });
}

#[test]
fn doctor_attributes_gapped_policy_to_policy_construction() {
    with_env(&[], || {
        let dir = temp_dir();
        let path = write_file(&dir, "tierwise.toml", GAPPED_POLICY);

        let result = doctor::run(options_for(path), true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "pass");
        assert_eq!(payload["checks"][1]["name"], "policy_construction");
        assert_eq!(payload["checks"][1]["status"], "fail");
        assert!(payload["checks"][1]["details"].as_str().unwrap_or("").contains("gap"));
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

fn default_options() -> LoadOptions {
    // Point at a path that never exists so a stray tierwise.toml in the
    // working directory cannot leak into the defaults.
    LoadOptions {
        config_path: Some(env::temp_dir().join("tierwise-absent-config.toml")),
        ..LoadOptions::default()
    }
}

fn options_for(path: PathBuf) -> LoadOptions {
    LoadOptions { config_path: Some(path), require_file: true, ..LoadOptions::default() }
}

fn temp_dir() -> TempDir {
    TempDir::new().expect("temp dir should be created")
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("config file should be written");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

struct EnvRestore {
    previous_values: Vec<(&'static str, Option<String>)>,
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in &self.previous_values {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    // A failed test must not poison the lock for the rest of the suite.
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(PoisonError::into_inner);

    const KEYS: [&str; 7] = [
        "TIERWISE_CURRENCY_CODE",
        "TIERWISE_CURRENCY_MINOR_UNIT_EXPONENT",
        "TIERWISE_LOGGING_LEVEL",
        "TIERWISE_LOGGING_FORMAT",
        "TIERWISE_LOG_LEVEL",
        "TIERWISE_LOG_FORMAT",
        "TIERWISE_POLICY_FILE",
    ];

    // Declared after the lock guard so it drops first and restores while locked.
    let _restore = EnvRestore {
        previous_values: KEYS.iter().map(|key| (*key, env::var(key).ok())).collect(),
    };

    for key in KEYS {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();
}
