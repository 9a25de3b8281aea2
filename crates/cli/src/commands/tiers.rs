use serde::Serialize;
use tierwise_core::config::{AppConfig, LoadOptions};
use tierwise_core::{MinorUnits, SupplementalRule, Tier};

use crate::commands::CommandResult;

const COMMAND: &str = "tiers";

#[derive(Debug, Serialize)]
struct TiersBody<'a> {
    currency: &'a str,
    minor_unit_exponent: u32,
    tiers: &'a [Tier],
    supplemental_rules: Vec<&'a SupplementalRule>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let config = match AppConfig::load_settings(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, error.to_string()),
    };
    let evaluator = match config.build_evaluator() {
        Ok(evaluator) => evaluator,
        Err(error) => return CommandResult::config_failure(COMMAND, error.to_string()),
    };

    let currency = &config.currency;
    if json_output {
        return CommandResult::success_json(
            COMMAND,
            TiersBody {
                currency: &currency.code,
                minor_unit_exponent: currency.minor_unit_exponent,
                tiers: evaluator.table().tiers(),
                supplemental_rules: evaluator.policy().rules().collect(),
            },
        );
    }

    let exponent = currency.minor_unit_exponent;
    let mut lines = vec![format!("tiers ({}):", currency.code)];
    for tier in evaluator.table().tiers() {
        let range = match tier.max_amount {
            Some(max_amount) => {
                format!("{} ..= {}", major(tier.min_amount, exponent), major(max_amount, exponent))
            }
            None => format!("{} .. unbounded", major(tier.min_amount, exponent)),
        };
        lines.push(format!(
            "- [{}] {} {}: {range}, approvers {}",
            tier.level, tier.id, tier.name, tier.required_approvers
        ));
    }

    lines.push("supplemental rules:".to_string());
    if evaluator.policy().is_empty() {
        lines.push("- none".to_string());
    }
    for rule in evaluator.policy().rules() {
        let categories = if rule.applies_to_categories.is_empty() {
            "all categories".to_string()
        } else {
            rule.applies_to_categories.join(", ")
        };
        lines.push(format!(
            "- {}: {} at >= {} for {categories}",
            rule.id,
            rule.requirement_tag,
            major(rule.threshold_amount, exponent)
        ));
    }

    CommandResult::text(lines.join("\n"))
}

fn major(amount: i64, exponent: u32) -> String {
    // Validated tables never hold negative bounds.
    MinorUnits::new(amount)
        .map(|amount| amount.to_major(exponent).to_string())
        .unwrap_or_else(|_| amount.to_string())
}
