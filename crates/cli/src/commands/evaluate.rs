use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tierwise_core::config::{AppConfig, LoadOptions};
use tierwise_core::{Decision, EngineError, IntoMinorUnits, InvalidAmountError, MinorUnits};
use tracing::info;

use crate::commands::CommandResult;

const COMMAND: &str = "evaluate";

#[derive(Clone, Debug, Default)]
pub struct EvaluateArgs {
    pub amount: String,
    pub category: Option<String>,
    /// Treat `amount` as an integer count of minor units instead of major units.
    pub minor_units: bool,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct EvaluateBody<'a> {
    currency: &'a str,
    amount_major: String,
    decision: &'a Decision,
}

pub fn run(options: LoadOptions, args: &EvaluateArgs) -> CommandResult {
    let config = match AppConfig::load_settings(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, error.to_string()),
    };
    let evaluator = match config.build_evaluator() {
        Ok(evaluator) => evaluator,
        Err(error) => return CommandResult::config_failure(COMMAND, error.to_string()),
    };

    let exponent = config.currency.minor_unit_exponent;
    let amount = match parse_amount(&args.amount, args.minor_units, exponent) {
        Ok(amount) => amount,
        Err(error) => return CommandResult::engine_failure(COMMAND, &EngineError::from(error)),
    };

    let decision = match evaluator.evaluate(amount, args.category.as_deref()) {
        Ok(decision) => decision,
        Err(error) => return CommandResult::engine_failure(COMMAND, &EngineError::from(error)),
    };

    info!(
        event_name = "cli.evaluate.completed",
        amount = amount.value(),
        tier_id = %decision.matched_tier.id,
        required_approvers = decision.required_approvers,
        is_immediately_approvable = decision.is_immediately_approvable,
        "evaluated approval requirements"
    );

    let amount_major = amount.to_major(exponent).to_string();
    if args.json {
        return CommandResult::success_json(
            COMMAND,
            EvaluateBody { currency: &config.currency.code, amount_major, decision: &decision },
        );
    }

    CommandResult::text(render_human(&config.currency.code, &amount_major, &decision))
}

pub fn parse_amount(
    raw: &str,
    minor_units: bool,
    exponent: u32,
) -> Result<MinorUnits, InvalidAmountError> {
    let trimmed = raw.trim();
    if minor_units {
        return trimmed
            .parse::<i64>()
            .map_err(|_| invalid_number(trimmed))
            .and_then(IntoMinorUnits::into_minor_units);
    }

    let value = Decimal::from_str(trimmed).map_err(|_| invalid_number(trimmed))?;
    MinorUnits::from_major(value, exponent)
}

const NON_FINITE_TOKENS: &[&str] =
    &["nan", "+nan", "-nan", "inf", "+inf", "-inf", "infinity", "+infinity", "-infinity"];

fn invalid_number(raw: &str) -> InvalidAmountError {
    let lowered = raw.to_ascii_lowercase();
    if NON_FINITE_TOKENS.contains(&lowered.as_str()) {
        return InvalidAmountError::NotFinite;
    }

    match Decimal::from_str(raw) {
        Ok(value) if value < Decimal::ZERO => {
            InvalidAmountError::Negative { value: raw.to_string() }
        }
        Ok(value) if !value.fract().is_zero() => {
            InvalidAmountError::Fractional { value: raw.to_string() }
        }
        Ok(_) => InvalidAmountError::OutOfRange { value: raw.to_string() },
        Err(_) => InvalidAmountError::Unparseable { value: raw.to_string() },
    }
}

fn render_human(currency: &str, amount_major: &str, decision: &Decision) -> String {
    let category = decision.category.as_deref().unwrap_or("uncategorized");
    let requirements = if decision.supplemental_requirements.is_empty() {
        "none".to_string()
    } else {
        decision.supplemental_requirements.join(", ")
    };

    [
        format!(
            "decision: {} tier (level {}) for {currency} {amount_major} [{category}]",
            decision.matched_tier.name, decision.matched_tier.level
        ),
        format!("- required_approvers = {}", decision.required_approvers),
        format!("- supplemental_requirements = {requirements}"),
        format!("- immediately_approvable = {}", decision.is_immediately_approvable),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use tierwise_core::InvalidAmountError;

    use super::parse_amount;

    #[test]
    fn major_unit_strings_convert_using_exponent() {
        assert_eq!(parse_amount("10000.00", false, 2).map(|a| a.value()), Ok(1_000_000));
        assert_eq!(parse_amount(" 999.99 ", false, 2).map(|a| a.value()), Ok(99_999));
        assert_eq!(parse_amount("1500", false, 0).map(|a| a.value()), Ok(1500));
    }

    #[test]
    fn minor_unit_strings_must_be_integers() {
        assert_eq!(parse_amount("1000000", true, 2).map(|a| a.value()), Ok(1_000_000));
        assert!(matches!(
            parse_amount("10.5", true, 2),
            Err(InvalidAmountError::Fractional { .. })
        ));
        assert!(matches!(parse_amount("-1", true, 2), Err(InvalidAmountError::Negative { .. })));
    }

    #[test]
    fn non_numeric_inputs_are_reported_precisely() {
        assert_eq!(parse_amount("NaN", false, 2), Err(InvalidAmountError::NotFinite));
        assert_eq!(parse_amount("inf", true, 2), Err(InvalidAmountError::NotFinite));
        assert!(matches!(
            parse_amount("-25.00", false, 2),
            Err(InvalidAmountError::Negative { .. })
        ));
        assert!(matches!(
            parse_amount("twelve", false, 2),
            Err(InvalidAmountError::Unparseable { .. })
        ));
        assert_eq!(parse_amount("-Infinity", false, 2), Err(InvalidAmountError::NotFinite));
        for word in ["info", "infinite", "banana"] {
            assert!(
                matches!(parse_amount(word, false, 2), Err(InvalidAmountError::Unparseable { .. })),
                "`{word}` should be unparseable"
            );
        }
        assert!(matches!(
            parse_amount("12.345", false, 2),
            Err(InvalidAmountError::PrecisionExceedsMinorUnit { exponent: 2, .. })
        ));
    }
}
