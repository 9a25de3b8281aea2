use serde::Serialize;
use tierwise_core::config::{AppConfig, LoadOptions};
use tierwise_core::{ApprovalEvaluator, MinorUnits};

use crate::commands::{render_json, CommandResult, EXIT_CONFIG_FAILURE};

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
    let exit_code =
        if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_CONFIG_FAILURE };

    let output = if json_output { render_json(&report, true) } else { render_human(&report) };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    // Settings and policy are checked separately so a broken tier table is
    // attributed to policy_construction.
    match AppConfig::load_settings(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "currency and logging settings loaded and validated".to_string(),
            });
            match config.build_evaluator() {
                Ok(evaluator) => {
                    checks.push(DoctorCheck {
                        name: "policy_construction",
                        status: CheckStatus::Pass,
                        details: format!(
                            "{} tiers and {} supplemental rules validated",
                            evaluator.table().len(),
                            evaluator.policy().len()
                        ),
                    });
                    checks.push(check_tier_boundaries(&evaluator));
                }
                Err(error) => {
                    checks.push(DoctorCheck {
                        name: "policy_construction",
                        status: CheckStatus::Fail,
                        details: error.to_string(),
                    });
                    checks.push(skipped("tier_boundaries", "policy did not build"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(skipped("policy_construction", "configuration did not load"));
            checks.push(skipped("tier_boundaries", "configuration did not load"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Probes both ends of every bounded tier and the start of the top tier.
fn check_tier_boundaries(evaluator: &ApprovalEvaluator) -> DoctorCheck {
    let table = evaluator.table();
    let mut probes = 0;

    for tier in table.tiers() {
        let edges = [Some(tier.min_amount), tier.max_amount];
        for edge in edges.into_iter().flatten() {
            probes += 1;
            let resolved = MinorUnits::new(edge).map(|amount| table.tier_for(amount).id.clone());
            if resolved.as_deref() != Ok(tier.id.as_str()) {
                return DoctorCheck {
                    name: "tier_boundaries",
                    status: CheckStatus::Fail,
                    details: format!("amount {edge} did not resolve to tier `{}`", tier.id),
                };
            }
        }
    }

    DoctorCheck {
        name: "tier_boundaries",
        status: CheckStatus::Pass,
        details: format!("{probes} boundary probes resolved to their declaring tier"),
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck {
        name,
        status: CheckStatus::Skipped,
        details: format!("skipped because {reason}"),
    }
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
