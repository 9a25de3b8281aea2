use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{IntoMinorUnits, MinorUnits};
use crate::config::PolicyConfig;
use crate::errors::{ConfigurationError, InvalidAmountError};
use crate::supplemental::{normalize_key, SupplementalRulePolicy};
use crate::tiers::{RuleTable, Tier};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub amount: MinorUnits,
    pub category: Option<String>,
    pub matched_tier: Tier,
    pub required_approvers: u32,
    pub supplemental_requirements: Vec<String>,
    pub is_immediately_approvable: bool,
}

impl Decision {
    pub fn requires(&self, requirement_tag: &str) -> bool {
        self.supplemental_requirements.iter().any(|tag| tag == requirement_tag)
    }
}

pub trait ApprovalEngine: Send + Sync {
    fn evaluate_minor_units(&self, amount: MinorUnits, category: Option<&str>) -> Decision;
}

#[derive(Clone, Debug)]
pub struct ApprovalEvaluator {
    table: RuleTable,
    policy: SupplementalRulePolicy,
}

impl ApprovalEvaluator {
    pub fn new(table: RuleTable, policy: SupplementalRulePolicy) -> Self {
        Self { table, policy }
    }

    /// Builds the tier table and rule policy together; neither is exposed
    /// unless both validate.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigurationError> {
        let table = RuleTable::new(config.tiers.clone())?;
        let policy = SupplementalRulePolicy::new(config.supplemental_rules.clone())?;
        Ok(Self::new(table, policy))
    }

    pub fn evaluate(
        &self,
        amount: impl IntoMinorUnits,
        category: Option<&str>,
    ) -> Result<Decision, InvalidAmountError> {
        let amount = amount.into_minor_units()?;
        Ok(self.evaluate_minor_units(amount, category))
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn policy(&self) -> &SupplementalRulePolicy {
        &self.policy
    }
}

impl ApprovalEngine for ApprovalEvaluator {
    fn evaluate_minor_units(&self, amount: MinorUnits, category: Option<&str>) -> Decision {
        let tier = self.table.tier_for(amount);
        let supplemental_requirements = self.policy.active_requirements_for(amount, category);
        let required_approvers = tier.required_approvers;
        let is_immediately_approvable =
            required_approvers == 0 && supplemental_requirements.is_empty();

        debug!(
            event_name = "engine.evaluate.decision",
            amount = amount.value(),
            category = category.unwrap_or("unknown"),
            tier_id = %tier.id,
            required_approvers,
            supplemental_count = supplemental_requirements.len(),
            is_immediately_approvable,
            "approval decision evaluated"
        );

        Decision {
            amount,
            category: category.map(normalize_key),
            matched_tier: tier.clone(),
            required_approvers,
            supplemental_requirements,
            is_immediately_approvable,
        }
    }
}
