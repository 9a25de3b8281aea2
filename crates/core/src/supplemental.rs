use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::amount::MinorUnits;
use crate::errors::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementalRule {
    pub id: String,
    /// Empty means the rule applies to every category.
    #[serde(default)]
    pub applies_to_categories: Vec<String>,
    pub threshold_amount: i64,
    pub requirement_tag: String,
    /// Required opt-in for a catch-all rule (no categories, threshold 0).
    #[serde(default)]
    pub unconditional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CompiledRule {
    rule: SupplementalRule,
    categories: HashSet<String>,
}

impl CompiledRule {
    fn matches(&self, amount: MinorUnits, category: Option<&str>) -> bool {
        if amount.value() < self.rule.threshold_amount {
            return false;
        }
        if self.categories.is_empty() {
            return true;
        }

        category.map(normalize_key).is_some_and(|category| self.categories.contains(&category))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupplementalRulePolicy {
    rules: Vec<CompiledRule>,
}

impl SupplementalRulePolicy {
    pub fn new(rules: Vec<SupplementalRule>) -> Result<Self, ConfigurationError> {
        let rules = rules.into_iter().map(compile_rule).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Requirement tags activated for `amount` and `category`, in declaration
    /// order with duplicates collapsed to their first occurrence.
    pub fn active_requirements_for(
        &self,
        amount: MinorUnits,
        category: Option<&str>,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .filter(|compiled| compiled.matches(amount, category))
            .map(|compiled| compiled.rule.requirement_tag.clone())
            .filter(|tag| seen.insert(tag.clone()))
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = &SupplementalRule> {
        self.rules.iter().map(|compiled| &compiled.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_rule(rule: SupplementalRule) -> Result<CompiledRule, ConfigurationError> {
    if rule.threshold_amount < 0 {
        return Err(ConfigurationError::NegativeThreshold {
            id: rule.id,
            threshold_amount: rule.threshold_amount,
        });
    }
    if rule.requirement_tag.trim().is_empty() {
        return Err(ConfigurationError::EmptyRequirementTag { id: rule.id });
    }

    // A blank entry would otherwise vanish and widen the rule to every category.
    let mut categories = HashSet::new();
    for (index, category) in rule.applies_to_categories.iter().enumerate() {
        let category = normalize_key(category);
        if category.is_empty() {
            return Err(ConfigurationError::EmptyCategoryTag { id: rule.id, index });
        }
        categories.insert(category);
    }
    if categories.is_empty() && rule.threshold_amount == 0 && !rule.unconditional {
        return Err(ConfigurationError::ImplicitUnconditionalRule { id: rule.id });
    }

    Ok(CompiledRule { rule, categories })
}

pub(crate) fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
