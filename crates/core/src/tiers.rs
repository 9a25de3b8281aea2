use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::amount::{IntoMinorUnits, MinorUnits};
use crate::errors::{ConfigurationError, InvalidAmountError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub level: u32,
    pub name: String,
    pub min_amount: i64,
    /// Inclusive upper bound; `None` marks the unbounded top tier.
    #[serde(default)]
    pub max_amount: Option<i64>,
    pub required_approvers: u32,
    #[serde(default)]
    pub description: String,
}

impl Tier {
    pub fn contains(&self, amount: MinorUnits) -> bool {
        let amount = amount.value();
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount <= max)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_amount.is_none()
    }
}

/// Ordered amount ranges covering `[0, ∞)` with no gaps or overlaps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleTable {
    tiers: Vec<Tier>,
}

impl RuleTable {
    pub fn new(tiers: Vec<Tier>) -> Result<Self, ConfigurationError> {
        if tiers.is_empty() {
            return Err(ConfigurationError::EmptyTable);
        }

        validate_identity_and_levels(&tiers)?;
        for tier in &tiers {
            validate_bounds(tier)?;
        }
        validate_partition(&tiers)?;

        Ok(Self { tiers })
    }

    pub fn tier_for(&self, amount: MinorUnits) -> &Tier {
        // Lower bounds are strictly increasing and the first one is zero, so the
        // partition point is always at least one.
        let index = self.tiers.partition_point(|tier| tier.min_amount <= amount.value());
        &self.tiers[index.saturating_sub(1)]
    }

    pub fn tier_for_raw(&self, amount: impl IntoMinorUnits) -> Result<&Tier, InvalidAmountError> {
        let amount = amount.into_minor_units()?;
        Ok(self.tier_for(amount))
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn tier_by_id(&self, id: &str) -> Option<&Tier> {
        self.tiers.iter().find(|tier| tier.id == id)
    }

    pub fn top_tier(&self) -> &Tier {
        &self.tiers[self.tiers.len() - 1]
    }
}

fn validate_identity_and_levels(tiers: &[Tier]) -> Result<(), ConfigurationError> {
    let mut seen_ids = HashSet::new();
    let mut previous_level: Option<u32> = None;

    for (index, tier) in tiers.iter().enumerate() {
        if tier.id.trim().is_empty() {
            return Err(ConfigurationError::EmptyTierId { index });
        }
        if !seen_ids.insert(tier.id.as_str()) {
            return Err(ConfigurationError::DuplicateTierId { id: tier.id.clone() });
        }
        if tier.level == 0 {
            return Err(ConfigurationError::NonPositiveLevel { id: tier.id.clone() });
        }
        if let Some(previous_level) = previous_level {
            if tier.level <= previous_level {
                return Err(ConfigurationError::NonIncreasingLevel {
                    id: tier.id.clone(),
                    level: tier.level,
                    previous_level,
                });
            }
        }
        previous_level = Some(tier.level);
    }

    Ok(())
}

fn validate_bounds(tier: &Tier) -> Result<(), ConfigurationError> {
    if tier.min_amount < 0 {
        return Err(ConfigurationError::NegativeBound {
            id: tier.id.clone(),
            amount: tier.min_amount,
        });
    }

    if let Some(max_amount) = tier.max_amount {
        if max_amount < 0 {
            return Err(ConfigurationError::NegativeBound {
                id: tier.id.clone(),
                amount: max_amount,
            });
        }
        if max_amount < tier.min_amount {
            return Err(ConfigurationError::InvertedRange {
                id: tier.id.clone(),
                min_amount: tier.min_amount,
                max_amount,
            });
        }
    }

    Ok(())
}

fn validate_partition(tiers: &[Tier]) -> Result<(), ConfigurationError> {
    let first = &tiers[0];
    if first.min_amount != 0 {
        return Err(ConfigurationError::FirstTierNotAtZero {
            id: first.id.clone(),
            min_amount: first.min_amount,
        });
    }

    for pair in tiers.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        let Some(previous_max) = previous.max_amount else {
            return Err(ConfigurationError::UnboundedTierNotLast { id: previous.id.clone() });
        };

        // A bounded tier ending at i64::MAX leaves no room for a successor.
        let expected_min = previous_max.checked_add(1);
        match expected_min {
            Some(expected) if next.min_amount == expected => {}
            Some(expected) if next.min_amount > expected => {
                return Err(ConfigurationError::Gap {
                    previous_id: previous.id.clone(),
                    previous_max,
                    id: next.id.clone(),
                    min_amount: next.min_amount,
                });
            }
            _ => {
                return Err(ConfigurationError::Overlap {
                    previous_id: previous.id.clone(),
                    previous_max,
                    id: next.id.clone(),
                    min_amount: next.min_amount,
                });
            }
        }
    }

    let last = &tiers[tiers.len() - 1];
    if !last.is_unbounded() {
        return Err(ConfigurationError::MissingUnboundedTier { id: last.id.clone() });
    }

    Ok(())
}
