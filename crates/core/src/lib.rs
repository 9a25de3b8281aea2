pub mod amount;
pub mod config;
pub mod errors;
pub mod evaluator;
pub mod supplemental;
pub mod tiers;

pub use amount::{IntoMinorUnits, MinorUnits, MAX_SAFE_AMOUNT};
pub use config::{AppConfig, ConfigError, LoadOptions, PolicyConfig};
pub use errors::{ConfigurationError, EngineError, InvalidAmountError};
pub use evaluator::{ApprovalEngine, ApprovalEvaluator, Decision};
pub use supplemental::{SupplementalRule, SupplementalRulePolicy};
pub use tiers::{RuleTable, Tier};
