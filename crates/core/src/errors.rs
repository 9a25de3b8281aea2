use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("tier table must contain at least one tier")]
    EmptyTable,
    #[error("tier at position {index} has an empty id")]
    EmptyTierId { index: usize },
    #[error("tier id `{id}` appears more than once")]
    DuplicateTierId { id: String },
    #[error("tier `{id}` has level 0; levels must be positive")]
    NonPositiveLevel { id: String },
    #[error("tier `{id}` level {level} must be greater than previous level {previous_level}")]
    NonIncreasingLevel { id: String, level: u32, previous_level: u32 },
    #[error("tier `{id}` has negative bound {amount}")]
    NegativeBound { id: String, amount: i64 },
    #[error("tier `{id}` upper bound {max_amount} is below lower bound {min_amount}")]
    InvertedRange { id: String, min_amount: i64, max_amount: i64 },
    #[error("first tier `{id}` starts at {min_amount}; the table must start at 0")]
    FirstTierNotAtZero { id: String, min_amount: i64 },
    #[error("gap between tier `{previous_id}` (ends at {previous_max}) and tier `{id}` (starts at {min_amount})")]
    Gap { previous_id: String, previous_max: i64, id: String, min_amount: i64 },
    #[error("tier `{id}` (starts at {min_amount}) overlaps tier `{previous_id}` (ends at {previous_max})")]
    Overlap { previous_id: String, previous_max: i64, id: String, min_amount: i64 },
    #[error("unbounded tier `{id}` must be the last tier in the table")]
    UnboundedTierNotLast { id: String },
    #[error("last tier `{id}` must have an unbounded upper limit")]
    MissingUnboundedTier { id: String },
    #[error("supplemental rule `{id}` has negative threshold {threshold_amount}")]
    NegativeThreshold { id: String, threshold_amount: i64 },
    #[error("supplemental rule `{id}` has an empty requirement tag")]
    EmptyRequirementTag { id: String },
    #[error("supplemental rule `{id}` lists a blank category at position {index}")]
    EmptyCategoryTag { id: String, index: usize },
    #[error(
        "supplemental rule `{id}` applies to every category at threshold 0; set `unconditional = true` to allow it"
    )]
    ImplicitUnconditionalRule { id: String },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidAmountError {
    #[error("amount {value} is negative")]
    Negative { value: String },
    #[error("amount is not a finite number")]
    NotFinite,
    #[error("amount `{value}` is not a number")]
    Unparseable { value: String },
    #[error("amount {value} is not a whole number of minor units")]
    Fractional { value: String },
    #[error("amount {value} is out of the supported range")]
    OutOfRange { value: String },
    #[error("amount {value} has more precision than {exponent} decimal places")]
    PrecisionExceedsMinorUnit { value: String, exponent: u32 },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmountError),
}

impl EngineError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::InvalidAmount(_) => "invalid_amount",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => {
                "The approval policy configuration is inconsistent and cannot be used."
            }
            Self::InvalidAmount(_) => "The amount is not valid. Enter a non-negative amount.",
        }
    }
}
