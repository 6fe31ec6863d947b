use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleGraphError {
    #[error("duplicate tour: {0}")]
    DuplicateTour(String),
    #[error("unknown tour: {0}")]
    UnknownTour(String),
    #[error("node already mapped: {0}")]
    NodeAlreadyMapped(String),
    #[error("sequence bounds: {0}")]
    SequenceBounds(String),
    #[error("register key conflict: {0}")]
    RegisterKeyConflict(String),
    #[error("register key missing: {0}")]
    RegisterKeyMissing(String),
    #[error("unknown comparison operator: {0}")]
    UnknownOperator(String),
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RuleGraphError {
    pub fn duplicate_tour<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::DuplicateTour(msg.into())
    }

    pub fn unknown_tour<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::UnknownTour(msg.into())
    }

    pub fn node_already_mapped<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::NodeAlreadyMapped(msg.into())
    }

    pub fn sequence_bounds<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::SequenceBounds(msg.into())
    }

    pub fn register_conflict<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::RegisterKeyConflict(msg.into())
    }

    pub fn register_missing<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::RegisterKeyMissing(msg.into())
    }

    pub fn unknown_operator<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::UnknownOperator(msg.into())
    }

    pub fn malformed_token<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::MalformedToken(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        RuleGraphError::InvalidInput(msg.into())
    }
}
