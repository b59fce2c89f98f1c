use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtlasFitError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No complete placement found within {budget} search call(s)")]
    NoFit { budget: i32 },
}

pub type Result<T> = std::result::Result<T, AtlasFitError>;
