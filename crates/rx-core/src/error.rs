use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: String, value: f64 },

    #[error("Negative value for {what}: {value}")]
    Negative { what: String, value: f64 },

    #[error("Value for {what} must be positive, got {value}")]
    NotPositive { what: String, value: f64 },
}
