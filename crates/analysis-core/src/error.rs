use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Malformed price data (non-chronological dates, negative volume, ...).
    /// A caller bug; retrying with the same input will fail again.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Too little history to compute or train. Recoverable once more data arrives.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("No trained model for {0}")]
    UntrainedModel(String),

    /// Fusion had nothing to combine.
    #[error("No data: {0}")]
    NoData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by a data collaborator (price history or headline feed).
    #[error("Data source error: {0}")]
    DataSource(String),
}

impl AnalysisError {
    /// Whether waiting for fresher data could make the same call succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData(_) | AnalysisError::DataSource(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::UntrainedModel("AAPL".to_string());
        assert_eq!(err.to_string(), "No trained model for AAPL");

        let err = AnalysisError::Configuration("weights sum to 0.9".to_string());
        assert_eq!(err.to_string(), "Configuration error: weights sum to 0.9");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(AnalysisError::InsufficientData("x".into()).is_recoverable());
        assert!(AnalysisError::DataSource("x".into()).is_recoverable());
        assert!(!AnalysisError::InvalidInput("x".into()).is_recoverable());
        assert!(!AnalysisError::Configuration("x".into()).is_recoverable());
        assert!(!AnalysisError::NoData("x".into()).is_recoverable());
    }
}
