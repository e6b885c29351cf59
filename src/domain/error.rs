//! Domain error types.

/// Top-level error type for optitrader.
#[derive(Debug, thiserror::Error)]
pub enum OptitraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("column {column} has {actual} values, expected {expected}")]
    SeriesLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("data parse error: {reason}")]
    DataParse { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("unknown strategy type: {name}")]
    UnknownStrategy { name: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("insufficient data: have {bars} bars, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("optimization error: {reason}")]
    Optimization { reason: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OptitraderError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        OptitraderError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&OptitraderError> for std::process::ExitCode {
    fn from(err: &OptitraderError) -> Self {
        let code: u8 = match err {
            OptitraderError::Io(_) | OptitraderError::Serialization(_) => 1,
            OptitraderError::ConfigParse { .. }
            | OptitraderError::ConfigMissing { .. }
            | OptitraderError::ConfigInvalid { .. } => 2,
            OptitraderError::Schema { .. }
            | OptitraderError::SeriesLength { .. }
            | OptitraderError::DataParse { .. }
            | OptitraderError::NoData { .. } => 3,
            OptitraderError::UnknownStrategy { .. } | OptitraderError::InvalidParameter { .. } => 4,
            OptitraderError::InsufficientData { .. } | OptitraderError::Optimization { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
