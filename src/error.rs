use std::fmt;

/// Result type for talos operations
pub type Result<T> = std::result::Result<T, TalosError>;

/// Main error type for the talos library
#[derive(Debug, Clone)]
pub enum TalosError {
    /// Invalid configuration value, rejected at construction time
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Stored parameters disagree with the live state/action cardinalities
    ShapeMismatch {
        expected: String,
        actual: String,
    },

    /// Failure reported by the environment collaborator (timeout, transport)
    Environment(String),

    /// IO errors (checkpoint files)
    Io(String),

    /// Serialization/deserialization errors
    Serialization(String),

    /// Sampling from an empty replay buffer
    EmptyBuffer(String),

    /// Training error
    Training(String),
}

impl fmt::Display for TalosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TalosError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            TalosError::ShapeMismatch { expected, actual } => {
                write!(f, "Shape mismatch: expected {}, got {}", expected, actual)
            }
            TalosError::Environment(msg) => write!(f, "Environment error: {}", msg),
            TalosError::Io(msg) => write!(f, "IO error: {}", msg),
            TalosError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            TalosError::EmptyBuffer(msg) => write!(f, "Empty buffer: {}", msg),
            TalosError::Training(msg) => write!(f, "Training error: {}", msg),
        }
    }
}

impl std::error::Error for TalosError {}

impl From<std::io::Error> for TalosError {
    fn from(err: std::io::Error) -> Self {
        TalosError::Io(err.to_string())
    }
}

impl From<bincode::Error> for TalosError {
    fn from(err: bincode::Error) -> Self {
        TalosError::Serialization(err.to_string())
    }
}

// Helper constructors for common error patterns
impl TalosError {
    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        TalosError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        TalosError::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
