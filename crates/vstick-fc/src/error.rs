/// Failures reported by a flight controller or mission planner backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FcError {
    #[error("flight controller not connected")]
    NotConnected,

    #[error("{operation} rejected: {reason}")]
    Rejected { operation: &'static str, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("virtual stick is not enabled")]
    VirtualStickDisabled,

    #[error("virtual stick control mode not configured")]
    ControlModeUnset,

    #[error("{0} rate-limited")]
    RateLimited(&'static str),
}

impl FcError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        FcError::Rejected { operation, reason: reason.into() }
    }

    /// Human-readable reason for operator display.
    pub fn reason(&self) -> String {
        match self {
            FcError::Rejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}
