use vstick_fc::FcError;
use vstick_proto::MissionState;

/// Setup-time problems. These are fatal for the session being built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("stick travel radius must be positive and finite, got {0}")]
    InvalidRadius(f64),

    #[error("virtual stick control mode was not configured before use")]
    ControlModeNotConfigured,

    #[error("debug log capacity must be at least 1")]
    ZeroLogCapacity,

    #[error("{0} interval must be non-zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MissionError {
    #[error("cannot {operation} while mission is {state:?}")]
    InvalidTransition { operation: &'static str, state: MissionState },

    #[error("{operation} failed: {source}")]
    Service {
        operation: &'static str,
        #[source]
        source: FcError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MissionError {
    pub(crate) fn service(operation: &'static str, source: FcError) -> Self {
        MissionError::Service { operation, source }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("session setup failed during {stage}: {source}")]
    Setup {
        stage: &'static str,
        #[source]
        source: FcError,
    },
}
