pub mod cell;
pub mod debuglog;
pub mod dispatch;
pub mod doctor;
pub mod encoder;
pub mod error;
pub mod mission;
pub mod poller;
pub mod relay;
pub mod session;

pub use cell::StateCell;
pub use debuglog::DebugLog;
pub use dispatch::DispatchLimiter;
pub use encoder::{GestureVector, InputSurface, StickMixer};
pub use error::{ConfigError, MissionError, SessionError};
pub use mission::{ControlState, MissionController};
pub use poller::{PollConfig, PollMode, Poller, Readiness};
pub use relay::EventRelay;
pub use session::{DispatchConfig, FlightSession, LogConfig, SessionConfig, StickConfig};
