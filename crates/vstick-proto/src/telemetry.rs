use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightStatus {
    pub is_connected: bool,
    pub are_motors_on: bool,
    pub is_flying: bool,
    pub flight_mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AltitudeInfo {
    /// Meters above the takeoff point.
    pub altitude: f64,
}

/// Raw answer of the flight controller's pre-takeoff check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessCheck {
    pub ready: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadinessLevel {
    Ready,
    Caution,
    NotReady,
}

/// Case-sensitive keywords that downgrade a failed check to a caution.
const CAUTION_KEYWORDS: [&str; 3] = ["light", "caution", "GPS"];

impl ReadinessCheck {
    pub fn ready(reason: impl Into<String>) -> Self {
        Self { ready: true, reason: reason.into() }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self { ready: false, reason: reason.into() }
    }

    /// Keyword heuristic over the free-text reason. The controller reports no
    /// structured level, so wording it was never tuned for may misclassify.
    pub fn level(&self) -> ReadinessLevel {
        if self.ready {
            return ReadinessLevel::Ready;
        }
        if CAUTION_KEYWORDS.iter().any(|k| self.reason.contains(k)) {
            ReadinessLevel::Caution
        } else {
            ReadinessLevel::NotReady
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_keywords() {
        assert_eq!(ReadinessCheck::ready("ok").level(), ReadinessLevel::Ready);
        assert_eq!(ReadinessCheck::not_ready("Weak GPS signal").level(), ReadinessLevel::Caution);
        assert_eq!(ReadinessCheck::not_ready("low light for vision").level(), ReadinessLevel::Caution);
        assert_eq!(ReadinessCheck::not_ready("use caution").level(), ReadinessLevel::Caution);
        assert_eq!(ReadinessCheck::not_ready("Battery too low").level(), ReadinessLevel::NotReady);
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(ReadinessCheck::not_ready("weak gps").level(), ReadinessLevel::NotReady);
        assert_eq!(ReadinessCheck::not_ready("CAUTION").level(), ReadinessLevel::NotReady);
    }
}
