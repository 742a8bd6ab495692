use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Externally observable state of the task running in this pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStatus {
    /// Hand-off is complete; the launcher is being prepared.
    Initializing,
    /// The job orchestrator has been started.
    Running,
    /// The job finished; may carry an output document.
    Succeeded,
    /// The job or its setup failed.
    Failed,
}

impl LifecycleStatus {
    /// Returns `true` if no further status may follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleStatus::Succeeded | LifecycleStatus::Failed)
    }

    /// Position in the lifecycle; both terminal states share the last rank.
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleStatus::Initializing => 0,
            LifecycleStatus::Running => 1,
            LifecycleStatus::Succeeded | LifecycleStatus::Failed => 2,
        }
    }

    /// Whether `next` may be written after `self`.
    ///
    /// Any non-terminal status may jump straight to `Failed`, so the failure path
    /// never has to pass through `Running`.
    pub fn can_advance_to(&self, next: LifecycleStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            LifecycleStatus::Failed => true,
            _ => next.rank() > self.rank(),
        }
    }

    /// Storage document name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Initializing => "INITIALIZING",
            LifecycleStatus::Running => "RUNNING",
            LifecycleStatus::Succeeded => "SUCCEEDED",
            LifecycleStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "INITIALIZING" => Ok(LifecycleStatus::Initializing),
            "RUNNING" => Ok(LifecycleStatus::Running),
            "SUCCEEDED" => Ok(LifecycleStatus::Succeeded),
            "FAILED" => Ok(LifecycleStatus::Failed),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleStatus::{self, *};

    #[test]
    fn terminal_states() {
        assert!(Succeeded.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Initializing.is_terminal());
        assert!(!Running.is_terminal());
    }

    #[test]
    fn advances_only_forward() {
        assert!(Initializing.can_advance_to(Running));
        assert!(Initializing.can_advance_to(Failed));
        assert!(Running.can_advance_to(Succeeded));
        assert!(Running.can_advance_to(Failed));

        assert!(!Running.can_advance_to(Initializing));
        assert!(!Running.can_advance_to(Running));
        assert!(!Succeeded.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Succeeded));
    }

    #[test]
    fn serde_uses_document_names() {
        let json = serde_json::to_string(&Running).unwrap();
        assert_eq!(json, r#""RUNNING""#);

        for status in [Initializing, Running, Succeeded, Failed] {
            assert_eq!(status.as_str().parse::<LifecycleStatus>().unwrap(), status);
        }
        assert!("NOT_STARTED".parse::<LifecycleStatus>().is_err());
    }
}
