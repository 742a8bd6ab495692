use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Closed set of job categories this bootstrap can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplicationKind {
    /// Move records from a source to a destination.
    Replicate,
    /// Normalize raw replicated data into typed tables.
    Normalize,
    /// Run user-defined transformations (dbt) over the destination.
    Transform,
    /// Do nothing; used to exercise the launch path.
    NoOp,
}

impl ApplicationKind {
    pub const ALL: [ApplicationKind; 4] = [
        ApplicationKind::Replicate,
        ApplicationKind::Normalize,
        ApplicationKind::Transform,
        ApplicationKind::NoOp,
    ];

    /// Name written into `application.txt` by the scheduler.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ApplicationKind::Replicate => "replication-orchestrator",
            ApplicationKind::Normalize => "normalization-orchestrator",
            ApplicationKind::Transform => "dbt-orchestrator",
            ApplicationKind::NoOp => "NO_OP",
        }
    }

    /// Short symbolic identifier, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationKind::Replicate => "replicate",
            ApplicationKind::Normalize => "normalize",
            ApplicationKind::Transform => "transform",
            ApplicationKind::NoOp => "noop",
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ApplicationKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "replication-orchestrator" | "replicate" | "replication" => {
                Ok(ApplicationKind::Replicate)
            }
            "normalization-orchestrator" | "normalize" | "normalization" => {
                Ok(ApplicationKind::Normalize)
            }
            "dbt-orchestrator" | "transform" | "dbt" => Ok(ApplicationKind::Transform),
            "no_op" | "no-op" | "noop" => Ok(ApplicationKind::NoOp),
            _ => Err(ModelError::UnknownApplicationKind(s.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_aliases() {
        for kind in ApplicationKind::ALL {
            assert_eq!(kind.wire_name().parse::<ApplicationKind>().unwrap(), kind);
            assert_eq!(kind.kind().parse::<ApplicationKind>().unwrap(), kind);
        }
        assert_eq!(
            " NoOp\n".parse::<ApplicationKind>().unwrap(),
            ApplicationKind::NoOp
        );
    }

    #[test]
    fn rejects_unknown_kind_with_trimmed_name() {
        let err = "unsupported-kind\n".parse::<ApplicationKind>().unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownApplicationKind("unsupported-kind".to_string())
        );
    }
}
