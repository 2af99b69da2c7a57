//! Gate admission: whether a stage may start under an enforcement mode.

use super::{
    EpicId, ParseEnforcementModeError, PrerequisiteCheck, Stage, StatusSnapshot,
    check_prerequisites, join_stages,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How strictly unmet prerequisites are enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Unmet prerequisites block the stage.
    #[default]
    Strict,
    /// Unmet prerequisites are reported but never block.
    Advisory,
    /// Gates are not evaluated.
    Off,
}

impl EnforcementMode {
    /// Returns the canonical configuration representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Advisory => "advisory",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EnforcementMode {
    type Error = ParseEnforcementModeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "strict" => Ok(Self::Strict),
            "advisory" => Ok(Self::Advisory),
            "off" | "disabled" => Ok(Self::Off),
            _ => Err(ParseEnforcementModeError(value.to_owned())),
        }
    }
}

/// Result of a gate admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCheck {
    /// Epic the check was run for.
    pub epic_id: EpicId,
    /// Stage that was asked to start.
    pub target_stage: Stage,
    /// Mode the check ran under.
    pub mode: EnforcementMode,
    /// Whether the stage may start.
    pub allowed: bool,
    /// Prerequisites that are neither completed nor skipped.
    pub missing_prerequisites: Vec<Stage>,
    /// Explanation when prerequisites are unmet.
    pub message: Option<String>,
    /// Detailed prerequisite walk; absent when enforcement is off.
    pub prerequisites: Option<PrerequisiteCheck>,
}

impl GateCheck {
    /// Evaluates whether `target` may start given `statuses`.
    #[must_use]
    pub fn evaluate(
        epic_id: EpicId,
        target: Stage,
        statuses: &StatusSnapshot,
        mode: EnforcementMode,
    ) -> Self {
        if mode == EnforcementMode::Off {
            return Self {
                epic_id,
                target_stage: target,
                mode,
                allowed: true,
                missing_prerequisites: Vec::new(),
                message: None,
                prerequisites: None,
            };
        }

        let prerequisites = check_prerequisites(target, statuses);
        let missing = prerequisites.missing();
        let message = (!missing.is_empty()).then(|| {
            format!(
                "Stage {target} requires {} to be completed or skipped first",
                join_stages(&missing)
            )
        });
        let allowed = mode == EnforcementMode::Advisory || missing.is_empty();

        Self {
            epic_id,
            target_stage: target,
            mode,
            allowed,
            missing_prerequisites: missing,
            message,
            prerequisites: Some(prerequisites),
        }
    }

    /// Suggested remedy when the gate blocks.
    #[must_use]
    pub fn remedy(&self) -> String {
        format!(
            "Complete or skip {} before starting {}, or set enforcement mode to advisory",
            join_stages(&self.missing_prerequisites),
            self.target_stage
        )
    }
}
