//! Stage catalog: the nine canonical pipeline stages and their metadata.
//!
//! Everything here is static data and pure functions. Stage ordering is
//! encoded in the enum declaration order, so `Ord` on [`Stage`] is the
//! canonical order.

use super::ParseStageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the nine fixed pipeline stages, declared in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Information gathering and exploration.
    Research,
    /// Multi-agent agreement on the research findings.
    Consensus,
    /// Architecture decision records and design choices.
    ArchitectureDecision,
    /// Formal specification of the work.
    Specification,
    /// Breakdown of the specification into atomic tasks.
    Decomposition,
    /// Code changes for the decomposed tasks.
    Implementation,
    /// Static checks against the specification.
    Validation,
    /// Test execution and coverage.
    Testing,
    /// Versioning and delivery.
    Release,
}

/// Broad grouping of stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    /// Stages that produce plans and documents.
    Planning,
    /// Stages that record decisions.
    Decision,
    /// Stages that change code.
    Execution,
    /// Stages that verify the work.
    Validation,
    /// Stages that ship the work.
    Delivery,
}

impl StageCategory {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Decision => "decision",
            Self::Execution => "execution",
            Self::Validation => "validation",
            Self::Delivery => "delivery",
        }
    }
}

impl fmt::Display for StageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata describing a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDefinition {
    /// Stage identifier.
    pub stage: Stage,
    /// Human-readable name.
    pub display_name: &'static str,
    /// Short description of the stage's purpose.
    pub description: &'static str,
    /// Stage category.
    pub category: StageCategory,
    /// Whether the stage may be skipped.
    pub skippable: bool,
    /// Advisory staleness threshold in hours, if any.
    pub default_timeout_hours: Option<u32>,
    /// Gate names that must be recorded for this stage.
    pub required_gates: &'static [&'static str],
    /// Artifact kinds the stage is expected to produce.
    pub expected_artifacts: &'static [&'static str],
}

/// All stages in canonical order.
pub const ALL_STAGES: [Stage; 9] = [
    Stage::Research,
    Stage::Consensus,
    Stage::ArchitectureDecision,
    Stage::Specification,
    Stage::Decomposition,
    Stage::Implementation,
    Stage::Validation,
    Stage::Testing,
    Stage::Release,
];

impl Stage {
    /// First stage of every pipeline.
    pub const FIRST: Self = Self::Research;

    /// Last stage of every pipeline.
    pub const LAST: Self = Self::Release;

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Consensus => "consensus",
            Self::ArchitectureDecision => "architecture_decision",
            Self::Specification => "specification",
            Self::Decomposition => "decomposition",
            Self::Implementation => "implementation",
            Self::Validation => "validation",
            Self::Testing => "testing",
            Self::Release => "release",
        }
    }

    /// Returns the 1-based canonical order.
    #[must_use]
    pub const fn order(self) -> u8 {
        match self {
            Self::Research => 1,
            Self::Consensus => 2,
            Self::ArchitectureDecision => 3,
            Self::Specification => 4,
            Self::Decomposition => 5,
            Self::Implementation => 6,
            Self::Validation => 7,
            Self::Testing => 8,
            Self::Release => 9,
        }
    }

    /// Looks up a stage by its 1-based order.
    #[must_use]
    pub fn from_order(order: u8) -> Option<Self> {
        ALL_STAGES.into_iter().find(|stage| stage.order() == order)
    }

    /// Returns the stage after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_order(self.order().saturating_add(1))
    }

    /// Returns the stage before this one, if any.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.order().checked_sub(1).and_then(Self::from_order)
    }

    /// Returns the static metadata for this stage.
    #[must_use]
    pub const fn definition(self) -> StageDefinition {
        match self {
            Self::Research => StageDefinition {
                stage: self,
                display_name: "Research",
                description: "Information gathering and exploration",
                category: StageCategory::Planning,
                skippable: false,
                default_timeout_hours: Some(48),
                required_gates: &["sources_cited"],
                expected_artifacts: &["research_report", "findings"],
            },
            Self::Consensus => StageDefinition {
                stage: self,
                display_name: "Consensus",
                description: "Multi-agent validation of research findings",
                category: StageCategory::Decision,
                skippable: true,
                default_timeout_hours: Some(24),
                required_gates: &["quorum_reached"],
                expected_artifacts: &["consensus_record", "decision_log"],
            },
            Self::ArchitectureDecision => StageDefinition {
                stage: self,
                display_name: "Architecture Decision",
                description: "Architecture decision records and design choices",
                category: StageCategory::Decision,
                skippable: true,
                default_timeout_hours: Some(24),
                required_gates: &["adr_accepted"],
                expected_artifacts: &["adr", "architecture_diagram"],
            },
            Self::Specification => StageDefinition {
                stage: self,
                display_name: "Specification",
                description: "Formal requirements and interface contracts",
                category: StageCategory::Planning,
                skippable: false,
                default_timeout_hours: Some(48),
                required_gates: &["spec_reviewed"],
                expected_artifacts: &["specification_document"],
            },
            Self::Decomposition => StageDefinition {
                stage: self,
                display_name: "Decomposition",
                description: "Atomic task breakdown with dependencies",
                category: StageCategory::Planning,
                skippable: false,
                default_timeout_hours: Some(24),
                required_gates: &["tasks_atomic", "dependencies_acyclic"],
                expected_artifacts: &["task_graph"],
            },
            Self::Implementation => StageDefinition {
                stage: self,
                display_name: "Implementation",
                description: "Code changes for the decomposed tasks",
                category: StageCategory::Execution,
                skippable: false,
                default_timeout_hours: None,
                required_gates: &["build_passes"],
                expected_artifacts: &["source_changes", "commit"],
            },
            Self::Validation => StageDefinition {
                stage: self,
                display_name: "Validation",
                description: "Static analysis and conformance to the specification",
                category: StageCategory::Validation,
                skippable: false,
                default_timeout_hours: Some(24),
                required_gates: &["lint_clean", "types_check"],
                expected_artifacts: &["validation_report"],
            },
            Self::Testing => StageDefinition {
                stage: self,
                display_name: "Testing",
                description: "Test execution and coverage verification",
                category: StageCategory::Validation,
                skippable: false,
                default_timeout_hours: Some(48),
                required_gates: &["tests_pass", "coverage_met"],
                expected_artifacts: &["test_report", "coverage_report"],
            },
            Self::Release => StageDefinition {
                stage: self,
                display_name: "Release",
                description: "Versioning, changelog, and delivery",
                category: StageCategory::Delivery,
                skippable: false,
                default_timeout_hours: None,
                required_gates: &["changelog_updated", "version_tagged"],
                expected_artifacts: &["release_notes", "version_tag"],
            },
        }
    }

    /// Returns the human-readable stage name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        self.definition().display_name
    }

    /// Returns the stage category.
    #[must_use]
    pub const fn category(self) -> StageCategory {
        self.definition().category
    }

    /// Returns whether the stage may be skipped.
    #[must_use]
    pub const fn is_skippable(self) -> bool {
        self.definition().skippable
    }

    /// Returns whether `gate` is one of this stage's required gates.
    #[must_use]
    pub fn has_gate(self, gate: &str) -> bool {
        self.definition().required_gates.contains(&gate)
    }

    /// Returns the stages that must be completed or skipped before this
    /// stage may start.
    ///
    /// The table is hand-authored: optional decision stages are left out of
    /// the prerequisites of the planning stages that follow them.
    #[must_use]
    pub const fn prerequisites(self) -> &'static [Self] {
        match self {
            Self::Research => &[],
            Self::Consensus => &[Self::Research],
            Self::ArchitectureDecision => &[Self::Research, Self::Consensus],
            Self::Specification => &[Self::Research],
            Self::Decomposition => &[Self::Research, Self::Specification],
            Self::Implementation => &[Self::Research, Self::Specification, Self::Decomposition],
            Self::Validation => &[Self::Implementation],
            Self::Testing => &[Self::Implementation, Self::Validation],
            Self::Release => &[Self::Implementation, Self::Validation, Self::Testing],
        }
    }

    /// Returns the stages that list this stage as a prerequisite.
    #[must_use]
    pub fn dependents(self) -> Vec<Self> {
        ALL_STAGES
            .into_iter()
            .filter(|candidate| candidate.prerequisites().contains(&self))
            .collect()
    }

    /// Returns the stages strictly between `self` and `to` in canonical
    /// order. Empty when `to` is not after `self`.
    #[must_use]
    pub fn stages_between(self, to: Self) -> Vec<Self> {
        ALL_STAGES
            .into_iter()
            .filter(|stage| *stage > self && *stage < to)
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Stage {
    type Error = ParseStageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "research" => Ok(Self::Research),
            "consensus" => Ok(Self::Consensus),
            "architecture_decision" | "adr" => Ok(Self::ArchitectureDecision),
            "specification" | "spec" => Ok(Self::Specification),
            "decomposition" | "decompose" => Ok(Self::Decomposition),
            "implementation" | "impl" => Ok(Self::Implementation),
            "validation" => Ok(Self::Validation),
            "testing" | "test" => Ok(Self::Testing),
            "release" => Ok(Self::Release),
            _ => Err(ParseStageError(value.to_owned())),
        }
    }
}

/// Returns every stage definition in canonical order.
#[must_use]
pub fn list_stages() -> Vec<StageDefinition> {
    ALL_STAGES.into_iter().map(Stage::definition).collect()
}
