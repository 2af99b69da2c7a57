//! Transition validation: stage-move rules and prerequisite checks.
//!
//! Both checks are pure functions over the stage catalog and a status
//! snapshot; neither touches persistence.

use super::{Stage, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-stage status snapshot consumed by [`check_prerequisites`].
pub type StatusSnapshot = BTreeMap<Stage, StageStatus>;

/// Endpoint of a transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelector {
    /// Matches every stage.
    Any,
    /// Matches exactly one stage.
    Exact(Stage),
}

impl StageSelector {
    const fn matches(self, stage: Stage) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected as u8 == stage as u8,
        }
    }

    const fn is_exact(self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

/// Declarative edge in the transition rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    /// Source stage selector.
    pub from: StageSelector,
    /// Target stage selector.
    pub to: StageSelector,
    /// Whether the edge is permitted at all.
    pub allowed: bool,
    /// Whether the edge is only permitted with a force override.
    pub requires_force: bool,
    /// Explanation surfaced to callers.
    pub reason: &'static str,
}

const fn rule(
    from: StageSelector,
    to: StageSelector,
    allowed: bool,
    requires_force: bool,
    reason: &'static str,
) -> TransitionRule {
    TransitionRule {
        from,
        to,
        allowed,
        requires_force,
        reason,
    }
}

use StageSelector::{Any, Exact};

/// Hand-authored transition rules. Unmatched moves fall back to the linear
/// adjacency default in [`check_transition`].
pub const TRANSITION_RULES: &[TransitionRule] = &[
    rule(
        Exact(Stage::Research),
        Exact(Stage::Consensus),
        true,
        false,
        "Research findings go to consensus",
    ),
    rule(
        Exact(Stage::Consensus),
        Exact(Stage::ArchitectureDecision),
        true,
        false,
        "Consensus feeds the architecture decision",
    ),
    rule(
        Exact(Stage::ArchitectureDecision),
        Exact(Stage::Specification),
        true,
        false,
        "Decisions are captured in the specification",
    ),
    rule(
        Exact(Stage::Specification),
        Exact(Stage::Decomposition),
        true,
        false,
        "Specification is broken into tasks",
    ),
    rule(
        Exact(Stage::Decomposition),
        Exact(Stage::Implementation),
        true,
        false,
        "Tasks are ready to implement",
    ),
    rule(
        Exact(Stage::Implementation),
        Exact(Stage::Validation),
        true,
        false,
        "Implementation is ready to validate",
    ),
    rule(
        Exact(Stage::Validation),
        Exact(Stage::Testing),
        true,
        false,
        "Validated work is ready to test",
    ),
    rule(
        Exact(Stage::Testing),
        Exact(Stage::Release),
        true,
        false,
        "Tested work is ready to release",
    ),
    rule(
        Exact(Stage::Research),
        Exact(Stage::Specification),
        true,
        false,
        "Consensus and architecture decision are optional for small epics",
    ),
    rule(
        Exact(Stage::Consensus),
        Exact(Stage::Specification),
        true,
        false,
        "Architecture decision is optional",
    ),
    rule(
        Exact(Stage::Implementation),
        Exact(Stage::Decomposition),
        true,
        true,
        "Re-planning during implementation requires force",
    ),
    rule(
        Exact(Stage::Validation),
        Exact(Stage::Implementation),
        true,
        true,
        "Returning to implementation to fix validation findings requires force",
    ),
    rule(
        Exact(Stage::Testing),
        Exact(Stage::Implementation),
        true,
        true,
        "Returning to implementation to fix failing tests requires force",
    ),
    rule(Exact(Stage::Release), Any, false, false, "Release is the final stage"),
    rule(Any, Exact(Stage::Research), true, true, "Restarting research requires force"),
];

/// Result of checking a single stage move against the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCheck {
    /// Whether the move is admissible with the given force flag.
    pub allowed: bool,
    /// Whether the move needs a force override.
    pub requires_force: bool,
    /// Explanation of the decision.
    pub reason: String,
}

impl TransitionCheck {
    fn new(allowed: bool, requires_force: bool, reason: impl Into<String>) -> Self {
        Self {
            allowed,
            requires_force,
            reason: reason.into(),
        }
    }
}

/// Finds the rule governing `from -> to`: exact matches win over
/// from-exact wildcards, which win over to-exact wildcards.
#[must_use]
pub fn find_rule(from: Stage, to: Stage) -> Option<&'static TransitionRule> {
    let matching = || {
        TRANSITION_RULES
            .iter()
            .filter(move |rule| rule.from.matches(from) && rule.to.matches(to))
    };
    matching()
        .find(|rule| rule.from.is_exact() && rule.to.is_exact())
        .or_else(|| matching().find(|rule| rule.from.is_exact()))
        .or_else(|| matching().find(|rule| rule.to.is_exact()))
        .or_else(|| matching().next())
}

/// Decides whether a pipeline may move from `from` to `to`.
#[must_use]
pub fn check_transition(from: Stage, to: Stage, force: bool) -> TransitionCheck {
    if from == to {
        return TransitionCheck::new(true, false, "Same stage, no transition needed");
    }

    if let Some(rule) = find_rule(from, to) {
        let allowed = rule.allowed && (!rule.requires_force || force);
        return TransitionCheck::new(allowed, rule.requires_force, rule.reason);
    }

    if to > from {
        let skipped: Vec<Stage> = from
            .stages_between(to)
            .into_iter()
            .filter(|stage| !stage.is_skippable())
            .collect();
        if skipped.is_empty() {
            return TransitionCheck::new(true, false, "Forward transition over skippable stages");
        }
        return TransitionCheck::new(
            force,
            true,
            format!("Skipping required stages: {}", join_stages(&skipped)),
        );
    }

    TransitionCheck::new(
        force,
        true,
        format!("Backward transition from {from} to {to} requires force"),
    )
}

/// Severity of a prerequisite blocker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerSeverity {
    /// Blocks the transition unless forced.
    Error,
    /// Worth surfacing, but nearly satisfied.
    Warning,
    /// Informational only.
    Info,
}

impl fmt::Display for BlockerSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

/// One itemized prerequisite finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteBlocker {
    /// Prerequisite stage the finding is about.
    pub stage: Stage,
    /// Severity of the finding.
    pub severity: BlockerSeverity,
    /// Human-readable explanation.
    pub message: String,
}

/// Result of walking a stage's prerequisites against a status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisiteCheck {
    /// Stage whose prerequisites were checked.
    pub target: Stage,
    /// Whether every prerequisite is completed or skipped.
    pub met: bool,
    /// Prerequisites that are completed or skipped.
    pub completed: Vec<Stage>,
    /// Prerequisites that have not finished.
    pub pending: Vec<Stage>,
    /// Prerequisites that failed.
    pub failed: Vec<Stage>,
    /// Itemized findings.
    pub blockers: Vec<PrerequisiteBlocker>,
    /// Whether a force override may bypass the unmet prerequisites.
    pub can_force: bool,
}

impl PrerequisiteCheck {
    /// Returns unmet prerequisites (pending and failed) in canonical order.
    #[must_use]
    pub fn missing(&self) -> Vec<Stage> {
        let mut missing: Vec<Stage> = self
            .pending
            .iter()
            .chain(self.failed.iter())
            .copied()
            .collect();
        missing.sort();
        missing
    }

    /// Returns blockers with [`BlockerSeverity::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &PrerequisiteBlocker> {
        self.blockers
            .iter()
            .filter(|blocker| blocker.severity == BlockerSeverity::Error)
    }
}

/// Classifies each prerequisite of `target` using `statuses`.
#[must_use]
pub fn check_prerequisites(target: Stage, statuses: &StatusSnapshot) -> PrerequisiteCheck {
    let mut check = PrerequisiteCheck {
        target,
        met: true,
        completed: Vec::new(),
        pending: Vec::new(),
        failed: Vec::new(),
        blockers: Vec::new(),
        can_force: true,
    };

    for prerequisite in target.prerequisites().iter().copied() {
        let Some(status) = statuses.get(&prerequisite).copied() else {
            check.pending.push(prerequisite);
            check.can_force = false;
            check.blockers.push(PrerequisiteBlocker {
                stage: prerequisite,
                severity: BlockerSeverity::Error,
                message: format!("Prerequisite {prerequisite} has no stage record"),
            });
            continue;
        };

        match status {
            StageStatus::Completed => check.completed.push(prerequisite),
            StageStatus::Skipped => {
                check.completed.push(prerequisite);
                check.blockers.push(PrerequisiteBlocker {
                    stage: prerequisite,
                    severity: BlockerSeverity::Info,
                    message: format!("Prerequisite {prerequisite} was skipped"),
                });
            }
            StageStatus::InProgress => {
                check.pending.push(prerequisite);
                check.blockers.push(PrerequisiteBlocker {
                    stage: prerequisite,
                    severity: BlockerSeverity::Warning,
                    message: format!("Prerequisite {prerequisite} is still in progress"),
                });
            }
            StageStatus::NotStarted | StageStatus::Blocked => {
                check.pending.push(prerequisite);
                check.blockers.push(PrerequisiteBlocker {
                    stage: prerequisite,
                    severity: BlockerSeverity::Error,
                    message: format!("Prerequisite {prerequisite} is {}", status.as_str()),
                });
            }
            StageStatus::Failed => {
                check.failed.push(prerequisite);
                check.blockers.push(PrerequisiteBlocker {
                    stage: prerequisite,
                    severity: BlockerSeverity::Error,
                    message: format!("Prerequisite {prerequisite} failed"),
                });
            }
        }
    }

    check.met = check.pending.is_empty() && check.failed.is_empty();
    check
}

/// Joins stage identifiers with `", "`.
#[must_use]
pub fn join_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|stage| stage.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
