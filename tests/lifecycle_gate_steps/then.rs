//! Then steps for lifecycle gate BDD scenarios.

use super::world::{LifecycleWorld, parse_stage, run_async};
use rstest_bdd_macros::then;
use stagegate::lifecycle::{
    domain::{GateOutcome, StageStatus},
    services::StageStartReport,
};

fn started(world: &LifecycleWorld) -> Result<&StageStartReport, eyre::Report> {
    match world.last_start.as_ref() {
        Some(Ok(report)) => Ok(report),
        Some(Err(err)) => Err(eyre::eyre!("stage start failed: {err}")),
        None => Err(eyre::eyre!("missing stage start result")),
    }
}

#[then("the stage start succeeds")]
fn stage_start_succeeds(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    started(world).map(|_| ())
}

#[then("the stage start fails with code {code:u8}")]
fn stage_start_fails(world: &LifecycleWorld, code: u8) -> Result<(), eyre::Report> {
    match world.last_start.as_ref() {
        Some(Err(err)) if err.code().value() == code => Ok(()),
        Some(Err(err)) => Err(eyre::eyre!("expected code {code}, got {}", err.code())),
        Some(Ok(_)) => Err(eyre::eyre!("expected stage start to fail")),
        None => Err(eyre::eyre!("missing stage start result")),
    }
}

#[then(r#"the missing prerequisites include "{stage}""#)]
fn missing_prerequisites_include(
    world: &LifecycleWorld,
    stage: String,
) -> Result<(), eyre::Report> {
    let expected = parse_stage(&stage)?;
    let Some(Err(err)) = world.last_start.as_ref() else {
        return Err(eyre::eyre!("expected a failed stage start"));
    };
    if !err.missing_stages().contains(&expected) {
        return Err(eyre::eyre!(
            "expected {expected} among missing stages {:?}",
            err.missing_stages()
        ));
    }
    Ok(())
}

#[then("the response carries an advisory note")]
fn advisory_note(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    let report = started(world)?;
    if report.advisory_note().is_none() {
        return Err(eyre::eyre!("expected an advisory note"));
    }
    Ok(())
}

#[then(r#"stage "{stage}" has status "{status}""#)]
fn stage_has_status(
    world: &LifecycleWorld,
    stage: String,
    status: String,
) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let expected = StageStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))?;
    let manifest = run_async(world.service.get_lifecycle_state(world.epic_id()?))?;
    let actual = manifest.status_of(target);
    if actual != expected {
        return Err(eyre::eyre!("expected {target} to be {expected}, found {actual}"));
    }
    Ok(())
}

#[then("the skip fails with code {code:u8}")]
fn skip_fails(world: &LifecycleWorld, code: u8) -> Result<(), eyre::Report> {
    match world.last_skip.as_ref() {
        Some(Err(err)) if err.code().value() == code => Ok(()),
        Some(Err(err)) => Err(eyre::eyre!("expected code {code}, got {}", err.code())),
        Some(Ok(_)) => Err(eyre::eyre!("expected skip to fail")),
        None => Err(eyre::eyre!("missing skip result")),
    }
}

#[then(r#"the gate for stage "{stage}" is allowed"#)]
fn gate_allowed(world: &LifecycleWorld, stage: String) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let check = run_async(
        world
            .service
            .check_gate(world.epic_id()?, target, world.mode),
    )?;
    if !check.allowed {
        return Err(eyre::eyre!(
            "expected gate for {target} to allow, missing {:?}",
            check.missing_prerequisites
        ));
    }
    Ok(())
}

#[then(r#"the mirror holds one "{gate}" gate row with outcome "{outcome}""#)]
fn mirror_gate_row(
    world: &LifecycleWorld,
    gate: String,
    outcome: String,
) -> Result<(), eyre::Report> {
    let expected = GateOutcome::try_from(outcome.as_str())
        .map_err(|err| eyre::eyre!("invalid gate outcome in scenario: {err}"))?;
    let rows: Vec<_> = world
        .mirror
        .all_gates()?
        .into_iter()
        .filter(|row| row.gate_name == gate)
        .collect();
    match rows.as_slice() {
        [row] if row.outcome == expected => Ok(()),
        [row] => Err(eyre::eyre!("expected outcome {expected}, found {}", row.outcome)),
        other => Err(eyre::eyre!("expected one {gate} row, found {}", other.len())),
    }
}
