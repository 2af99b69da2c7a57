//! When steps for lifecycle gate BDD scenarios.

use super::world::{LifecycleWorld, parse_stage, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;
use stagegate::lifecycle::{domain::GateOutcome, services::GateResultRequest};

#[when(r#"stage "{stage}" is started"#)]
fn start_stage(world: &mut LifecycleWorld, stage: String) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let epic_id = world.epic_id()?.clone();
    let result = run_async(world.service.start_stage(&epic_id, target, world.mode));
    world.last_start = Some(result);
    Ok(())
}

#[when(r#"stage "{stage}" is skipped because "{reason}""#)]
fn skip_stage(
    world: &mut LifecycleWorld,
    stage: String,
    reason: String,
) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let epic_id = world.epic_id()?.clone();
    let result = run_async(world.service.skip_stage(&epic_id, target, &reason));
    world.last_skip = Some(result);
    Ok(())
}

#[when(r#"gate "{gate}" of stage "{stage}" is recorded as "{outcome}""#)]
fn record_gate(
    world: &mut LifecycleWorld,
    gate: String,
    stage: String,
    outcome: String,
) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let parsed_outcome = GateOutcome::try_from(outcome.as_str())
        .map_err(|err| eyre::eyre!("invalid gate outcome in scenario: {err}"))?;
    let epic_id = world.epic_id()?.clone();
    let request = GateResultRequest::new(target, gate, parsed_outcome).checked_by("bdd");
    run_async(world.service.record_gate_result(&epic_id, request))
        .wrap_err("record gate result")?;
    Ok(())
}
