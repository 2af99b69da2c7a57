//! Given steps for lifecycle gate BDD scenarios.

use super::world::{LifecycleWorld, parse_stage, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::given;
use stagegate::lifecycle::domain::{EnforcementMode, EpicId};

#[given(r#"epic "{epic}" has a fresh lifecycle"#)]
fn fresh_lifecycle(world: &mut LifecycleWorld, epic: String) -> Result<(), eyre::Report> {
    world.epic_id = Some(EpicId::new(epic).wrap_err("parse scenario epic id")?);
    Ok(())
}

#[given(r#"the enforcement mode is "{mode}""#)]
fn enforcement_mode(world: &mut LifecycleWorld, mode: String) -> Result<(), eyre::Report> {
    world.mode = EnforcementMode::try_from(mode.as_str())
        .map_err(|err| eyre::eyre!("invalid enforcement mode in scenario: {err}"))?;
    Ok(())
}

#[given(r#"stage "{stage}" is completed with artifact "{artifact}""#)]
fn stage_completed(
    world: &mut LifecycleWorld,
    stage: String,
    artifact: String,
) -> Result<(), eyre::Report> {
    let target = parse_stage(&stage)?;
    let epic_id = world.epic_id()?.clone();
    run_async(world.service.complete_stage(&epic_id, target, vec![artifact]))
        .wrap_err("complete stage in scenario setup")?;
    Ok(())
}
