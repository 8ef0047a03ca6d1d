//! Given steps for task execution BDD scenarios.

use super::world::{ExecutionWorld, PlannedTask, run_async};
use eyre::WrapErr;
use gropius::job::domain::JobSpec;
use rstest_bdd_macros::given;

#[given(r#"a migration job "{name}" from source "{source}" targeting "{target}""#)]
fn migration_job(world: &mut ExecutionWorld, name: String, source: String, target: String) {
    world.job = Some(JobSpec::new(name, source).with_targets([target]));
}

#[given(
    r#"stage "{stage_id}" has task "{task}" for agent "{agent}" and capability "{capability}""#
)]
fn stage_has_task(
    world: &mut ExecutionWorld,
    stage_id: String,
    task: String,
    agent: String,
    capability: String,
) {
    world.task = Some(PlannedTask {
        stage_id,
        name: task,
        agent,
        capability,
    });
}

#[given(r#"the prompt "{path}" reads "{text}""#)]
fn prompt_reads(world: &mut ExecutionWorld, path: String, text: String) -> Result<(), eyre::Report> {
    world
        .bench
        .write_prompt(&path, &text)
        .wrap_err_with(|| format!("write prompt {path}"))
}

#[given(r#"the prompt "{path}" is missing"#)]
fn prompt_is_missing(world: &mut ExecutionWorld, path: String) -> Result<(), eyre::Report> {
    world
        .bench
        .remove_prompt(&path)
        .wrap_err_with(|| format!("remove prompt {path}"))
}

#[given("a per-prompt timeout of {secs:u64} seconds")]
fn per_prompt_timeout(world: &mut ExecutionWorld, secs: u64) {
    world.bench.set_timeout_secs(secs);
}

#[given("the task has been executed once")]
fn executed_once(world: &mut ExecutionWorld) -> Result<(), eyre::Report> {
    let key = world.task_key()?;
    let report = run_async(world.service()?.execute(&key)).wrap_err("first execution")?;
    eyre::ensure!(report.is_success(), "first execution failed: {report:?}");
    Ok(())
}
