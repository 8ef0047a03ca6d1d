//! When steps for task execution BDD scenarios.

use super::world::{ExecutionWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when("the task is executed")]
fn execute_task(world: &mut ExecutionWorld) -> Result<(), eyre::Report> {
    let key = world.task_key()?;
    let report = run_async(world.service()?.execute(&key)).wrap_err("execute task")?;
    world.last_report = Some(report);
    Ok(())
}
