//! Then steps for task execution BDD scenarios.

use super::world::{ExecutionWorld, run_async};
use gropius::job::domain::{PromptResult, PromptStatus};
use gropius::workspace::{ExecutionManifest, MANIFEST_FILE};
use rstest_bdd_macros::then;

fn prompt_result(world: &ExecutionWorld, index: usize) -> Result<&PromptResult, eyre::Report> {
    let report = world.report()?;
    index
        .checked_sub(1)
        .and_then(|position| report.prompt_results.get(position))
        .ok_or_else(|| eyre::eyre!("no prompt result {index} in {report:?}"))
}

#[then(r#"the execution status is "{status}""#)]
fn execution_status_is(world: &ExecutionWorld, status: String) -> Result<(), eyre::Report> {
    let report = world.report()?;
    eyre::ensure!(
        report.status.as_str() == status,
        "expected status {status}, found {} ({report:?})",
        report.status.as_str()
    );
    Ok(())
}

#[then("the execution has {count:usize} prompt results")]
fn execution_has_results(world: &ExecutionWorld, count: usize) -> Result<(), eyre::Report> {
    let found = world.report()?.prompt_results.len();
    eyre::ensure!(found == count, "expected {count} prompt results, found {found}");
    Ok(())
}

#[then(r#"prompt result {index:usize} is for "{file}""#)]
fn prompt_result_is_for(
    world: &ExecutionWorld,
    index: usize,
    file: String,
) -> Result<(), eyre::Report> {
    let result = prompt_result(world, index)?;
    eyre::ensure!(
        result.prompt_file == file,
        "expected {file}, found {}",
        result.prompt_file
    );
    Ok(())
}

#[then(r#"prompt result {index:usize} failed with "{kind}""#)]
fn prompt_result_failed_with(
    world: &ExecutionWorld,
    index: usize,
    kind: String,
) -> Result<(), eyre::Report> {
    let result = prompt_result(world, index)?;
    eyre::ensure!(result.status == PromptStatus::Failed, "{result:?}");
    let found = result
        .failure_kind
        .ok_or_else(|| eyre::eyre!("prompt result {index} has no failure kind"))?;
    eyre::ensure!(found.as_str() == kind, "expected {kind}, found {found}");
    Ok(())
}

#[then("prompt result {index:usize} succeeded")]
fn prompt_result_succeeded(world: &ExecutionWorld, index: usize) -> Result<(), eyre::Report> {
    let result = prompt_result(world, index)?;
    eyre::ensure!(result.status == PromptStatus::Success, "{result:?}");
    Ok(())
}

#[then(r#"the error of prompt result {index:usize} mentions "{text}""#)]
fn prompt_error_mentions(
    world: &ExecutionWorld,
    index: usize,
    text: String,
) -> Result<(), eyre::Report> {
    let result = prompt_result(world, index)?;
    let error = result
        .error
        .as_deref()
        .ok_or_else(|| eyre::eyre!("prompt result {index} has no error"))?;
    eyre::ensure!(error.contains(&text), "'{error}' does not mention '{text}'");
    Ok(())
}

#[then(r#"the execution failed with "{kind}""#)]
fn execution_failed_with(world: &ExecutionWorld, kind: String) -> Result<(), eyre::Report> {
    let report = world.report()?;
    let failure = report
        .failure
        .as_ref()
        .ok_or_else(|| eyre::eyre!("execution has no failure: {report:?}"))?;
    eyre::ensure!(
        failure.kind.as_str() == kind,
        "expected {kind}, found {}",
        failure.kind
    );
    Ok(())
}

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &ExecutionWorld, status: String) -> Result<(), eyre::Report> {
    let key = world.existing_key()?;
    let task = run_async(world.existing_service()?.store().get_task(key))?;
    eyre::ensure!(
        task.status().as_str() == status,
        "expected task status {status}, found {}",
        task.status()
    );
    Ok(())
}

#[then("the task has {count:usize} recorded executions")]
fn task_has_executions(world: &ExecutionWorld, count: usize) -> Result<(), eyre::Report> {
    let key = world.existing_key()?;
    let task = run_async(world.existing_service()?.store().get_task(key))?;
    let found = task.executions().len();
    eyre::ensure!(found == count, "expected {count} executions, found {found}");
    Ok(())
}

#[then(r#"the output manifest lists "{file}""#)]
fn manifest_lists(world: &ExecutionWorld, file: String) -> Result<(), eyre::Report> {
    let output_dir = world
        .report()?
        .output_dir
        .as_ref()
        .ok_or_else(|| eyre::eyre!("execution has no output directory"))?;
    let raw = std::fs::read_to_string(output_dir.join(MANIFEST_FILE))?;
    let manifest: ExecutionManifest = serde_json::from_str(&raw)?;
    eyre::ensure!(
        manifest.prompts.iter().any(|prompt| prompt.prompt_file == file),
        "manifest does not list {file}"
    );
    Ok(())
}

#[then(r#"the task log mentions "{text}""#)]
fn task_log_mentions(world: &ExecutionWorld, text: String) -> Result<(), eyre::Report> {
    let key = world.existing_key()?;
    let logs = world.existing_service()?.get_logs(key);
    eyre::ensure!(
        logs.iter().any(|entry| entry.message.contains(&text)),
        "no log entry mentions '{text}'"
    );
    Ok(())
}
