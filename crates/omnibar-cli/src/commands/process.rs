//! `process` subcommands: talk to a node's `/fleet/processes*` surface.

use anyhow::anyhow;
use omnibar_supervisor::ProcessRecord;

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliError, CliResult, classify_problem};
use crate::output::{render_process, render_process_list};

pub(crate) async fn handle_list(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let url = ctx.url("/fleet/processes")?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }

    let records = response
        .json::<Vec<ProcessRecord>>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to decode response: {err}")))?;
    render_process_list(&records, format)
}

pub(crate) async fn handle_status(ctx: &AppContext, process_id: &str, format: OutputFormat) -> CliResult<()> {
    fetch_and_render(ctx, &format!("/fleet/processes/{process_id}"), format).await
}

pub(crate) async fn handle_start(ctx: &AppContext, process_id: &str, format: OutputFormat) -> CliResult<()> {
    post_and_render(ctx, &format!("/fleet/processes/{process_id}/start"), format).await
}

pub(crate) async fn handle_stop(ctx: &AppContext, process_id: &str, format: OutputFormat) -> CliResult<()> {
    post_and_render(ctx, &format!("/fleet/processes/{process_id}/stop"), format).await
}

async fn fetch_and_render(ctx: &AppContext, path: &str, format: OutputFormat) -> CliResult<()> {
    let url = ctx.url(path)?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request failed: {err}")))?;
    respond(response, format).await
}

async fn post_and_render(ctx: &AppContext, path: &str, format: OutputFormat) -> CliResult<()> {
    let url = ctx.url(path)?;
    let response = ctx
        .client
        .post(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request failed: {err}")))?;
    respond(response, format).await
}

async fn respond(response: reqwest::Response, format: OutputFormat) -> CliResult<()> {
    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }
    let record = response
        .json::<ProcessRecord>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to decode response: {err}")))?;
    render_process(&record, format)
}
