//! `health` and `metrics` commands: the ambient `/healthz`/`/metrics` surface.

use anyhow::anyhow;

use crate::client::{AppContext, CliError, CliResult, classify_problem};

pub(crate) async fn handle_health(ctx: &AppContext) -> CliResult<()> {
    let url = ctx.url("/healthz")?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to read response: {err}")))?;
    println!("{body}");
    Ok(())
}

pub(crate) async fn handle_metrics(ctx: &AppContext) -> CliResult<()> {
    let url = ctx.url("/metrics")?;
    let response = ctx
        .client
        .get(url)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_problem(response).await);
    }

    let body = response
        .text()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to read response: {err}")))?;
    print!("{body}");
    Ok(())
}
