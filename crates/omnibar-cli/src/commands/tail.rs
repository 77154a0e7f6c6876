//! `tail` command: follow `/fleet/events`, printing each
//! `process.state_changed` envelope as it arrives, reconnecting on drop.

use std::time::Duration;

use anyhow::anyhow;
use futures_util::StreamExt;
use omnibar_events::EventEnvelope;

use crate::client::{AppContext, CliError, CliResult, classify_problem};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub(crate) async fn handle_tail(ctx: &AppContext, retry_secs: u64) -> CliResult<()> {
    loop {
        let url = ctx.url("/fleet/events")?;
        let response = match ctx.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                eprintln!("stream connection failed: {err}. retrying in {retry_secs}s");
                tokio::time::sleep(Duration::from_secs(retry_secs)).await;
                continue;
            }
        };

        if !response.status().is_success() {
            return Err(classify_problem(response).await);
        }

        if let Err(err) = stream_events(response).await {
            eprintln!("stream error: {}. retrying in {retry_secs}s", err.display_message());
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }
}

async fn stream_events(response: reqwest::Response) -> CliResult<()> {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| CliError::failure(anyhow!("failed to read event stream: {err}")))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim_end_matches('\r').to_string();
            buffer.drain(..=pos);

            let Some(payload) = line.strip_prefix("data:") else { continue };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }

            match serde_json::from_str::<EventEnvelope>(payload) {
                Ok(envelope) => {
                    let text = serde_json::to_string_pretty(&envelope)
                        .map_err(|err| CliError::failure(anyhow!("failed to format event JSON: {err}")))?;
                    println!("{text}");
                }
                Err(err) => eprintln!("discarding malformed event payload: {err} -- {payload}"),
            }
        }
    }

    Ok(())
}
