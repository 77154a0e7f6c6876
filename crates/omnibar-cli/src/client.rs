//! Shared client utilities and error types for the CLI.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type distinguishing validation mistakes from operational
/// failures, so `main` can map each to a distinct exit code.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Dependencies constructed from CLI flags, shared across every command.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
}

impl AppContext {
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id)
            .map_err(|_| CliError::failure(anyhow!("trace identifier contains invalid characters")))?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self { client, base_url: cli.api_url.clone() })
    }

    pub(crate) fn url(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input.parse::<Url>().map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Structured error body returned by the stream channel HTTP surface.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    detail: String,
}

/// Classify a non-success HTTP response into a [`CliError`].
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).to_string();
    let parsed = serde_json::from_slice::<ErrorBody>(&bytes).ok();

    let message = parsed
        .as_ref()
        .map(|body| format!("{} ({})", body.detail, body.code))
        .unwrap_or_else(|| body_text.trim().to_string());

    if matches!(status, StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::NOT_FOUND) {
        CliError::validation(if message.is_empty() { format!("request failed with status {status}") } else { message })
    } else if message.is_empty() {
        CliError::failure(anyhow!("request failed with status {status}"))
    } else {
        CliError::failure(anyhow!("{message} (status {status})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_rejects_a_malformed_value() {
        assert!(parse_url("not a url").is_err());
    }

    #[test]
    fn parse_url_accepts_a_well_formed_value() {
        assert_eq!(parse_url("http://127.0.0.1:7175").unwrap().as_str(), "http://127.0.0.1:7175/");
    }

    #[tokio::test]
    async fn classify_problem_treats_not_found_as_a_validation_error() {
        use httpmock::MockServer;
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/fleet/processes/missing");
            then.status(404).json_body(serde_json::json!({"code": "not_found", "detail": "unknown process"}));
        });

        let response = reqwest::get(format!("{}/fleet/processes/missing", server.base_url()))
            .await
            .expect("request");
        let err = classify_problem(response).await;
        mock.assert();
        assert_eq!(err.exit_code(), 2);
        assert!(err.display_message().contains("unknown process"));
    }
}
