#![forbid(unsafe_code)]

//! Thin binary entrypoint; all behavior lives in the library crate.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let exit_code = omnibar_cli::run().await;
    u8::try_from(exit_code).map_or(ExitCode::FAILURE, ExitCode::from)
}
