#![forbid(unsafe_code)]

//! Binary entrypoint. Exit codes: `0` clean shutdown, `1` fatal
//! initialization failure, `2` unhandled panic.

use std::process::ExitCode;

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::from(1);
        }
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runtime.block_on(omnibar_app::run_app())));

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(err)) => {
            eprintln!("fatal startup error: {err}");
            ExitCode::from(1)
        }
        Err(_) => {
            eprintln!("unhandled panic during startup or shutdown");
            ExitCode::from(2)
        }
    }
}
