#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Administrative CLI for interacting with a stream channel node.
//!
//! Layout: `cli.rs` (argument parsing, command dispatch), `client.rs`
//! (shared HTTP context and error types), `output.rs` (table/JSON
//! renderers), `commands/` (one module per command group).

mod cli;
mod client;
mod commands;
mod output;

pub use cli::run;
