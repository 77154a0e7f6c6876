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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Fleet Router: cross-node process RPC, concurrent cluster status
//! aggregation, and the event relay that unifies remote process state onto
//! the local event bus.

mod client;
mod error;
mod peer;
mod relay;
mod router;

pub use client::{PeerClient, RPC_DEADLINE};
pub use error::{FleetError, FleetResult};
pub use peer::{PeerNode, parse_peer, parse_peers};
pub use relay::{format_sse_line, spawn_relay};
pub use router::{ClusterStatus, FleetRouter};
