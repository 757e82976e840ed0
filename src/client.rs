//! Structured-call client.
//!
//! Keep the public surface small and predictable. Implementation details are
//! split into submodules under `src/client/`:
//! - `request`: [`StructuredRequest`] and [`Response`]
//! - `turn_loop`: the interactive model/tool exchange
//! - `batch`: batch submission and per-item reconciliation

pub mod batch;
pub mod builder;
pub mod core;
pub mod request;
pub mod turn_loop;

pub use batch::{reconcile_entry, reconcile_results, BatchOutcome, BatchResponse, BatchResult};
pub use builder::ClientBuilder;
pub use core::Client;
pub use request::{Response, StructuredRequest};
pub use turn_loop::TurnState;
