//! Shard routing: local constant-product quoting and remote delegation
//!
//! Two quoting paths share the `Quote` type:
//! - **engine**: reads live reserves and runs the pricing math over every
//!   shard of a pair
//! - **remote**: delegates shard selection to the external routing
//!   service, validating its answer against the local registry

pub mod engine;
pub mod math;
pub mod remote;

pub use engine::RoutingEngine;
pub use math::{apply_slippage, swap_outcome, SwapOutcome};
pub use remote::RemoteRouterClient;
