//! ShardSwap - Sharded Liquidity Routing & Execution Core
//!
//! Client-side engine for an AMM whose liquidity for each trading pair is
//! split across multiple on-chain pool shards. The crate answers two
//! questions for its callers:
//!
//! 1. **Where should this trade go?** `RoutingEngine` prices a swap
//!    against every shard of a pair using live reserves and picks the
//!    best one; `RemoteRouterClient` can delegate that decision to an
//!    external routing service, with automatic local fallback.
//! 2. **What exactly goes on chain?** `InstructionEncoder` layouts and
//!    `ExecutionBuilder` turn the chosen route into a fully formed
//!    unsigned transaction and track it to confirmation.
//!
//! RPC traffic flows through `ConnectionPool`, which round-robins over
//! configured endpoints and quarantines unhealthy ones.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![warn(dead_code)]
#![warn(unused_must_use)]

pub mod config;
pub mod errors;
pub mod registry;
pub mod router;
pub mod rpc_pool;
pub mod tx;
pub mod types;

pub use config::Config;
pub use errors::{Result, RouterError};
pub use registry::ShardRegistry;
pub use router::{RemoteRouterClient, RoutingEngine};
pub use rpc_pool::ConnectionPool;
pub use tx::ExecutionBuilder;
pub use types::{PoolShard, Quote, RoutingMethod, Token, TradingPair};
