//! On-chain transaction layer
//!
//! - **encoder**: raw instruction layouts for the sharded pool program
//! - **builder**: quote-to-transaction assembly, submission and
//!   confirmation tracking

pub mod builder;
pub mod encoder;

pub use builder::ExecutionBuilder;
pub use encoder::{PoolOperation, LiquidityAccounts, SwapAccounts};
