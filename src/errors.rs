//! Error taxonomy for the routing and execution core
//!
//! Every fallible operation in the crate returns `Result<T, RouterError>`.
//! The taxonomy distinguishes transient transport failures (retryable by the
//! connection pool) from bad-input and internal errors (propagated
//! immediately), so callers never retry a request that cannot succeed.

use thiserror::Error;

/// Errors produced by the routing engine, remote router client,
/// connection pool and instruction encoder.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Transport-level failure reaching an endpoint (RPC or HTTP)
    #[error("Network error: {0}")]
    Network(String),

    /// The remote routing service exceeded its hard timeout
    #[error("Timeout after {timeout_ms}ms: {context}")]
    Timeout { context: String, timeout_ms: u64 },

    /// Endpoint signaled throttling; triggers immediate endpoint demotion
    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimited { endpoint: String },

    /// Remote service returned a non-success status or an error payload
    #[error("Routing API error: {0}")]
    Api(String),

    /// Malformed response, unknown shard, or a non-positive amount
    #[error("Validation error: {0}")]
    Validation(String),

    /// No shards are configured for the requested token pair
    #[error("Pair not found: {0}")]
    PairNotFound(String),

    /// Every shard's computed output is zero or reserves are exhausted
    #[error("Insufficient liquidity for pair {pair} (amount in: {amount_in})")]
    InsufficientLiquidity { pair: String, amount_in: u64 },

    /// All endpoints and all retries were exhausted
    #[error("All endpoints failed after {attempts} attempts: {last_error}")]
    EndpointsExhausted { attempts: u32, last_error: String },

    /// The ledger rejected or never confirmed a submitted transaction
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Programming-level misuse of the instruction encoder.
    /// Should never occur in correct code; treated as fatal.
    #[error("Instruction build error: {0}")]
    InstructionBuild(String),

    /// Configuration loading or parsing failure
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Whether retrying the operation against another endpoint may succeed.
    ///
    /// Validation and encoding errors indicate bad input, not a bad
    /// endpoint, and must propagate immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Timeout { .. } => true,
            Self::RateLimited { .. } => true,
            Self::Api(_) => false,
            Self::Validation(_) => false,
            Self::PairNotFound(_) => false,
            Self::InsufficientLiquidity { .. } => false,
            Self::EndpointsExhausted { .. } => false,
            Self::TransactionFailed(_) => false,
            Self::InstructionBuild(_) => false,
            Self::Configuration(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Coarse category label for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api(_) => "api",
            Self::Validation(_) => "validation",
            Self::PairNotFound(_) => "pair_not_found",
            Self::InsufficientLiquidity { .. } => "liquidity",
            Self::EndpointsExhausted { .. } => "exhausted",
            Self::TransactionFailed(_) => "transaction",
            Self::InstructionBuild(_) => "instruction",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Build a timeout error with a bounded context string.
    pub fn timeout(context: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            context: context.into(),
            timeout_ms,
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn instruction(reason: impl Into<String>) -> Self {
        Self::InstructionBuild(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
