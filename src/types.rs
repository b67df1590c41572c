//! Common types used throughout the routing core

use solana_sdk::pubkey::Pubkey;

/// A token known to the registry. Immutable; loaded from static
/// configuration. `decimals` drives every human ↔ base-unit conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    /// Convert a human-readable amount to base units, truncating any
    /// precision beyond `decimals`.
    pub fn to_base_units(&self, amount: f64) -> u64 {
        (amount * 10f64.powi(self.decimals as i32)).floor() as u64
    }

    /// Convert base units to a human-readable amount (display only).
    pub fn to_human(&self, base_units: u64) -> f64 {
        base_units as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// One shard of a sharded liquidity pool. A pair has 1..N shards ordered
/// by `shard_number`, representing increasing liquidity tiers.
#[derive(Debug, Clone)]
pub struct PoolShard {
    pub id: String,
    pub pool_address: Pubkey,
    pub authority: Pubkey,
    pub token_a_mint: Pubkey,
    pub token_b_mint: Pubkey,
    pub token_a_account: Pubkey,
    pub token_b_account: Pubkey,
    pub lp_mint: Pubkey,
    pub fee_account: Pubkey,
    pub shard_number: u32,
    /// Last-known reserves; either read live from the ledger or supplied
    /// from a snapshot. Staleness is the caller's responsibility.
    pub reserve_a: u64,
    pub reserve_b: u64,
}

impl PoolShard {
    /// Whether this shard can be considered for routing at all.
    /// Zero-reserve shards are always excluded.
    pub fn has_liquidity(&self) -> bool {
        self.reserve_a > 0 && self.reserve_b > 0
    }

    /// Whether `mint` is one of the two sides of this shard.
    pub fn contains_mint(&self, mint: &Pubkey) -> bool {
        self.token_a_mint == *mint || self.token_b_mint == *mint
    }
}

/// An unordered (tokenA, tokenB) trading pair identified by symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingPair {
    pub token_a: String,
    pub token_b: String,
}

impl TradingPair {
    pub fn new(token_a: impl Into<String>, token_b: impl Into<String>) -> Self {
        Self {
            token_a: token_a.into(),
            token_b: token_b.into(),
        }
    }

    /// Canonical display form, e.g. "SOL/USDC".
    pub fn label(&self) -> String {
        format!("{}/{}", self.token_a, self.token_b)
    }
}

/// How a quote was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMethod {
    /// Recommended by the remote routing service
    Remote,
    /// Computed by the local constant-product engine
    Local,
}

impl RoutingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

/// A fully-resolved quote for a single swap. Created fresh per request,
/// never mutated, superseded by the next quote for the same input.
#[derive(Debug, Clone)]
pub struct Quote {
    pub input_token: Token,
    pub output_token: Token,
    pub input_amount: u64,
    pub estimated_output: u64,
    pub price_impact_bps: u32,
    pub selected_shard: PoolShard,
    pub fee_base_units: u64,
    pub routing_method: RoutingMethod,
    /// Service-supplied explanation for remote quotes, if any
    pub reason: Option<String>,
    /// Set when the best available shard still exceeds the configured
    /// price-impact ceiling. The caller decides whether to warn or block.
    pub exceeds_impact_ceiling: bool,
}

impl Quote {
    /// A quote with zero estimated output is invalid and must not be
    /// executed.
    pub fn is_executable(&self) -> bool {
        self.estimated_output > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> Token {
        Token {
            mint: Pubkey::new_unique(),
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    #[test]
    fn base_unit_conversion_truncates() {
        let token = usdc();
        assert_eq!(token.to_base_units(100.0), 100_000_000);
        assert_eq!(token.to_base_units(0.1234567), 123_456);
        assert_eq!(token.to_human(100_000_000), 100.0);
    }

    #[test]
    fn pair_label() {
        assert_eq!(TradingPair::new("SOL", "USDC").label(), "SOL/USDC");
    }

    #[test]
    fn zero_reserve_shard_has_no_liquidity() {
        let mut shard = PoolShard {
            id: "shard-1".to_string(),
            pool_address: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            token_a_mint: Pubkey::new_unique(),
            token_b_mint: Pubkey::new_unique(),
            token_a_account: Pubkey::new_unique(),
            token_b_account: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            fee_account: Pubkey::new_unique(),
            shard_number: 1,
            reserve_a: 1_000,
            reserve_b: 1_000,
        };
        assert!(shard.has_liquidity());
        shard.reserve_b = 0;
        assert!(!shard.has_liquidity());
    }
}
