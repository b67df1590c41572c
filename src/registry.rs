//! Static shard and token registry
//!
//! The registry mirrors the pool listing the front end ships: a TOML
//! document declaring every known token and every shard of every pair.
//! It is loaded once at startup and read-only afterwards; live reserve
//! data is layered on top by the routing engine.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::errors::{Result, RouterError};
use crate::types::{PoolShard, Token, TradingPair};

#[derive(Debug, Deserialize)]
struct RegistryFile {
    /// Address of the on-chain pool program all shards belong to
    program: String,
    #[serde(default)]
    tokens: Vec<TokenEntry>,
    #[serde(default)]
    shards: Vec<ShardEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    symbol: String,
    mint: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct ShardEntry {
    id: String,
    token_a: String,
    token_b: String,
    pool: String,
    authority: String,
    token_a_account: String,
    token_b_account: String,
    lp_mint: String,
    fee_account: String,
    shard_number: u32,
    #[serde(default)]
    reserve_a: u64,
    #[serde(default)]
    reserve_b: u64,
}

/// Read-only registry of tokens and pool shards, keyed by trading pair.
#[derive(Debug)]
pub struct ShardRegistry {
    program_id: Pubkey,
    tokens: HashMap<String, Token>,
    shards: HashMap<TradingPair, Vec<PoolShard>>,
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| RouterError::Configuration(format!("{field}: invalid address {value}: {e}")))
}

/// Canonical pair key: symbols in lexical order so lookups are
/// direction-independent.
fn canonical_pair(a: &str, b: &str) -> TradingPair {
    if a <= b {
        TradingPair::new(a, b)
    } else {
        TradingPair::new(b, a)
    }
}

impl ShardRegistry {
    /// Parse a registry from its TOML source.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)
            .map_err(|e| RouterError::Configuration(format!("registry parse: {e}")))?;

        let program_id = parse_pubkey("program", &file.program)?;

        let mut tokens = HashMap::new();
        for entry in file.tokens {
            let token = Token {
                mint: parse_pubkey("token.mint", &entry.mint)?,
                symbol: entry.symbol.clone(),
                decimals: entry.decimals,
            };
            if tokens.insert(entry.symbol.clone(), token).is_some() {
                return Err(RouterError::Configuration(format!(
                    "duplicate token symbol {}",
                    entry.symbol
                )));
            }
        }

        let mut shards: HashMap<TradingPair, Vec<PoolShard>> = HashMap::new();
        for entry in file.shards {
            let token_a = tokens.get(&entry.token_a).ok_or_else(|| {
                RouterError::Configuration(format!("shard {}: unknown token {}", entry.id, entry.token_a))
            })?;
            let token_b = tokens.get(&entry.token_b).ok_or_else(|| {
                RouterError::Configuration(format!("shard {}: unknown token {}", entry.id, entry.token_b))
            })?;

            let shard = PoolShard {
                id: entry.id.clone(),
                pool_address: parse_pubkey("shard.pool", &entry.pool)?,
                authority: parse_pubkey("shard.authority", &entry.authority)?,
                token_a_mint: token_a.mint,
                token_b_mint: token_b.mint,
                token_a_account: parse_pubkey("shard.token_a_account", &entry.token_a_account)?,
                token_b_account: parse_pubkey("shard.token_b_account", &entry.token_b_account)?,
                lp_mint: parse_pubkey("shard.lp_mint", &entry.lp_mint)?,
                fee_account: parse_pubkey("shard.fee_account", &entry.fee_account)?,
                shard_number: entry.shard_number,
                reserve_a: entry.reserve_a,
                reserve_b: entry.reserve_b,
            };

            let key = canonical_pair(&entry.token_a, &entry.token_b);
            shards.entry(key).or_default().push(shard);
        }

        // Shards are consumed in tier order everywhere
        for list in shards.values_mut() {
            list.sort_by_key(|s| s.shard_number);
        }

        Ok(Self {
            program_id,
            tokens,
            shards,
        })
    }

    /// Load a registry from a TOML file on disk.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouterError::Configuration(format!("read {path}: {e}")))?;
        Self::from_toml(&content)
    }

    /// Build a registry directly from runtime values (tests, embedded
    /// listings).
    pub fn from_parts(
        program_id: Pubkey,
        tokens: Vec<Token>,
        shard_lists: Vec<(TradingPair, Vec<PoolShard>)>,
    ) -> Self {
        let tokens = tokens.into_iter().map(|t| (t.symbol.clone(), t)).collect();
        let mut shards: HashMap<TradingPair, Vec<PoolShard>> = HashMap::new();
        for (pair, list) in shard_lists {
            let key = canonical_pair(&pair.token_a, &pair.token_b);
            let entry = shards.entry(key).or_default();
            entry.extend(list);
            entry.sort_by_key(|s| s.shard_number);
        }
        Self {
            program_id,
            tokens,
            shards,
        }
    }

    /// The on-chain pool program every shard instruction targets.
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    /// All shards of a pair, ordered by shard number. Empty when the
    /// pair is unknown.
    pub fn shards_for_pair(&self, pair: &TradingPair) -> &[PoolShard] {
        let key = canonical_pair(&pair.token_a, &pair.token_b);
        self.shards.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `address` is the pool address of one of the pair's shards.
    /// Used to cross-check remote routing responses.
    pub fn is_known_shard(&self, pair: &TradingPair, address: &Pubkey) -> bool {
        self.shards_for_pair(pair)
            .iter()
            .any(|s| s.pool_address == *address)
    }

    /// Resolve the input/output tokens of a pair given which symbol is
    /// the input.
    pub fn resolve_direction(&self, pair: &TradingPair, input_symbol: &str) -> Result<(Token, Token)> {
        let output_symbol = if input_symbol == pair.token_a {
            &pair.token_b
        } else if input_symbol == pair.token_b {
            &pair.token_a
        } else {
            return Err(RouterError::validation(format!(
                "input token {input_symbol} is not part of pair {}",
                pair.label()
            )));
        };

        let input = self
            .token(input_symbol)
            .ok_or_else(|| RouterError::PairNotFound(pair.label()))?;
        let output = self
            .token(output_symbol)
            .ok_or_else(|| RouterError::PairNotFound(pair.label()))?;
        Ok((input.clone(), output.clone()))
    }

    pub fn pairs(&self) -> impl Iterator<Item = &TradingPair> {
        self.shards.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_TOML: &str = r#"
        program = "SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8"

        [[tokens]]
        symbol = "SOL"
        mint = "So11111111111111111111111111111111111111112"
        decimals = 9

        [[tokens]]
        symbol = "USDC"
        mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        decimals = 6

        [[shards]]
        id = "sol-usdc-2"
        token_a = "SOL"
        token_b = "USDC"
        pool = "7XSvJnS19TodrQJSbjUR6tEGwmYyL1i9FX7Z5ZQHc53W"
        authority = "HfoTxFR1Tm6kGmWgYWD6J7YHVy1UwqSULUGVLXkJqaKN"
        token_a_account = "DVa7Qmb5ct9RCpaU7UTpSaf8GVEXPosqxLCGh4TKEKZC"
        token_b_account = "HLmqeL62xR1QoZ1HKKbXRrdN1p3phKpxRMb2VVopvBBz"
        lp_mint = "9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP"
        fee_account = "8HoQnePLqPj4M7PUDzfw8e3Ymdwgc7NUGuu1DvLdkRnG"
        shard_number = 2

        [[shards]]
        id = "sol-usdc-1"
        token_a = "SOL"
        token_b = "USDC"
        pool = "DRpbCBMxVnDK7maPM5tGv6MvB3v1sRMC86PZ8okm21hy"
        authority = "HfoTxFR1Tm6kGmWgYWD6J7YHVy1UwqSULUGVLXkJqaKN"
        token_a_account = "5omQJtDUHA3gMFdHEQg1zZSvcBUVzey5WaKWYRmqF1Vj"
        token_b_account = "6dM4TqWyWJsbx7obrdLcviBkTafD5E8av61zfU6jq57X"
        lp_mint = "3hsU1VgsBgBgz5jWiqdw9RfGU6TpWdCmdah1oi4kF3Tq"
        fee_account = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"
        shard_number = 1
    "#;

    #[test]
    fn loads_tokens_and_orders_shards_by_tier() {
        let registry = ShardRegistry::from_toml(REGISTRY_TOML).unwrap();
        assert_eq!(registry.token("SOL").unwrap().decimals, 9);
        assert_eq!(registry.token("USDC").unwrap().decimals, 6);

        let shards = registry.shards_for_pair(&TradingPair::new("SOL", "USDC"));
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].shard_number, 1);
        assert_eq!(shards[1].shard_number, 2);
    }

    #[test]
    fn pair_lookup_is_direction_independent() {
        let registry = ShardRegistry::from_toml(REGISTRY_TOML).unwrap();
        let forward = registry.shards_for_pair(&TradingPair::new("SOL", "USDC"));
        let reverse = registry.shards_for_pair(&TradingPair::new("USDC", "SOL"));
        assert_eq!(forward.len(), reverse.len());
    }

    #[test]
    fn known_shard_cross_check() {
        let registry = ShardRegistry::from_toml(REGISTRY_TOML).unwrap();
        let pair = TradingPair::new("SOL", "USDC");
        let shard = &registry.shards_for_pair(&pair)[0];
        assert!(registry.is_known_shard(&pair, &shard.pool_address));
        assert!(!registry.is_known_shard(&pair, &Pubkey::new_unique()));
    }

    #[test]
    fn resolve_direction_rejects_foreign_token() {
        let registry = ShardRegistry::from_toml(REGISTRY_TOML).unwrap();
        let pair = TradingPair::new("SOL", "USDC");

        let (input, output) = registry.resolve_direction(&pair, "USDC").unwrap();
        assert_eq!(input.symbol, "USDC");
        assert_eq!(output.symbol, "SOL");

        assert!(registry.resolve_direction(&pair, "BONK").is_err());
    }

    #[test]
    fn unknown_token_in_shard_is_a_config_error() {
        let bad = r#"
            program = "SwaPpA9LAaLfeLi3a68M4DjnLqgtticKg6CnyNwgAC8"

            [[shards]]
            id = "x"
            token_a = "SOL"
            token_b = "USDC"
            pool = "DRpbCBMxVnDK7maPM5tGv6MvB3v1sRMC86PZ8okm21hy"
            authority = "HfoTxFR1Tm6kGmWgYWD6J7YHVy1UwqSULUGVLXkJqaKN"
            token_a_account = "5omQJtDUHA3gMFdHEQg1zZSvcBUVzey5WaKWYRmqF1Vj"
            token_b_account = "6dM4TqWyWJsbx7obrdLcviBkTafD5E8av61zfU6jq57X"
            lp_mint = "3hsU1VgsBgBgz5jWiqdw9RfGU6TpWdCmdah1oi4kF3Tq"
            fee_account = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T"
            shard_number = 1
        "#;
        assert!(ShardRegistry::from_toml(bad).is_err());
    }
}
