//! Local shard routing engine
//!
//! Evaluates every shard of a pair with the constant-product math and
//! selects the best execution: maximum output, ties broken by lowest
//! price impact, then by lowest shard number (the most conservative
//! tier wins a dead heat). Reserves come either from live ledger reads
//! fanned out through the connection pool or from caller-supplied
//! snapshots.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::config::TradingConfig;
use crate::errors::{Result, RouterError};
use crate::registry::ShardRegistry;
use crate::router::math;
use crate::rpc_pool::{classify_client_error, ConnectionPool};
use crate::types::{PoolShard, Quote, RoutingMethod, TradingPair};

/// A single shard's evaluated outcome, before selection.
#[derive(Debug, Clone)]
struct ShardCandidate {
    shard: PoolShard,
    outcome: math::SwapOutcome,
}

pub struct RoutingEngine {
    registry: Arc<ShardRegistry>,
    pool: Arc<ConnectionPool>,
    config: TradingConfig,
}

impl RoutingEngine {
    pub fn new(registry: Arc<ShardRegistry>, pool: Arc<ConnectionPool>, config: TradingConfig) -> Self {
        Self {
            registry,
            pool,
            config,
        }
    }

    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    /// Quote a swap using live reserves read through the connection
    /// pool. Dropping the returned future cancels any in-flight reads.
    ///
    /// When every endpoint is down the engine degrades to the
    /// registry's last-known reserve snapshot rather than failing the
    /// quote outright; the snapshot's staleness is the caller's
    /// responsibility.
    pub async fn quote_local(
        &self,
        pair: &TradingPair,
        input_symbol: &str,
        amount_human: f64,
    ) -> Result<Quote> {
        match self.fetch_shard_reserves(pair).await {
            Ok(shards) => self.quote_local_with_reserves(pair, input_symbol, amount_human, &shards),
            Err(err @ RouterError::PairNotFound(_)) => Err(err),
            Err(err) if !err.is_retryable() && !matches!(err, RouterError::EndpointsExhausted { .. }) => {
                Err(err)
            }
            Err(err) => {
                warn!(
                    pair = %pair.label(),
                    error = %err,
                    "Live reserve reads failed; quoting from registry snapshot"
                );
                let snapshot: Vec<PoolShard> = self.registry.shards_for_pair(pair).to_vec();
                self.quote_local_with_reserves(pair, input_symbol, amount_human, &snapshot)
            }
        }
    }

    /// Quote a swap against caller-supplied reserve snapshots.
    /// Staleness of the snapshots is the caller's responsibility.
    pub fn quote_local_with_reserves(
        &self,
        pair: &TradingPair,
        input_symbol: &str,
        amount_human: f64,
        shards: &[PoolShard],
    ) -> Result<Quote> {
        let (input_token, output_token) = self.registry.resolve_direction(pair, input_symbol)?;
        let amount_in = input_token.to_base_units(amount_human);
        if amount_in == 0 {
            return Err(RouterError::validation(format!(
                "amount {amount_human} {input_symbol} is below one base unit"
            )));
        }

        if shards.is_empty() {
            return Err(RouterError::PairNotFound(pair.label()));
        }

        let mut best: Option<ShardCandidate> = None;
        for shard in shards {
            if !shard.has_liquidity() {
                debug!(shard = %shard.id, "Skipping zero-reserve shard");
                continue;
            }
            let (reserve_in, reserve_out) = match reserves_for_direction(shard, &input_token.mint) {
                Some(r) => r,
                None => {
                    debug!(shard = %shard.id, "Shard does not carry input mint, skipping");
                    continue;
                }
            };

            let outcome = math::swap_outcome(amount_in, reserve_in, reserve_out)?;
            debug!(
                shard = %shard.id,
                amount_out = outcome.amount_out,
                impact_bps = outcome.price_impact_bps,
                "Evaluated shard"
            );

            let candidate = ShardCandidate {
                shard: shard.clone(),
                outcome,
            };
            best = Some(match best.take() {
                None => candidate,
                Some(current) => pick_better(current, candidate),
            });
        }

        // Shards exist for the pair but every one was skipped: the pair
        // is configured yet drained, which is a liquidity problem, not
        // an unknown pair.
        let best = best.ok_or_else(|| RouterError::InsufficientLiquidity {
            pair: pair.label(),
            amount_in,
        })?;
        if best.outcome.amount_out == 0 {
            return Err(RouterError::InsufficientLiquidity {
                pair: pair.label(),
                amount_in,
            });
        }

        let exceeds_ceiling = best.outcome.price_impact_bps > self.config.max_price_impact_bps;
        if exceeds_ceiling {
            warn!(
                shard = %best.shard.id,
                impact_bps = best.outcome.price_impact_bps,
                ceiling_bps = self.config.max_price_impact_bps,
                "Best available quote exceeds price-impact ceiling"
            );
        }

        Ok(Quote {
            input_token,
            output_token,
            input_amount: amount_in,
            estimated_output: best.outcome.amount_out,
            price_impact_bps: best.outcome.price_impact_bps,
            selected_shard: best.shard,
            fee_base_units: best.outcome.fee,
            routing_method: RoutingMethod::Local,
            reason: None,
            exceeds_impact_ceiling: exceeds_ceiling,
        })
    }

    /// Read live reserves for every shard of the pair. Shard reads are
    /// independent, so they run concurrently bounded by the configured
    /// cap to avoid overwhelming a single endpoint.
    pub async fn fetch_shard_reserves(&self, pair: &TradingPair) -> Result<Vec<PoolShard>> {
        let shards = self.registry.shards_for_pair(pair);
        if shards.is_empty() {
            return Err(RouterError::PairNotFound(pair.label()));
        }

        let mut refreshed: Vec<PoolShard> = stream::iter(shards.iter().cloned())
            .map(|shard| async move {
                let (reserve_a, reserve_b) = futures::future::try_join(
                    self.read_token_balance(shard.token_a_account),
                    self.read_token_balance(shard.token_b_account),
                )
                .await?;
                let mut shard = shard;
                shard.reserve_a = reserve_a;
                shard.reserve_b = reserve_b;
                Ok::<_, RouterError>(shard)
            })
            .buffer_unordered(self.config.reserve_read_concurrency)
            .try_collect()
            .await?;

        refreshed.sort_by_key(|s| s.shard_number);
        Ok(refreshed)
    }

    async fn read_token_balance(&self, account: Pubkey) -> Result<u64> {
        self.pool
            .execute(|client| async move {
                let balance = client
                    .get_token_account_balance(&account)
                    .await
                    .map_err(|e| classify_client_error(&client.url(), e))?;
                balance
                    .amount
                    .parse::<u64>()
                    .map_err(|e| RouterError::Internal(format!("balance parse: {e}")))
            })
            .await
    }
}

/// Orient a shard's reserves around the input mint.
fn reserves_for_direction(shard: &PoolShard, input_mint: &Pubkey) -> Option<(u64, u64)> {
    if shard.token_a_mint == *input_mint {
        Some((shard.reserve_a, shard.reserve_b))
    } else if shard.token_b_mint == *input_mint {
        Some((shard.reserve_b, shard.reserve_a))
    } else {
        None
    }
}

/// Selection order: maximum output, then lowest price impact, then
/// lowest shard number.
fn pick_better(current: ShardCandidate, challenger: ShardCandidate) -> ShardCandidate {
    let cur = (
        current.outcome.amount_out,
        std::cmp::Reverse(current.outcome.price_impact_bps),
        std::cmp::Reverse(current.shard.shard_number),
    );
    let cha = (
        challenger.outcome.amount_out,
        std::cmp::Reverse(challenger.outcome.price_impact_bps),
        std::cmp::Reverse(challenger.shard.shard_number),
    );
    if cha > cur {
        challenger
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradingConfig;
    use crate::types::Token;
    use std::time::Duration;

    fn sol() -> Token {
        Token {
            mint: Pubkey::from_str_const("So11111111111111111111111111111111111111112"),
            symbol: "SOL".to_string(),
            decimals: 9,
        }
    }

    fn usdc() -> Token {
        Token {
            mint: Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    fn shard(number: u32, reserve_sol: u64, reserve_usdc: u64) -> PoolShard {
        PoolShard {
            id: format!("sol-usdc-{number}"),
            pool_address: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            token_a_mint: sol().mint,
            token_b_mint: usdc().mint,
            token_a_account: Pubkey::new_unique(),
            token_b_account: Pubkey::new_unique(),
            lp_mint: Pubkey::new_unique(),
            fee_account: Pubkey::new_unique(),
            shard_number: number,
            reserve_a: reserve_sol,
            reserve_b: reserve_usdc,
        }
    }

    fn engine_with(shards: Vec<PoolShard>) -> (RoutingEngine, TradingPair) {
        let pair = TradingPair::new("SOL", "USDC");
        let registry = Arc::new(ShardRegistry::from_parts(
            Pubkey::new_unique(),
            vec![sol(), usdc()],
            vec![(pair.clone(), shards)],
        ));
        let pool = Arc::new(
            ConnectionPool::with_endpoints(
                vec!["http://localhost:8899".to_string()],
                3,
                Duration::from_secs(30),
                3,
            )
            .unwrap(),
        );
        (
            RoutingEngine::new(registry, pool, TradingConfig::default()),
            pair,
        )
    }

    #[test]
    fn quote_matches_constant_product_oracle() {
        // USDC side in: reserves oriented (usdc, sol)
        let shards = vec![shard(1, 4_000_000_000_000, 400_000_000_000)];
        let (engine, pair) = engine_with(shards.clone());

        let quote = engine
            .quote_local_with_reserves(&pair, "USDC", 100.0, &shards)
            .unwrap();

        assert_eq!(quote.input_amount, 100_000_000);
        assert_eq!(quote.estimated_output, 996_751_559);
        assert_eq!(quote.fee_base_units, 300_000);
        assert_eq!(quote.price_impact_bps, 32);
        assert_eq!(quote.routing_method, RoutingMethod::Local);
        assert!(!quote.exceeds_impact_ceiling);
        assert!(quote.is_executable());
    }

    #[test]
    fn selects_largest_shard_when_output_differs() {
        let shards = vec![
            shard(1, 1_000_000_000, 1_000_000_000),
            shard(2, 10_000_000_000, 10_000_000_000),
            shard(3, 100_000_000_000, 100_000_000_000),
        ];
        let (engine, pair) = engine_with(shards.clone());

        // Large enough that floor division separates the shards
        let quote = engine
            .quote_local_with_reserves(&pair, "USDC", 10.0, &shards)
            .unwrap();
        assert_eq!(quote.selected_shard.shard_number, 3);
    }

    #[test]
    fn dead_heat_routes_to_lowest_shard_number() {
        // Proportionally scaled reserves and a small input: every shard
        // floors to the same output and the same displayed impact, so
        // the most conservative tier wins.
        let shards = vec![
            shard(1, 1_000_000_000, 1_000_000_000),
            shard(2, 10_000_000_000, 10_000_000_000),
            shard(3, 100_000_000_000, 100_000_000_000),
            shard(4, 1_000_000_000_000, 1_000_000_000_000),
        ];
        let (engine, pair) = engine_with(shards.clone());

        let quote = engine
            .quote_local_with_reserves(&pair, "USDC", 0.01, &shards)
            .unwrap();
        assert_eq!(quote.input_amount, 10_000);
        assert_eq!(quote.selected_shard.shard_number, 1);
    }

    #[test]
    fn zero_reserve_shards_are_never_selected() {
        let shards = vec![shard(1, 0, 1_000_000_000), shard(2, 1_000_000_000, 1_000_000_000)];
        let (engine, pair) = engine_with(shards.clone());

        let quote = engine
            .quote_local_with_reserves(&pair, "SOL", 0.5, &shards)
            .unwrap();
        assert_eq!(quote.selected_shard.shard_number, 2);
    }

    #[test]
    fn unknown_pair_fails_with_pair_not_found() {
        let (engine, _) = engine_with(vec![shard(1, 1_000, 1_000)]);
        let missing = TradingPair::new("SOL", "BONK");
        let err = engine
            .quote_local_with_reserves(&missing, "SOL", 1.0, &[])
            .unwrap_err();
        assert!(matches!(err, RouterError::Validation(_) | RouterError::PairNotFound(_)));
    }

    #[test]
    fn fully_drained_pair_fails_with_insufficient_liquidity() {
        // The pair is configured, so this must not look like an unknown
        // pair: every shard merely has empty reserves
        let shards = vec![shard(1, 0, 0), shard(2, 0, 0)];
        let (engine, pair) = engine_with(shards.clone());

        let err = engine
            .quote_local_with_reserves(&pair, "USDC", 100.0, &shards)
            .unwrap_err();
        assert!(matches!(err, RouterError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn exhausted_reserves_fail_with_insufficient_liquidity() {
        // Reserves so small the fee eats the output entirely
        let shards = vec![shard(1, 1, 1)];
        let (engine, pair) = engine_with(shards.clone());

        let err = engine
            .quote_local_with_reserves(&pair, "SOL", 0.00000001, &shards)
            .unwrap_err();
        assert!(matches!(err, RouterError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn high_impact_quote_is_marked_not_rejected() {
        // Trade comparable to the whole pool: massive impact
        let shards = vec![shard(1, 1_000_000_000, 1_000_000_000)];
        let (engine, pair) = engine_with(shards.clone());

        let quote = engine
            .quote_local_with_reserves(&pair, "SOL", 10.0, &shards)
            .unwrap();
        assert!(quote.exceeds_impact_ceiling);
        assert!(quote.estimated_output > 0);
    }

    #[test]
    fn reverse_direction_orients_reserves() {
        let shards = vec![shard(1, 4_000_000_000_000, 400_000_000_000)];
        let (engine, pair) = engine_with(shards.clone());

        let sol_in = engine
            .quote_local_with_reserves(&pair, "SOL", 1.0, &shards)
            .unwrap();
        let usdc_in = engine
            .quote_local_with_reserves(&pair, "USDC", 100.0, &shards)
            .unwrap();

        assert_eq!(sol_in.input_token.symbol, "SOL");
        assert_eq!(sol_in.output_token.symbol, "USDC");
        assert_eq!(usdc_in.input_token.symbol, "USDC");
        assert_eq!(usdc_in.output_token.symbol, "SOL");
        // 1 SOL into a 10 USDC/SOL pool: roughly 99.7 USDC before slippage
        assert!(sol_in.estimated_output > 99_000_000 && sol_in.estimated_output < 99_700_000);
    }
}
