//! Transaction assembly and submission orchestration
//!
//! The builder ties the quoting paths together and turns a quote into a
//! complete, fee-payer-set, blockhash-stamped unsigned transaction.
//! Signing is an external boundary: the caller takes the unsigned
//! transaction to the user's wallet and hands the signed bytes back for
//! submission.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, TransactionError};
use spl_associated_token_account::get_associated_token_address;
use tracing::{info, warn};

use crate::errors::{Result, RouterError};
use crate::registry::ShardRegistry;
use crate::router::engine::RoutingEngine;
use crate::router::math;
use crate::router::remote::RemoteRouterClient;
use crate::rpc_pool::{classify_client_error, ConnectionPool};
use crate::tx::encoder::{
    self, LiquidityAccounts, SwapAccounts,
};
use crate::types::{PoolShard, Quote, TradingPair};

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(400);
const CONFIRM_MAX_POLLS: u32 = 30;

pub struct ExecutionBuilder {
    pool: Arc<ConnectionPool>,
    registry: Arc<ShardRegistry>,
    engine: RoutingEngine,
    remote: Option<RemoteRouterClient>,
}

impl ExecutionBuilder {
    pub fn new(
        pool: Arc<ConnectionPool>,
        registry: Arc<ShardRegistry>,
        engine: RoutingEngine,
        remote: Option<RemoteRouterClient>,
    ) -> Self {
        Self {
            pool,
            registry,
            engine,
            remote,
        }
    }

    pub fn engine(&self) -> &RoutingEngine {
        &self.engine
    }

    /// Obtain the best quote for a swap: remote routing first, local
    /// engine on any remote failure. The fallback is a designed path,
    /// logged but never surfaced to the caller as an error by itself.
    pub async fn get_quote(
        &self,
        pair: &TradingPair,
        input_symbol: &str,
        amount_human: f64,
        trader: &Pubkey,
    ) -> Result<Quote> {
        if let Some(remote) = &self.remote {
            match remote.quote_remote(pair, input_symbol, amount_human, trader).await {
                Ok(quote) => {
                    info!(
                        pair = %pair.label(),
                        shard = %quote.selected_shard.id,
                        method = quote.routing_method.as_str(),
                        "Quote obtained from remote router"
                    );
                    return Ok(quote);
                }
                Err(err) => {
                    warn!(
                        pair = %pair.label(),
                        category = err.category(),
                        error = %err,
                        "Remote routing failed; falling back to local engine"
                    );
                }
            }
        }
        self.engine.quote_local(pair, input_symbol, amount_human).await
    }

    /// Build an unsigned swap transaction from a quote, with the
    /// slippage tolerance folded into the minimum output amount.
    pub async fn build_swap_transaction(
        &self,
        quote: &Quote,
        slippage_bps: u32,
        user: &Pubkey,
    ) -> Result<Transaction> {
        let blockhash = self.latest_blockhash().await?;
        self.swap_transaction_with_blockhash(quote, slippage_bps, user, blockhash)
    }

    /// Pure assembly half of `build_swap_transaction`; the blockhash is
    /// supplied by the caller.
    pub fn swap_transaction_with_blockhash(
        &self,
        quote: &Quote,
        slippage_bps: u32,
        user: &Pubkey,
        blockhash: Hash,
    ) -> Result<Transaction> {
        if !quote.is_executable() {
            return Err(RouterError::validation(
                "quote has zero estimated output and must not be executed",
            ));
        }

        let shard = &quote.selected_shard;
        let min_amount_out = math::apply_slippage(quote.estimated_output, slippage_bps)?;

        let accounts = SwapAccounts {
            user: *user,
            user_input_account: get_associated_token_address(user, &quote.input_token.mint),
            user_output_account: get_associated_token_address(user, &quote.output_token.mint),
            input_is_token_a: quote.input_token.mint == shard.token_a_mint,
        };

        let ix = encoder::encode_swap(
            self.registry.program_id(),
            shard,
            &accounts,
            quote.input_amount,
            min_amount_out,
        )?;

        let message = Message::new_with_blockhash(&[ix], Some(user), &blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    /// Build an unsigned add-liquidity transaction for one shard.
    pub async fn build_add_liquidity_transaction(
        &self,
        shard: &PoolShard,
        desired_lp_amount: u64,
        max_token_a: u64,
        max_token_b: u64,
        user: &Pubkey,
    ) -> Result<Transaction> {
        let accounts = self.liquidity_accounts(shard, user);
        let ix = encoder::encode_add_liquidity(
            self.registry.program_id(),
            shard,
            &accounts,
            desired_lp_amount,
            max_token_a,
            max_token_b,
        )?;
        let blockhash = self.latest_blockhash().await?;
        let message = Message::new_with_blockhash(&[ix], Some(user), &blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    /// Build an unsigned remove-liquidity transaction for one shard.
    /// Zero minimums mean "no slippage protection".
    pub async fn build_remove_liquidity_transaction(
        &self,
        shard: &PoolShard,
        lp_amount_to_burn: u64,
        min_token_a: u64,
        min_token_b: u64,
        user: &Pubkey,
    ) -> Result<Transaction> {
        let accounts = self.liquidity_accounts(shard, user);
        let ix = encoder::encode_remove_liquidity(
            self.registry.program_id(),
            shard,
            &accounts,
            lp_amount_to_burn,
            min_token_a,
            min_token_b,
        )?;
        let blockhash = self.latest_blockhash().await?;
        let message = Message::new_with_blockhash(&[ix], Some(user), &blockhash);
        Ok(Transaction::new_unsigned(message))
    }

    fn liquidity_accounts(&self, shard: &PoolShard, user: &Pubkey) -> LiquidityAccounts {
        LiquidityAccounts {
            user: *user,
            user_token_a_account: get_associated_token_address(user, &shard.token_a_mint),
            user_token_b_account: get_associated_token_address(user, &shard.token_b_mint),
            user_lp_account: get_associated_token_address(user, &shard.lp_mint),
        }
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        self.pool
            .execute(|client| async move {
                client
                    .get_latest_blockhash()
                    .await
                    .map_err(|e| classify_client_error(&client.url(), e))
            })
            .await
    }

    /// Submit a signed transaction through the pool and poll until the
    /// ledger confirms the signature.
    pub async fn submit_and_confirm(&self, transaction: &Transaction) -> Result<Signature> {
        let signature = self
            .pool
            .execute(|client| {
                let tx = transaction.clone();
                async move {
                    client
                        .send_transaction(&tx)
                        .await
                        .map_err(|e| classify_client_error(&client.url(), e))
                }
            })
            .await?;

        info!(signature = %signature, "Transaction submitted, awaiting confirmation");

        await_confirmation(signature, || {
            self.pool.execute(|client| async move {
                client
                    .get_signature_status(&signature)
                    .await
                    .map_err(|e| classify_client_error(&client.url(), e))
            })
        })
        .await
    }
}

/// Poll `poll_status` until the signature lands, the ledger reports a
/// failure, or the poll budget runs out.
async fn await_confirmation<F, Fut>(signature: Signature, poll_status: F) -> Result<Signature>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<std::result::Result<(), TransactionError>>>>,
{
    for _ in 0..CONFIRM_MAX_POLLS {
        tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        match poll_status().await? {
            Some(Ok(())) => {
                info!(signature = %signature, "Transaction confirmed");
                return Ok(signature);
            }
            Some(Err(err)) => {
                return Err(RouterError::TransactionFailed(format!("{signature}: {err}")));
            }
            None => continue,
        }
    }

    Err(RouterError::TransactionFailed(format!(
        "{signature}: not confirmed after {CONFIRM_MAX_POLLS} polls"
    )))
}
