//! Remote routing service client
//!
//! Queries the backend routing service for a globally-optimal shard.
//! One POST per quote, hard client-side timeout, no internal retries:
//! any failure (transport, timeout, bad status, malformed payload,
//! unknown shard) is returned as a typed error and the caller falls
//! back to the local engine.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::config::{RouterConfig, TradingConfig};
use crate::errors::{Result, RouterError};
use crate::registry::ShardRegistry;
use crate::router::math;
use crate::types::{Quote, RoutingMethod, TradingPair};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteRequest {
    token_a: String,
    token_b: String,
    input_token: String,
    /// Base-unit integer as a string; the service uses arbitrary
    /// precision on its side
    input_amount: String,
    trader: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteResponse {
    success: bool,
    #[serde(default)]
    data: Option<RouteData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteData {
    shard: RemoteShard,
    expected_output: String,
    /// Decimal fraction, e.g. 0.0032 for 32 bps
    price_impact: f64,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteShard {
    id: String,
    address: String,
}

pub struct RemoteRouterClient {
    http: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
    max_price_impact_bps: u32,
    registry: Arc<ShardRegistry>,
}

impl RemoteRouterClient {
    pub fn new(
        config: &RouterConfig,
        trading: &TradingConfig,
        registry: Arc<ShardRegistry>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RouterError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
            max_price_impact_bps: trading.max_price_impact_bps,
            registry,
        })
    }

    /// Ask the routing service for the best shard of `pair` for the
    /// given input. Never retries; the caller treats any error as
    /// "fall back to local".
    pub async fn quote_remote(
        &self,
        pair: &TradingPair,
        input_symbol: &str,
        amount_human: f64,
        trader: &Pubkey,
    ) -> Result<Quote> {
        let (input_token, output_token) = self.registry.resolve_direction(pair, input_symbol)?;
        let amount_in = input_token.to_base_units(amount_human);
        if amount_in == 0 {
            return Err(RouterError::validation(format!(
                "amount {amount_human} {input_symbol} is below one base unit"
            )));
        }

        let request = RouteRequest {
            token_a: input_token.mint.to_string(),
            token_b: output_token.mint.to_string(),
            input_token: input_token.mint.to_string(),
            input_amount: amount_in.to_string(),
            trader: trader.to_string(),
        };

        let url = format!("{}/api/route", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RouterError::Api(format!("{url} returned {status}")));
        }

        let raw = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(&url, e))?;
        let body: RouteResponse = serde_json::from_str(&raw)
            .map_err(|e| RouterError::validation(format!("malformed routing response: {e}")))?;

        if !body.success {
            return Err(RouterError::Api(
                body.error.unwrap_or_else(|| "routing service reported failure".to_string()),
            ));
        }
        let data = body
            .data
            .ok_or_else(|| RouterError::validation("success response missing data"))?;

        let shard_address = Pubkey::from_str(&data.shard.address)
            .map_err(|e| RouterError::validation(format!("shard address: {e}")))?;

        // The recommended shard must be one we know locally; anything
        // else means registry drift and cannot be executed safely.
        if !self.registry.is_known_shard(pair, &shard_address) {
            return Err(RouterError::validation("shard mismatch"));
        }
        let shard = self
            .registry
            .shards_for_pair(pair)
            .iter()
            .find(|s| s.pool_address == shard_address)
            .cloned()
            .ok_or_else(|| RouterError::validation("shard mismatch"))?;

        let estimated_output = data
            .expected_output
            .parse::<u64>()
            .map_err(|e| RouterError::validation(format!("expectedOutput: {e}")))?;
        if estimated_output == 0 {
            return Err(RouterError::validation("remote quote has zero output"));
        }

        let price_impact_bps = (data.price_impact * 10_000.0).clamp(0.0, 10_000.0) as u32;
        let exceeds_impact_ceiling = price_impact_bps > self.max_price_impact_bps;
        if exceeds_impact_ceiling {
            warn!(
                shard = %data.shard.id,
                impact_bps = price_impact_bps,
                ceiling_bps = self.max_price_impact_bps,
                "Remote quote exceeds price-impact ceiling"
            );
        }
        debug!(
            shard = %shard.id,
            expected_output = estimated_output,
            impact_bps = price_impact_bps,
            "Remote route accepted"
        );

        Ok(Quote {
            fee_base_units: amount_in - math::effective_input(amount_in),
            input_token,
            output_token,
            input_amount: amount_in,
            estimated_output,
            price_impact_bps,
            selected_shard: shard,
            routing_method: RoutingMethod::Remote,
            reason: data.reason,
            exceeds_impact_ceiling,
        })
    }

    /// Probe the routing service. Never errors; any failure is simply
    /// "unavailable".
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn map_transport_error(&self, url: &str, err: reqwest::Error) -> RouterError {
        if err.is_timeout() {
            RouterError::timeout(format!("POST {url}"), self.timeout_ms)
        } else {
            RouterError::Network(format!("{url}: {err}"))
        }
    }
}
