//! RPC connection pooling with health tracking and failover
//!
//! The pool owns one nonblocking `RpcClient` per configured endpoint and
//! rotates round-robin across the currently-healthy subset. Endpoint
//! health is the only mutable shared state in the crate:
//! - an endpoint is demoted after `failure_threshold` consecutive
//!   failures, or immediately on a rate-limit signal;
//! - it recovers automatically once `recovery_window` has elapsed since
//!   its last failure, checked lazily at the next selection;
//! - when every endpoint is unhealthy, the one with the oldest failure
//!   is force-recovered so calls always make forward progress.
//!
//! `execute` is a generic call-site failover wrapper: it knows nothing
//! about the wrapped operation and is used for reads (reserves,
//! balances, blockhash) and writes (submit transaction) alike.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use solana_client::nonblocking::rpc_client::RpcClient;
use tracing::{debug, info, warn};

use crate::config::RpcConfig;
use crate::errors::{Result, RouterError};

/// Mutable health state of one endpoint, guarded by a mutex since
/// concurrent in-flight operations may report results simultaneously.
#[derive(Debug)]
struct EndpointState {
    healthy: bool,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
}

/// One RPC endpoint with its client and health bookkeeping. Endpoints
/// are created at pool construction and live for the process lifetime;
/// they are only ever toggled healthy/unhealthy.
pub struct TrackedEndpoint {
    url: String,
    client: Arc<RpcClient>,
    state: Mutex<EndpointState>,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
}

impl std::fmt::Debug for TrackedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedEndpoint")
            .field("url", &self.url)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl TrackedEndpoint {
    fn new(url: String) -> Self {
        Self {
            client: Arc::new(RpcClient::new(url.clone())),
            url,
            state: Mutex::new(EndpointState {
                healthy: true,
                consecutive_failures: 0,
                last_failure_at: None,
                last_success_at: None,
            }),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn is_healthy(&self) -> bool {
        self.state.lock().healthy
    }

    fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.last_success_at = Some(Instant::now());
        if !state.healthy {
            state.healthy = true;
            info!(url = %self.url, "Endpoint recovered after successful request");
        }
    }

    /// Record a failed request. `rate_limited` bypasses the failure-count
    /// threshold and demotes immediately.
    fn record_failure(&self, threshold: u32, rate_limited: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        state.last_failure_at = Some(Instant::now());

        let demote = rate_limited || state.consecutive_failures >= threshold;
        if demote && state.healthy {
            state.healthy = false;
            warn!(
                url = %self.url,
                consecutive_failures = state.consecutive_failures,
                rate_limited = rate_limited,
                "Endpoint marked unhealthy"
            );
        }
    }

    /// Lazily promote an unhealthy endpoint back once the recovery
    /// window has elapsed since its last failure.
    fn maybe_recover(&self, recovery_window: Duration) -> bool {
        let mut state = self.state.lock();
        if state.healthy {
            return true;
        }
        let recovered = state
            .last_failure_at
            .map(|at| at.elapsed() > recovery_window)
            .unwrap_or(true);
        if recovered {
            state.healthy = true;
            state.consecutive_failures = 0;
            info!(url = %self.url, "Endpoint recovery window elapsed, marking healthy");
        }
        recovered
    }

    fn force_recover(&self) {
        let mut state = self.state.lock();
        state.healthy = true;
        state.consecutive_failures = 0;
    }

    fn last_failure_at(&self) -> Option<Instant> {
        self.state.lock().last_failure_at
    }

    fn snapshot(&self) -> EndpointSnapshot {
        let state = self.state.lock();
        EndpointSnapshot {
            url: self.url.clone(),
            healthy: state.healthy,
            consecutive_failures: state.consecutive_failures,
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of an endpoint, for logging and the CLI.
#[derive(Debug, Clone)]
pub struct EndpointSnapshot {
    pub url: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
}

/// Point-in-time view of the whole pool.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub endpoints: Vec<EndpointSnapshot>,
}

/// Pool of RPC endpoints with round-robin selection and retrying
/// failover execution. Constructed once at the composition root and
/// injected wherever ledger I/O is needed.
pub struct ConnectionPool {
    endpoints: Vec<Arc<TrackedEndpoint>>,
    cursor: AtomicUsize,
    failure_threshold: u32,
    recovery_window: Duration,
    max_retries: u32,
}

impl ConnectionPool {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        Self::with_endpoints(
            config.endpoints.clone(),
            config.failure_threshold,
            Duration::from_secs(config.recovery_window_secs),
            config.max_retries,
        )
    }

    pub fn with_endpoints(
        urls: Vec<String>,
        failure_threshold: u32,
        recovery_window: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        if urls.is_empty() {
            return Err(RouterError::Configuration(
                "connection pool requires at least one endpoint".to_string(),
            ));
        }
        Ok(Self {
            endpoints: urls.into_iter().map(|u| Arc::new(TrackedEndpoint::new(u))).collect(),
            cursor: AtomicUsize::new(0),
            failure_threshold,
            recovery_window,
            max_retries,
        })
    }

    /// Select the next endpoint round-robin over the healthy subset,
    /// skipping `exclude` (the endpoint that just failed) when another
    /// choice exists. Guarantees forward progress: with zero healthy
    /// endpoints the one with the oldest failure is force-recovered.
    fn select_endpoint(&self, exclude: Option<usize>) -> (usize, Arc<TrackedEndpoint>) {
        let n = self.endpoints.len();
        for _ in 0..n {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
            if Some(idx) == exclude && n > 1 {
                continue;
            }
            let endpoint = &self.endpoints[idx];
            if endpoint.maybe_recover(self.recovery_window) {
                debug!(url = %endpoint.url, index = idx, "Selected RPC endpoint");
                return (idx, endpoint.clone());
            }
        }

        // Nothing healthy: revive whichever endpoint failed longest ago
        let (idx, endpoint) = self
            .endpoints
            .iter()
            .enumerate()
            .max_by_key(|(_, ep)| {
                ep.last_failure_at()
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX)
            })
            .map(|(i, ep)| (i, ep.clone()))
            .unwrap_or((0, self.endpoints[0].clone()));
        endpoint.force_recover();
        warn!(url = %endpoint.url, "No healthy endpoints; force-recovering oldest failure");
        (idx, endpoint)
    }

    /// Run `op` against the pool with failover.
    ///
    /// Each attempt goes to a different endpoint than the previous one,
    /// preceded by an increasing backoff delay. Non-retryable errors
    /// (validation, bad input) propagate immediately without counting
    /// against any endpoint.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.execute_with_retries(op, self.max_retries).await
    }

    pub async fn execute_with_retries<T, F, Fut>(&self, op: F, max_retries: u32) -> Result<T>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;
        let mut previous_idx = None;

        for attempt in 0..max_retries.max(1) {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }

            let (idx, endpoint) = self.select_endpoint(previous_idx);
            previous_idx = Some(idx);

            match op(endpoint.client.clone()).await {
                Ok(value) => {
                    endpoint.record_success();
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    let rate_limited = matches!(err, RouterError::RateLimited { .. });
                    endpoint.record_failure(self.failure_threshold, rate_limited);
                    warn!(
                        url = %endpoint.url,
                        attempt = attempt + 1,
                        category = err.category(),
                        error = %err,
                        "RPC attempt failed, rotating endpoint"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(RouterError::EndpointsExhausted {
            attempts: max_retries.max(1),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    pub fn stats(&self) -> PoolStats {
        let endpoints: Vec<_> = self.endpoints.iter().map(|ep| ep.snapshot()).collect();
        PoolStats {
            total_endpoints: endpoints.len(),
            healthy_endpoints: endpoints.iter().filter(|e| e.healthy).count(),
            endpoints,
        }
    }

    #[cfg(test)]
    pub(crate) fn endpoint(&self, idx: usize) -> &TrackedEndpoint {
        &self.endpoints[idx]
    }
}

/// Map a Solana client error to the pool's taxonomy, distinguishing the
/// rate-limit signal that triggers immediate demotion.
pub fn classify_client_error(endpoint: &str, err: solana_client::client_error::ClientError) -> RouterError {
    let message = err.to_string();
    if message.contains("429") || message.contains("Too Many Requests") {
        RouterError::RateLimited {
            endpoint: endpoint.to_string(),
        }
    } else {
        RouterError::Network(format!("{endpoint}: {message}"))
    }
}
