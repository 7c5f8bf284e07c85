use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bitcoin::Txid;
use futures::future::try_join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header;
use tracing::{debug, trace, warn};

use crate::error::{CoreError, RpcError};
use crate::types::RawTransaction;

use super::super::types::ChainInfo;
use super::super::BitcoinRpc;
use super::connection::{parse_endpoint, resolve_auth};
use super::parsing::{parse_raw_transaction, parse_txid_list};
use super::protocol::{parse_batch_id, JsonRpcRequest, JsonRpcResponse};
use super::retry::{retry_transient, RetryPolicy};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Everything needed to build an [`HttpRpcClient`].
#[derive(Clone)]
pub struct RpcClientConfig {
    /// `http(s)://[user:pass@]host:port[/path]`
    pub url: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub cookie_file: Option<PathBuf>,
    /// Outbound HTTP requests per second; a batch counts as one request.
    pub requests_per_second: Option<u32>,
    /// Maximum calls per JSON-RPC batch payload.
    pub batch_chunk_size: usize,
    /// Per-request timeout. A timed-out call is reported as
    /// [`RpcError::Timeout`].
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl RpcClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            pass: None,
            cookie_file: None,
            requests_per_second: None,
            batch_chunk_size: 50,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Bitcoin JSON-RPC client over HTTP(S).
///
/// Talks to a node with an address index (`getaddresstxids`) and a
/// transaction index (`getrawtransaction` for confirmed transactions).
/// Supports single and batched calls, optional rate limiting, and retries
/// transient failures according to its [`RetryPolicy`].
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    batch_chunk_size: usize,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self, CoreError> {
        if config.batch_chunk_size == 0 {
            return Err(CoreError::Config(
                "rpc batch chunk size must be at least 1".to_owned(),
            ));
        }
        if config.retry.max_attempts == 0 {
            return Err(CoreError::Config(
                "rpc retry attempts must be at least 1".to_owned(),
            ));
        }

        let endpoint = parse_endpoint(&config.url)?;
        let auth = resolve_auth(
            config.user.as_deref(),
            config.pass.as_deref(),
            endpoint.url_auth,
            config.cookie_file.as_deref(),
        )?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10).min(config.timeout))
            .timeout(config.timeout)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CoreError::Config(format!("build HTTP client: {e}")))?;

        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::Config("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url: endpoint.url,
            auth,
            limiter,
            batch_chunk_size: config.batch_chunk_size,
            retry: config.retry,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    /// Atomically reserve `count` consecutive request IDs for batch calls.
    fn reserve_request_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        retry_transient(&self.retry, what, op).await
    }

    async fn post_json<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<String, CoreError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::from)?;
        let status = response.status();
        let text = response.text().await.map_err(RpcError::from)?;

        // Bitcoin Core answers RPC errors with HTTP 500 and a JSON body, but
        // auth failures and proxy errors come back with an empty body.
        if text.trim().is_empty() && !status.is_success() {
            return Err(RpcError::InvalidResponse(format!("HTTP {status} with empty body")).into());
        }
        Ok(text)
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, CoreError> {
        self.with_retry(method, || self.rpc_call_once(method, &params))
            .await
    }

    async fn rpc_call_once(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<serde_json::Value, CoreError> {
        self.wait_for_rate_limit().await;
        let id = self.reserve_request_ids(1);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let body = self.post_json(&req).await?;
        debug!(rpc.id = id, rpc.method = method, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;
        decoded.into_result()
    }

    async fn rpc_batch(
        &self,
        calls: &[(&'static str, Vec<serde_json::Value>)],
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        self.with_retry("batch", || self.rpc_batch_once(calls)).await
    }

    async fn rpc_batch_once(
        &self,
        calls: &[(&'static str, Vec<serde_json::Value>)],
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        self.wait_for_rate_limit().await;
        let start_id = self.reserve_request_ids(calls.len() as u64);
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            "rpc batch call"
        );
        let requests: Vec<JsonRpcRequest<'_>> = calls
            .iter()
            .enumerate()
            .map(|(offset, (method, params))| JsonRpcRequest {
                jsonrpc: "2.0",
                id: start_id + offset as u64,
                method: *method,
                params: params.as_slice(),
            })
            .collect();

        let body = self.post_json(&requests).await?;
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            body_len = body.len(),
            "rpc batch response"
        );
        trace!(rpc.batch_start_id = start_id, body = %body, "rpc batch response body");

        let decoded: Vec<JsonRpcResponse> = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC batch response: {e}; body={body}"))
        })?;

        let mut by_id: HashMap<u64, JsonRpcResponse> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            let id = parse_batch_id(&item.id)?;
            by_id.insert(id, item);
        }

        (start_id..start_id + calls.len() as u64)
            .map(|id| {
                by_id
                    .remove(&id)
                    .ok_or(RpcError::MissingBatchItem { id })?
                    .into_result()
            })
            .collect()
    }

    async fn rpc_batch_chunked(
        &self,
        calls: &[(&'static str, Vec<serde_json::Value>)],
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        // Chunks keep payloads under node/proxy limits and are issued
        // concurrently; the rate limiter still applies per chunk.
        let chunk_futures: Vec<_> = calls
            .chunks(self.batch_chunk_size)
            .map(|chunk| self.rpc_batch(chunk))
            .collect();
        let chunked = try_join_all(chunk_futures).await?;
        Ok(chunked.into_iter().flatten().collect())
    }
}

#[async_trait]
impl BitcoinRpc for HttpRpcClient {
    async fn list_transaction_ids(&self, address: &str) -> Result<Vec<Txid>, CoreError> {
        let raw = self
            .rpc_call(
                "getaddresstxids",
                vec![serde_json::json!({ "addresses": [address] })],
            )
            .await?;
        parse_txid_list(&raw)
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<RawTransaction, CoreError> {
        let raw = self
            .rpc_call(
                "getrawtransaction",
                vec![serde_json::json!(txid.to_string()), serde_json::json!(1)],
            )
            .await
            .map_err(|err| normalize_getrawtransaction_error(txid, err))?;
        parse_raw_transaction(&raw)
    }

    async fn get_transactions(&self, txids: &[Txid]) -> Result<Vec<RawTransaction>, CoreError> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }

        let calls: Vec<(&'static str, Vec<serde_json::Value>)> = txids
            .iter()
            .map(|txid| {
                (
                    "getrawtransaction",
                    vec![serde_json::json!(txid.to_string()), serde_json::json!(1)],
                )
            })
            .collect();

        match self.rpc_batch_chunked(&calls).await {
            Ok(raw_results) => raw_results.iter().map(parse_raw_transaction).collect(),
            Err(batch_error) if !falls_back_to_sequential(&batch_error) => Err(batch_error),
            Err(batch_error) => {
                // Some proxies reject batches outright, and one bad txid fails
                // the whole batch; retrying one by one pins the error to a txid.
                warn!(
                    tx_count = txids.len(),
                    error = %batch_error,
                    "batch getrawtransaction failed; falling back to sequential requests"
                );
                let mut sequential = Vec::with_capacity(txids.len());
                for txid in txids {
                    sequential.push(self.get_transaction(txid).await?);
                }
                Ok(sequential)
            }
        }
    }

    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        let raw = self.rpc_call("getblockchaininfo", Vec::new()).await?;
        serde_json::from_value(raw).map_err(|e| {
            RpcError::InvalidResponse(format!("invalid getblockchaininfo result: {e}")).into()
        })
    }
}

/// A batch that failed on transport or timeout already spent its retries
/// against the same node; repeating every txid one by one would not help.
fn falls_back_to_sequential(batch_error: &CoreError) -> bool {
    !batch_error.is_transient()
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// ==============================================================================
// RPC Error Normalization
// ==============================================================================

/// Convert the node's "missing tx" JSON-RPC response into `TxNotFound`,
/// preserving every other failure as-is.
fn normalize_getrawtransaction_error(txid: &Txid, err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { code, message })
            if is_tx_not_found_server_error(code, &message) =>
        {
            CoreError::TxNotFound(*txid)
        }
        other => other,
    }
}

fn is_tx_not_found_server_error(code: i64, message: &str) -> bool {
    if code != -5 {
        return false;
    }

    let msg = message.to_ascii_lowercase();
    msg.contains("not found") || msg.contains("no such mempool or blockchain transaction")
}
