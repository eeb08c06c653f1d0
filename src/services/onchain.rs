use async_trait::async_trait;
use ethers::abi::Token;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};

use crate::{
    config::Config,
    constants::{RPC_BREAKER_BASE_SECS, RPC_BREAKER_MAX_SECS, RPC_BREAKER_THRESHOLD},
    contracts::ContractCallSpec,
    error::{AppError, Result},
};

/// A fully built transaction, handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Read/write access to contracts. The wallet signs writes; this side never
/// holds keys.
#[async_trait]
pub trait ContractTransport: Send + Sync {
    async fn call_read(&self, spec: &ContractCallSpec, caller: Address) -> Result<Vec<Token>>;

    async fn submit_write(&self, request: WriteRequest) -> Result<TxHash>;

    async fn native_balance(&self, address: Address) -> Result<U256>;
}

pub struct EthersTransport {
    reader: Provider<Http>,
    signer: Provider<Http>,
    gate: RpcGate,
}

impl EthersTransport {
    pub fn from_config(config: &Config) -> Result<Self> {
        let reader = Provider::<Http>::try_from(config.ethereum_rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid ETHEREUM_RPC_URL: {}", e)))?;
        let signer = Provider::<Http>::try_from(config.wallet_rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid WALLET_RPC_URL: {}", e)))?;
        Ok(Self {
            reader,
            signer,
            gate: RpcGate::new(config.rpc_max_inflight),
        })
    }
}

#[async_trait]
impl ContractTransport for EthersTransport {
    async fn call_read(&self, spec: &ContractCallSpec, caller: Address) -> Result<Vec<Token>> {
        let method = format!("eth_call:{}", spec.function_name());
        let _permit = self.gate.preflight(&method).await?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(caller)
            .to(spec.contract())
            .data(spec.calldata()?)
            .into();
        let response = self
            .reader
            .call(&tx, None)
            .await
            .map_err(|e| AppError::from_rpc_message(&e.to_string()));
        self.gate.record(&method, &response).await;

        spec.decode_output(&response?)
    }

    async fn submit_write(&self, request: WriteRequest) -> Result<TxHash> {
        let _permit = self.gate.preflight("eth_sendTransaction").await?;

        let tx = TransactionRequest::new()
            .from(request.from)
            .to(request.to)
            .data(request.data)
            .value(request.value);
        let response = match self.signer.send_transaction(tx, None).await {
            Ok(pending) => Ok(pending.tx_hash()),
            Err(e) => Err(AppError::from_rpc_message(&e.to_string())),
        };
        self.gate.record("eth_sendTransaction", &response).await;
        response
    }

    async fn native_balance(&self, address: Address) -> Result<U256> {
        let _permit = self.gate.preflight("eth_getBalance").await?;
        let response = self
            .reader
            .get_balance(address, None)
            .await
            .map_err(|e| AppError::from_rpc_message(&e.to_string()));
        self.gate.record("eth_getBalance", &response).await;
        response
    }
}

#[derive(Default)]
struct CircuitBreaker {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Caps in-flight RPC calls and backs off after repeated transient failures,
/// so a struggling endpoint is not hammered by every widget at once.
pub struct RpcGate {
    semaphore: Arc<Semaphore>,
    breaker: RwLock<CircuitBreaker>,
}

impl RpcGate {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_inflight.max(1))),
            breaker: RwLock::new(CircuitBreaker::default()),
        }
    }

    pub async fn preflight(&self, method: &str) -> Result<OwnedSemaphorePermit> {
        let now = Instant::now();
        {
            let guard = self.breaker.read().await;
            if let Some(until) = guard.open_until {
                if until > now {
                    let remain_ms = until.duration_since(now).as_millis();
                    return Err(AppError::BlockchainRPC(format!(
                        "{} skipped: RPC circuit open for {}ms",
                        method, remain_ms
                    )));
                }
            }
        }

        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("RPC semaphore closed: {}", e)))
    }

    pub async fn record<T>(&self, method: &str, response: &Result<T>) {
        match response {
            Ok(_) => self.record_success().await,
            Err(AppError::BlockchainRPC(text)) if looks_like_transient_rpc_error(text) => {
                self.record_failure(method).await
            }
            Err(_) => {}
        }
    }

    async fn record_success(&self) {
        let mut guard = self.breaker.write().await;
        if guard.consecutive_failures != 0 || guard.open_until.is_some() {
            guard.consecutive_failures = 0;
            guard.open_until = None;
        }
    }

    async fn record_failure(&self, method: &str) {
        let mut guard = self.breaker.write().await;
        guard.consecutive_failures = guard.consecutive_failures.saturating_add(1);
        if guard.consecutive_failures < RPC_BREAKER_THRESHOLD {
            return;
        }

        let backoff = breaker_backoff_duration(guard.consecutive_failures);
        guard.open_until = Some(Instant::now() + backoff);
        tracing::warn!(
            "{} transient RPC failure triggered circuit backoff={}s failures={}",
            method,
            backoff.as_secs(),
            guard.consecutive_failures
        );
    }
}

fn breaker_backoff_duration(failures: u32) -> Duration {
    if failures <= RPC_BREAKER_THRESHOLD {
        return Duration::from_secs(RPC_BREAKER_BASE_SECS);
    }
    let exponent = (failures - RPC_BREAKER_THRESHOLD).min(6);
    let multiplier = 1_u64 << exponent;
    let secs = RPC_BREAKER_BASE_SECS.saturating_mul(multiplier);
    Duration::from_secs(secs.min(RPC_BREAKER_MAX_SECS))
}

pub fn looks_like_transient_rpc_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("gateway")
        || lower.contains("temporarily unavailable")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("error sending request")
}
