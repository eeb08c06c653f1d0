use ethers::types::{Address, TxHash, U256};
use ethers::utils::to_checksum;
use std::sync::{Arc, Mutex};

use crate::{
    constants::NATIVE_DECIMALS,
    contracts::{format::parse_native_amount, ContractCallSpec},
    error::{AppError, Result},
    models::{WriteState, WriteView},
    services::{
        notification_service::{NotificationService, NotificationType},
        onchain::{ContractTransport, WriteRequest},
    },
};

/// A submit control bound to one payable (or plain) contract function.
#[derive(Debug, Clone)]
pub struct WriteSpec {
    pub call: ContractCallSpec,
    pub label: String,
    pub value_field_name: String,
    pub default_amount: Option<String>,
}

pub struct WriteBinding {
    inner: Arc<WriteInner>,
}

struct WriteInner {
    spec: WriteSpec,
    transport: Arc<dyn ContractTransport>,
    notifications: Arc<NotificationService>,
    submitting: tokio::sync::Mutex<()>,
    last_tx: Mutex<Option<TxHash>>,
}

impl WriteBinding {
    pub fn new(
        spec: WriteSpec,
        transport: Arc<dyn ContractTransport>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            inner: Arc::new(WriteInner {
                spec,
                transport,
                notifications,
                submitting: tokio::sync::Mutex::new(()),
                last_tx: Mutex::new(None),
            }),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.try_lock().is_err()
    }

    /// Checks preconditions and encodes the transaction. An empty or missing
    /// amount falls back to the configured default.
    pub fn build_request(&self, caller: Option<Address>, amount: Option<&str>) -> Result<WriteRequest> {
        self.inner.build_request(caller, amount)
    }

    /// Hands the transaction to the wallet. Only one submission may be
    /// outstanding; every outcome is reported as a notification, even when
    /// the caller stops waiting.
    pub async fn submit(&self, caller: Option<Address>, amount: Option<&str>) -> Result<TxHash> {
        let inner = self.inner.clone();
        let amount = amount.map(str::to_owned);
        match tokio::spawn(async move { inner.submit(caller, amount.as_deref()).await }).await {
            Ok(outcome) => outcome,
            Err(e) => Err(AppError::Internal(format!(
                "{} task failed: {}",
                self.inner.spec.call.function_name(),
                e
            ))),
        }
    }

    pub fn view(&self, caller: Option<Address>) -> WriteView {
        let spec = &self.inner.spec;
        let state = if caller.is_none() {
            WriteState::Disconnected
        } else if self.is_submitting() {
            WriteState::Submitting
        } else {
            WriteState::Idle
        };
        let last_tx_hash = match self.inner.last_tx.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        WriteView {
            label: spec.label.clone(),
            value_field_name: spec.value_field_name.clone(),
            default_amount: spec.default_amount.clone(),
            contract: to_checksum(&spec.call.contract(), None),
            function: spec.call.function_name().to_string(),
            state,
            last_tx_hash: last_tx_hash.map(|hash| format!("{:#x}", hash)),
        }
    }
}

impl WriteInner {
    fn build_request(&self, caller: Option<Address>, amount: Option<&str>) -> Result<WriteRequest> {
        let from = caller.ok_or(AppError::WalletNotConnected)?;

        let raw_amount = entered(amount).or_else(|| entered(self.spec.default_amount.as_deref()));
        let value = match raw_amount {
            Some(raw) => parse_native_amount(raw, NATIVE_DECIMALS)?,
            None => U256::zero(),
        };
        if !value.is_zero() && !self.spec.call.is_payable() {
            return Err(AppError::InvalidAmount(format!(
                "{} is not payable",
                self.spec.call.function_name()
            )));
        }

        Ok(WriteRequest {
            from,
            to: self.spec.call.contract(),
            data: self.spec.call.calldata()?,
            value,
        })
    }

    async fn submit(&self, caller: Option<Address>, amount: Option<&str>) -> Result<TxHash> {
        let Ok(_in_flight) = self.submitting.try_lock() else {
            return Err(self.report_failure(AppError::SubmissionInFlight).await);
        };

        let request = match self.build_request(caller, amount) {
            Ok(request) => request,
            Err(e) => return Err(self.report_failure(e).await),
        };
        let value = request.value;

        tracing::info!(
            "submitting {} to {:?} value={} from={:?}",
            self.spec.call.function_name(),
            request.to,
            value,
            request.from
        );
        match self.transport.submit_write(request).await {
            Ok(tx_hash) => {
                {
                    let mut last = match self.last_tx.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    *last = Some(tx_hash);
                }
                self.notifications
                    .send_notification(
                        NotificationType::TransactionSubmitted,
                        format!("{} submitted", self.spec.label),
                        format!("Transaction {:#x} sent to the network", tx_hash),
                        Some(serde_json::json!({
                            "tx_hash": format!("{:#x}", tx_hash),
                            "contract": to_checksum(&self.spec.call.contract(), None),
                            "function": self.spec.call.function_name(),
                            "value_wei": value.to_string(),
                        })),
                    )
                    .await;
                Ok(tx_hash)
            }
            Err(e) => Err(self.report_failure(e).await),
        }
    }

    async fn report_failure(&self, error: AppError) -> AppError {
        tracing::warn!("{} failed: {}", self.spec.call.function_name(), error);
        self.notifications
            .send_notification(
                NotificationType::TransactionFailed,
                format!("{} failed", self.spec.label),
                error.to_string(),
                Some(serde_json::json!({ "code": error.code() })),
            )
            .await;
        error
    }
}

/// Blank input counts as no input.
fn entered(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|raw| !raw.is_empty())
}
