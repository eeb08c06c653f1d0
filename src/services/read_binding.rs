use ethers::abi::Token;
use ethers::types::Address;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::{
    contracts::{CallValue, ContractCallSpec, ResultTransform},
    error::AppError,
    models::ReadState,
    services::onchain::ContractTransport,
};

/// What a read widget fetches.
#[derive(Debug, Clone)]
pub enum ReadRequest {
    Contract(ContractCallSpec),
    /// Native-currency balance of the caller.
    NativeBalance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadTarget {
    Contract {
        contract: Address,
        function: String,
        args: Vec<CallValue>,
    },
    NativeBalance,
}

/// Everything a result depends on. A different key means a fresh call.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadKey {
    target: ReadTarget,
    caller: Address,
}

impl ReadKey {
    fn new(request: &ReadRequest, caller: Address) -> Self {
        let target = match request {
            ReadRequest::Contract(spec) => ReadTarget::Contract {
                contract: spec.contract(),
                function: spec.function_name().to_string(),
                args: spec.args().to_vec(),
            },
            ReadRequest::NativeBalance => ReadTarget::NativeBalance,
        };
        Self { target, caller }
    }
}

struct ReadSlot {
    key: Option<ReadKey>,
    state: ReadState,
    settled_at: Option<Instant>,
    in_flight: bool,
}

enum Begin {
    Cached(ReadState),
    InFlight(ReadState),
    Fetch(ReadKey, ReadState),
}

#[derive(Clone)]
struct Fetcher {
    name: Arc<str>,
    transport: Arc<dyn ContractTransport>,
    transform: ResultTransform,
    timeout: Duration,
    slot: Arc<Mutex<ReadSlot>>,
    settled: Arc<Notify>,
}

/// A declarative read widget.
///
/// Re-invokes only when the contract, function, args or caller change, or when
/// a successful result is older than the refresh interval. A failure stays
/// on screen until an input changes or [`ReadBinding::invalidate`] is called,
/// so a broken call is never retried in a loop.
pub struct ReadBinding {
    fetcher: Fetcher,
    refresh_after: Option<Duration>,
}

impl ReadBinding {
    pub fn new(
        name: &str,
        transport: Arc<dyn ContractTransport>,
        transform: ResultTransform,
        timeout: Duration,
        refresh_after: Option<Duration>,
    ) -> Self {
        Self {
            fetcher: Fetcher {
                name: Arc::from(name),
                transport,
                transform,
                timeout,
                slot: Arc::new(Mutex::new(ReadSlot {
                    key: None,
                    state: ReadState::Disconnected,
                    settled_at: None,
                    in_flight: false,
                })),
                settled: Arc::new(Notify::new()),
            },
            refresh_after,
        }
    }

    /// Current state without waiting. Starts a background call when needed.
    pub fn render(&self, request: ReadRequest, caller: Option<Address>) -> ReadState {
        let Some(caller) = caller else {
            return self.disconnect();
        };
        match self.begin(&request, caller) {
            Begin::Cached(state) | Begin::InFlight(state) => state,
            Begin::Fetch(key, state) => {
                let fetcher = self.fetcher.clone();
                tokio::spawn(async move {
                    fetcher.run(request, key).await;
                });
                state
            }
        }
    }

    /// Like [`render`](Self::render), but waits for a pending call to settle
    /// (bounded by the call timeout).
    pub async fn resolve(&self, request: ReadRequest, caller: Option<Address>) -> ReadState {
        let Some(caller) = caller else {
            return self.disconnect();
        };
        loop {
            let settled = self.fetcher.settled.notified();
            match self.begin(&request, caller) {
                Begin::Cached(state) => return state,
                Begin::Fetch(key, state) => {
                    // Detached: dropping this future must not strand `in_flight`.
                    let fetcher = self.fetcher.clone();
                    return match tokio::spawn(async move { fetcher.run(request, key).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::warn!("{} read task failed: {}", self.fetcher.name, e);
                            state
                        }
                    };
                }
                Begin::InFlight(state) => {
                    if tokio::time::timeout(self.fetcher.timeout, settled)
                        .await
                        .is_err()
                    {
                        return state;
                    }
                }
            }
        }
    }

    /// Forgets the cached result; the next render calls again.
    pub fn invalidate(&self) {
        let mut slot = self.fetcher.slot();
        slot.key = None;
        slot.in_flight = false;
        slot.settled_at = None;
    }

    /// Drops any cached result and renders "please connect".
    pub fn disconnect(&self) -> ReadState {
        let mut slot = self.fetcher.slot();
        slot.key = None;
        slot.state = ReadState::Disconnected;
        slot.settled_at = None;
        slot.in_flight = false;
        ReadState::Disconnected
    }

    fn begin(&self, request: &ReadRequest, caller: Address) -> Begin {
        let key = ReadKey::new(request, caller);
        let mut slot = self.fetcher.slot();

        if slot.key.as_ref() == Some(&key) {
            if slot.in_flight {
                return Begin::InFlight(slot.state.clone());
            }
            let expired = match (self.refresh_after, slot.settled_at) {
                (Some(after), Some(at)) => at.elapsed() >= after,
                _ => false,
            };
            if !(expired && matches!(slot.state, ReadState::Ready { .. })) {
                return Begin::Cached(slot.state.clone());
            }
            // Keep showing the old value while it refreshes.
            slot.in_flight = true;
            return Begin::Fetch(key, slot.state.clone());
        }

        slot.key = Some(key.clone());
        slot.state = ReadState::Loading;
        slot.settled_at = None;
        slot.in_flight = true;
        Begin::Fetch(key, ReadState::Loading)
    }
}

impl Fetcher {
    fn slot(&self) -> MutexGuard<'_, ReadSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn run(&self, request: ReadRequest, key: ReadKey) -> ReadState {
        let state = match tokio::time::timeout(self.timeout, self.call(&request, key.caller)).await {
            Ok(Ok(tokens)) => match self.transform.apply(&tokens) {
                Ok(value) => ReadState::Ready { value },
                Err(e) => self.failed(e),
            },
            Ok(Err(e)) => self.failed(e),
            Err(_) => self.failed(AppError::Timeout(format!(
                "{} after {:?}",
                self.name, self.timeout
            ))),
        };

        {
            let mut slot = self.slot();
            if slot.key.as_ref() == Some(&key) {
                slot.state = state.clone();
                slot.settled_at = Some(Instant::now());
                slot.in_flight = false;
            } else {
                tracing::debug!("{} inputs changed mid-call; dropping result", self.name);
            }
        }
        self.settled.notify_waiters();
        state
    }

    async fn call(&self, request: &ReadRequest, caller: Address) -> crate::error::Result<Vec<Token>> {
        match request {
            ReadRequest::Contract(spec) => self.transport.call_read(spec, caller).await,
            ReadRequest::NativeBalance => self
                .transport
                .native_balance(caller)
                .await
                .map(|balance| vec![Token::Uint(balance)]),
        }
    }

    fn failed(&self, error: AppError) -> ReadState {
        tracing::warn!("{} read failed: {}", self.name, error);
        ReadState::Failed {
            message: error.to_string(),
        }
    }
}
