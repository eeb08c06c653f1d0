use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    constants::PROVIDER_EVENT_CAPACITY,
    error::{AppError, Result},
    models::ChainDescriptor,
};

/// Change notifications emitted by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountChanged(Option<Address>),
    ChainChanged(Option<ChainDescriptor>),
}

/// The wallet connection. Its state is owned externally; the dashboard only
/// reads it, except for the explicit chain-switch request.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Last account the provider reported. May lag behind the wallet.
    fn connected_account(&self) -> Option<Address>;

    /// Chain the wallet is attached to, `None` when disconnected.
    fn active_chain(&self) -> Option<ChainDescriptor>;

    /// Asks the wallet directly for its active account.
    async fn fetch_active_account(&self) -> Result<Option<Address>>;

    async fn request_chain_switch(&self, chain_id: u64) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ProviderSnapshot {
    account: Option<Address>,
    chain: Option<ChainDescriptor>,
}

/// Wallet reached over an EIP-1193 JSON-RPC bridge (`eth_accounts`,
/// `eth_chainId`, `wallet_switchEthereumChain`). Plain HTTP has no push
/// channel, so a watcher polls and turns differences into events.
pub struct RpcWalletProvider {
    client: Provider<Http>,
    known_chains: Vec<ChainDescriptor>,
    snapshot: RwLock<ProviderSnapshot>,
    events: broadcast::Sender<ProviderEvent>,
    poll_interval: Duration,
}

impl RpcWalletProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Provider::<Http>::try_from(config.wallet_rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid WALLET_RPC_URL: {}", e)))?;
        let (events, _) = broadcast::channel(PROVIDER_EVENT_CAPACITY);
        Ok(Self {
            client,
            known_chains: config.supported_chains.clone(),
            snapshot: RwLock::new(ProviderSnapshot::default()),
            events,
            poll_interval: Duration::from_millis(config.provider_poll_interval_ms),
        })
    }

    pub fn spawn_watcher(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.poll_once().await;
            }
        })
    }

    /// Reads account and chain from the wallet and broadcasts what changed.
    /// An unreachable wallet counts as disconnected.
    pub async fn poll_once(&self) {
        let chain = match self.client.get_chainid().await {
            Ok(id) => Some(describe_chain(id.as_u64(), &self.known_chains)),
            Err(e) => {
                tracing::debug!("wallet eth_chainId unavailable: {}", e);
                None
            }
        };
        let account = if chain.is_some() {
            match self.client.get_accounts().await {
                Ok(accounts) => accounts.first().copied(),
                Err(e) => {
                    tracing::debug!("wallet eth_accounts unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        for event in self.apply_snapshot(ProviderSnapshot { account, chain }) {
            // No receivers is fine; the controller may not be running yet.
            let _ = self.events.send(event);
        }
    }

    fn apply_snapshot(&self, next: ProviderSnapshot) -> Vec<ProviderEvent> {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut events = Vec::new();
        if guard.account != next.account {
            tracing::info!("wallet account changed: {:?} -> {:?}", guard.account, next.account);
            events.push(ProviderEvent::AccountChanged(next.account));
        }
        if guard.chain != next.chain {
            tracing::info!(
                "wallet chain changed: {:?} -> {:?}",
                guard.chain.as_ref().map(|c| c.id),
                next.chain.as_ref().map(|c| c.id)
            );
            events.push(ProviderEvent::ChainChanged(next.chain.clone()));
        }
        *guard = next;
        events
    }

    fn read_snapshot(&self) -> ProviderSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    fn connected_account(&self) -> Option<Address> {
        self.read_snapshot().account
    }

    fn active_chain(&self) -> Option<ChainDescriptor> {
        self.read_snapshot().chain
    }

    async fn fetch_active_account(&self) -> Result<Option<Address>> {
        let accounts = self
            .client
            .get_accounts()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;
        Ok(accounts.first().copied())
    }

    async fn request_chain_switch(&self, chain_id: u64) -> Result<()> {
        let params = [serde_json::json!({ "chainId": format!("0x{:x}", chain_id) })];
        self.client
            .request::<_, serde_json::Value>("wallet_switchEthereumChain", params)
            .await
            .map_err(|e| match AppError::from_rpc_message(&e.to_string()) {
                AppError::UserRejected => AppError::ChainSwitch("request rejected by user".to_string()),
                _ => AppError::ChainSwitch(e.to_string()),
            })?;
        // Refresh now rather than waiting for the next tick.
        self.poll_once().await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Configured name for `id`, or a generic label for chains we don't list.
pub fn describe_chain(id: u64, known: &[ChainDescriptor]) -> ChainDescriptor {
    known
        .iter()
        .find(|chain| chain.id == id)
        .cloned()
        .unwrap_or_else(|| ChainDescriptor::new(id, format!("Chain {}", id)))
}
