use ethers::types::Address;
use ethers::utils::to_checksum;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::{models::SessionView, services::wallet_provider::WalletProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No direct query has completed yet.
    Pending,
    Resolved(Option<Address>),
}

/// What the page knows about the wallet at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSession {
    pub connected: Option<Address>,
    pub resolution: Resolution,
    pub resolution_pending: bool,
}

impl WalletSession {
    /// The resolved address once one has been fetched, else the provider snapshot.
    pub fn effective_address(&self) -> Option<Address> {
        match self.resolution {
            Resolution::Resolved(address) => address,
            Resolution::Pending => self.connected,
        }
    }

    pub fn resolved_address(&self) -> Option<Address> {
        match self.resolution {
            Resolution::Resolved(address) => address,
            Resolution::Pending => None,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            address: self.effective_address().map(|a| to_checksum(&a, None)),
            connected_address: self.connected.map(|a| to_checksum(&a, None)),
            resolved_address: self.resolved_address().map(|a| to_checksum(&a, None)),
            resolution_pending: self.resolution_pending,
        }
    }
}

struct Applied {
    generation: u64,
    resolution: Resolution,
}

struct ResolverState {
    issued: AtomicU64,
    applied: Mutex<Applied>,
}

impl ResolverState {
    fn applied(&self) -> std::sync::MutexGuard<'_, Applied> {
        match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Re-queries the wallet for its account whenever a dependency changes.
///
/// Each trigger carries a generation number. A response older than the newest
/// one already applied is dropped, so a slow stale answer can never overwrite
/// a fresher one. Failures are logged and keep the previous value.
pub struct AccountResolver {
    provider: Arc<dyn WalletProvider>,
    state: Arc<ResolverState>,
}

impl AccountResolver {
    pub fn new(provider: Arc<dyn WalletProvider>) -> Self {
        Self {
            provider,
            state: Arc::new(ResolverState {
                issued: AtomicU64::new(0),
                applied: Mutex::new(Applied {
                    generation: 0,
                    resolution: Resolution::Pending,
                }),
            }),
        }
    }

    pub fn trigger(&self) -> JoinHandle<()> {
        let generation = self.state.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let provider = self.provider.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let result = provider.fetch_active_account().await;

            let mut applied = state.applied();
            if generation < applied.generation {
                tracing::debug!(
                    "discarding stale account resolution gen={} (applied gen={})",
                    generation,
                    applied.generation
                );
                return;
            }
            applied.generation = generation;

            match result {
                Ok(address) => {
                    if applied.resolution != Resolution::Resolved(address) {
                        tracing::debug!("account resolved gen={} address={:?}", generation, address);
                    }
                    applied.resolution = Resolution::Resolved(address);
                }
                Err(e) => {
                    tracing::warn!("There is an error loading the account: {}", e);
                }
            }
        })
    }

    pub fn session(&self) -> WalletSession {
        let applied = self.state.applied();
        WalletSession {
            connected: self.provider.connected_account(),
            resolution: applied.resolution,
            resolution_pending: self.state.issued.load(Ordering::SeqCst) > applied.generation,
        }
    }
}
