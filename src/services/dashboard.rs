use ethers::types::{Address, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    constants::{
        GROUPED_FRACTION_DIGITS, LABEL_AVAILABLE, LABEL_STAKED, LABEL_STAKE_AMOUNT,
        LABEL_STAKE_BUTTON, LABEL_TOTAL_STAKED, NATIVE_DECIMALS, NATIVE_SYMBOL,
    },
    contracts::{ResultTransform, StakingContracts},
    error::{AppError, Result},
    models::{DashboardView, GuardState, NetworkView, Panel, ReadState},
    services::{
        account_resolver::{AccountResolver, WalletSession},
        chain_guard::{ChainGuard, SwitchOutcome},
        notification_service::NotificationService,
        onchain::ContractTransport,
        read_binding::{ReadBinding, ReadRequest},
        wallet_provider::WalletProvider,
        write_binding::{WriteBinding, WriteSpec},
    },
};

/// Wires the provider, guard, resolver and bindings into one page.
pub struct DashboardController {
    provider: Arc<dyn WalletProvider>,
    resolver: AccountResolver,
    guard: ChainGuard,
    contracts: StakingContracts,
    total_request: ReadRequest,
    staked: ReadBinding,
    available: ReadBinding,
    total_staked: ReadBinding,
    stake: WriteBinding,
}

impl DashboardController {
    pub fn new(
        config: &Config,
        provider: Arc<dyn WalletProvider>,
        transport: Arc<dyn ContractTransport>,
        notifications: Arc<NotificationService>,
    ) -> Result<Self> {
        let target = config
            .target_chain()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .clone();
        let contracts = StakingContracts::from_config(config)?;

        let timeout = Duration::from_secs(config.rpc_timeout_secs.max(1));
        let refresh_after =
            (config.read_refresh_secs > 0).then(|| Duration::from_secs(config.read_refresh_secs));
        let units = ResultTransform::Units {
            decimals: NATIVE_DECIMALS,
        };

        let stake = WriteBinding::new(
            WriteSpec {
                call: contracts.stake()?,
                label: LABEL_STAKE_BUTTON.to_string(),
                value_field_name: LABEL_STAKE_AMOUNT.to_string(),
                default_amount: config.stake_default_amount.clone(),
            },
            transport.clone(),
            notifications.clone(),
        );

        Ok(Self {
            resolver: AccountResolver::new(provider.clone()),
            guard: ChainGuard::new(provider.clone(), target, notifications),
            total_request: ReadRequest::Contract(contracts.total_staked()?),
            staked: ReadBinding::new(LABEL_STAKED, transport.clone(), units, timeout, refresh_after),
            available: ReadBinding::new(LABEL_AVAILABLE, transport.clone(), units, timeout, refresh_after),
            total_staked: ReadBinding::new(
                LABEL_TOTAL_STAKED,
                transport,
                ResultTransform::GroupedUnits {
                    decimals: NATIVE_DECIMALS,
                    max_fraction_digits: GROUPED_FRACTION_DIGITS,
                },
                timeout,
                refresh_after,
            ),
            stake,
            contracts,
            provider,
        })
    }

    /// Re-derives everything that depends on the provider's account or chain.
    pub fn on_dependency_change(&self) -> JoinHandle<()> {
        self.guard.evaluate();
        self.resolver.trigger()
    }

    /// Follows provider events until the provider goes away.
    pub async fn run(self: Arc<Self>) {
        let mut events = self.provider.subscribe();
        self.on_dependency_change();

        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::debug!("provider event: {:?}", event);
                    self.on_dependency_change();
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("dashboard lagged {} provider events; resyncing", skipped);
                    self.on_dependency_change();
                }
                Err(RecvError::Closed) => {
                    tracing::info!("provider event stream closed; dashboard loop exiting");
                    break;
                }
            }
        }
    }

    pub fn session(&self) -> WalletSession {
        self.resolver.session()
    }

    pub fn network(&self) -> NetworkView {
        self.guard.network()
    }

    /// Forces every read to call again on the next render.
    pub fn refresh(&self) {
        self.staked.invalidate();
        self.available.invalidate();
        self.total_staked.invalidate();
    }

    /// Current page without waiting on any call.
    pub fn view(&self) -> DashboardView {
        if let Some(modal) = self.guard.modal() {
            return DashboardView::Blocked { modal };
        }
        let session = self.resolver.session();
        let caller = session.effective_address();

        let staked = match self.staked_request(caller) {
            Ok(Some(request)) => self.staked.render(request, caller),
            Ok(None) => self.staked.disconnect(),
            Err(e) => failed(e),
        };
        let available = self.available.render(ReadRequest::NativeBalance, caller);
        let total_staked = self.total_staked.render(self.total_request.clone(), caller);

        self.assemble(session, caller, staked, available, total_staked)
    }

    /// Like [`view`](Self::view), but waits for pending reads to settle.
    pub async fn view_settled(&self) -> DashboardView {
        if let Some(modal) = self.guard.modal() {
            return DashboardView::Blocked { modal };
        }
        let session = self.resolver.session();
        let caller = session.effective_address();

        let staked = async {
            match self.staked_request(caller) {
                Ok(Some(request)) => self.staked.resolve(request, caller).await,
                Ok(None) => self.staked.disconnect(),
                Err(e) => failed(e),
            }
        };
        let (staked, available, total_staked) = tokio::join!(
            staked,
            self.available.resolve(ReadRequest::NativeBalance, caller),
            self.total_staked.resolve(self.total_request.clone(), caller),
        );

        self.assemble(session, caller, staked, available, total_staked)
    }

    pub async fn switch_network(&self) -> Result<SwitchOutcome> {
        let outcome = self.guard.switch_network().await?;
        self.on_dependency_change();
        Ok(outcome)
    }

    /// Submits a stake. Refused outright while the wallet is on the wrong network.
    pub async fn stake(&self, amount: Option<&str>) -> Result<TxHash> {
        if self.guard.evaluate() == GuardState::Wrong {
            let expected = self.guard.target().id;
            tracing::warn!("stake refused: wallet not on chain {}", expected);
            return Err(AppError::WrongNetwork { expected });
        }

        let caller = self.resolver.session().effective_address();
        let tx_hash = self.stake.submit(caller, amount).await?;
        // Balances moved; the next render re-reads them.
        self.refresh();
        Ok(tx_hash)
    }

    fn staked_request(&self, owner: Option<Address>) -> Result<Option<ReadRequest>> {
        owner
            .map(|owner| self.contracts.staked_balance(owner).map(ReadRequest::Contract))
            .transpose()
    }

    fn assemble(
        &self,
        session: WalletSession,
        caller: Option<Address>,
        staked: ReadState,
        available: ReadState,
        total_staked: ReadState,
    ) -> DashboardView {
        DashboardView::Ready {
            session: session.view(),
            network: self.guard.network(),
            staked: panel(LABEL_STAKED, staked),
            available: panel(LABEL_AVAILABLE, available),
            total_staked: panel(LABEL_TOTAL_STAKED, total_staked),
            stake: self.stake.view(caller),
        }
    }
}

fn panel(label: &str, state: ReadState) -> Panel {
    Panel {
        label: label.to_string(),
        unit: NATIVE_SYMBOL.to_string(),
        state,
    }
}

fn failed(error: AppError) -> ReadState {
    ReadState::Failed {
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{chain, FakeTransport, FakeWalletProvider};
    use ethers::types::U256;

    struct Harness {
        provider: Arc<FakeWalletProvider>,
        transport: Arc<FakeTransport>,
        notifications: Arc<NotificationService>,
        dashboard: Arc<DashboardController>,
    }

    fn harness(account: Option<Address>, chain_id: Option<u64>) -> Harness {
        let config = Config::default();
        let provider = Arc::new(
            FakeWalletProvider::new(account, chain_id.map(|id| chain(id, "Chain")))
                .with_known_chains(config.supported_chains.clone()),
        );
        let transport = Arc::new(FakeTransport::new());
        transport.respond_uint("balanceOf", "1500000000000000000");
        transport.respond_uint("totalSupply", "9500000123456789000000000");
        transport.set_balance(U256::exp10(18) * U256::from(2));
        let notifications = Arc::new(NotificationService::new(10));
        let dashboard = Arc::new(
            DashboardController::new(
                &config,
                provider.clone(),
                transport.clone(),
                notifications.clone(),
            )
            .expect("controller"),
        );
        Harness {
            provider,
            transport,
            notifications,
            dashboard,
        }
    }

    fn value(panel: &Panel) -> Option<&str> {
        match &panel.state {
            ReadState::Ready { value } => Some(value.as_str()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn wrong_network_blocks_the_page() {
        let h = harness(Some(Address::repeat_byte(1)), Some(5));
        h.dashboard.on_dependency_change().await.expect("resolved");

        match h.dashboard.view_settled().await {
            DashboardView::Blocked { modal } => {
                assert_eq!(modal.title, "Connect your wallet to Ethereum");
                assert_eq!(modal.target_chain_id, 1);
            }
            other => panic!("expected modal, got {:?}", other),
        }
        assert!(h.transport.read_calls().is_empty());

        let err = h.dashboard.stake(Some("0.1")).await.expect_err("refused");
        assert_eq!(err, AppError::WrongNetwork { expected: 1 });
        assert!(h.transport.writes().is_empty());
    }

    #[tokio::test]
    async fn connected_page_renders_panels() {
        let account = Address::repeat_byte(1);
        let h = harness(Some(account), Some(1));
        h.dashboard.on_dependency_change().await.expect("resolved");

        let DashboardView::Ready {
            session,
            staked,
            available,
            total_staked,
            stake,
            ..
        } = h.dashboard.view_settled().await
        else {
            panic!("expected ready view");
        };
        assert_eq!(session.resolved_address.as_deref(), session.address.as_deref());
        assert_eq!(staked.label, "You staked");
        assert_eq!(value(&staked), Some("1.5"));
        assert_eq!(value(&available), Some("2"));
        assert_eq!(value(&total_staked), Some("9,500,000.123"));
        assert_eq!(stake.label, "Stake");
        assert_eq!(stake.default_amount.as_deref(), Some("0.1"));

        let calls = h.transport.read_calls();
        assert!(calls.iter().all(|(_, caller)| *caller == account));
        assert_eq!(h.transport.balance_calls(), vec![account]);
    }

    #[tokio::test]
    async fn disconnected_wallet_renders_please_connect() {
        let h = harness(None, None);
        h.dashboard.on_dependency_change().await.expect("resolved");

        let DashboardView::Ready {
            staked,
            available,
            total_staked,
            stake,
            ..
        } = h.dashboard.view_settled().await
        else {
            panic!("no chain is never blocked");
        };
        for panel in [&staked, &available, &total_staked] {
            assert_eq!(panel.state, ReadState::Disconnected);
        }
        assert_eq!(stake.state, crate::models::WriteState::Disconnected);
        assert!(h.transport.read_calls().is_empty());
        assert!(h.transport.balance_calls().is_empty());
    }

    #[tokio::test]
    async fn successful_stake_refreshes_reads() {
        let h = harness(Some(Address::repeat_byte(1)), Some(1));
        h.dashboard.on_dependency_change().await.expect("resolved");
        h.dashboard.view_settled().await;
        let before = h.transport.read_calls().len();

        h.dashboard.stake(None).await.expect("staked");
        assert_eq!(h.transport.writes()[0].value, U256::exp10(17));
        assert_eq!(
            h.notifications.recent(1).await[0].notif_type,
            "transaction.submitted"
        );

        h.dashboard.view_settled().await;
        assert_eq!(h.transport.read_calls().len(), before * 2);
    }

    #[tokio::test]
    async fn run_loop_follows_account_changes() {
        let h = harness(Some(Address::repeat_byte(1)), Some(1));
        let task = tokio::spawn(h.dashboard.clone().run());

        for _ in 0..1000 {
            if h.provider.fetch_calls() >= 1 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let next = Address::repeat_byte(2);
        h.provider.set_account(Some(next));
        for _ in 0..1000 {
            if h.dashboard.session().resolved_address() == Some(next) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(h.dashboard.session().effective_address(), Some(next));
        task.abort();
    }

    #[tokio::test]
    async fn switch_unblocks_the_page() {
        let h = harness(Some(Address::repeat_byte(1)), Some(5));
        assert!(matches!(h.dashboard.view(), DashboardView::Blocked { .. }));

        let outcome = h.dashboard.switch_network().await.expect("switched");
        assert_eq!(
            outcome,
            SwitchOutcome::Switched {
                state: GuardState::Correct
            }
        );
        assert_eq!(h.provider.switch_calls(), vec![1]);
        assert!(matches!(h.dashboard.view(), DashboardView::Ready { .. }));
    }
}
