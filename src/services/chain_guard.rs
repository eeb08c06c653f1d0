use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::{
    error::{AppError, Result},
    models::{ChainDescriptor, GuardState, NetworkModal, NetworkView},
    services::{
        notification_service::{NotificationService, NotificationType},
        wallet_provider::WalletProvider,
    },
};

/// A missing chain (no wallet attached) is vacuously correct.
pub fn is_correct_chain(active: Option<&ChainDescriptor>, target: &ChainDescriptor) -> bool {
    match active {
        None => true,
        Some(chain) => chain.id == target.id,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SwitchOutcome {
    /// The wallet accepted the switch; `state` is the re-evaluated guard.
    Switched { state: GuardState },
    /// A switch is already waiting on the wallet; nothing was sent.
    AlreadyPending,
    /// Nothing to do.
    AlreadyCorrect,
}

/// Keeps the page honest about which network the wallet is on.
pub struct ChainGuard {
    provider: Arc<dyn WalletProvider>,
    target: ChainDescriptor,
    notifications: Arc<NotificationService>,
    last_state: Mutex<GuardState>,
    switch_lock: tokio::sync::Mutex<()>,
}

impl ChainGuard {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        target: ChainDescriptor,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            provider,
            target,
            notifications,
            last_state: Mutex::new(GuardState::Correct),
            switch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn target(&self) -> &ChainDescriptor {
        &self.target
    }

    /// Recomputes the state from the provider's current chain.
    pub fn evaluate(&self) -> GuardState {
        let active = self.provider.active_chain();
        let next = if is_correct_chain(active.as_ref(), &self.target) {
            GuardState::Correct
        } else {
            GuardState::Wrong
        };

        let mut last = match self.last_state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last != next {
            tracing::info!(
                "chain guard {:?} -> {:?} (active={:?}, target={})",
                *last,
                next,
                active.as_ref().map(|c| c.id),
                self.target.id
            );
            *last = next;
        }
        next
    }

    pub fn switch_pending(&self) -> bool {
        self.switch_lock.try_lock().is_err()
    }

    pub fn network(&self) -> NetworkView {
        let active_chain = self.provider.active_chain();
        let is_correct_chain = is_correct_chain(active_chain.as_ref(), &self.target);
        NetworkView {
            active_chain,
            target_chain: self.target.clone(),
            is_correct_chain,
            state: self.evaluate(),
            switch_pending: self.switch_pending(),
        }
    }

    /// The blocking dialog, present only while the state is `WRONG`.
    pub fn modal(&self) -> Option<NetworkModal> {
        if self.evaluate() == GuardState::Correct {
            return None;
        }
        Some(NetworkModal {
            title: format!("Connect your wallet to {}", self.target.name),
            action_label: format!("Click this to connect to {}", self.target.name),
            target_chain_id: self.target.id,
            switch_pending: self.switch_pending(),
        })
    }

    /// The modal's single action. At most one request is with the wallet at a
    /// time; a click while one is pending sends nothing. Failures leave the
    /// guard `WRONG` and are not retried.
    pub async fn switch_network(&self) -> Result<SwitchOutcome> {
        let Ok(_in_flight) = self.switch_lock.try_lock() else {
            tracing::debug!("network switch already pending; ignoring click");
            return Ok(SwitchOutcome::AlreadyPending);
        };
        if self.evaluate() == GuardState::Correct {
            return Ok(SwitchOutcome::AlreadyCorrect);
        }

        tracing::info!("requesting wallet switch to chain {}", self.target.id);
        match self.provider.request_chain_switch(self.target.id).await {
            Ok(()) => {
                let state = self.evaluate();
                let (title, message) = match state {
                    GuardState::Correct => (
                        "Network switched",
                        format!("Wallet moved to {}", self.target.name),
                    ),
                    GuardState::Wrong => (
                        "Network switch requested",
                        format!("Waiting for the wallet to report {}", self.target.name),
                    ),
                };
                self.notifications
                    .send_notification(
                        NotificationType::NetworkSwitchRequested,
                        title,
                        message,
                        Some(serde_json::json!({ "chain_id": self.target.id })),
                    )
                    .await;
                Ok(SwitchOutcome::Switched { state })
            }
            Err(e) => {
                let message = match &e {
                    AppError::ChainSwitch(message) => message.clone(),
                    other => other.to_string(),
                };
                tracing::warn!("network switch to {} failed: {}", self.target.id, message);
                self.notifications
                    .send_notification(
                        NotificationType::NetworkSwitchFailed,
                        "Network switch failed",
                        message.clone(),
                        Some(serde_json::json!({ "chain_id": self.target.id })),
                    )
                    .await;
                Err(AppError::ChainSwitch(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{chain, FakeWalletProvider};

    fn guard(provider: Arc<FakeWalletProvider>, target: ChainDescriptor) -> ChainGuard {
        ChainGuard::new(provider, target, Arc::new(NotificationService::new(10)))
    }

    #[test]
    fn is_correct_chain_truth_table() {
        let target = chain(5, "Goerli");
        assert!(is_correct_chain(None, &target));
        assert!(is_correct_chain(Some(&chain(5, "Goerli")), &target));
        // Only the id matters.
        assert!(is_correct_chain(Some(&chain(5, "renamed")), &target));
        for id in [0, 1, 4, 6, 137, u64::MAX] {
            assert!(!is_correct_chain(Some(&chain(id, "other")), &target));
        }
    }

    #[test]
    fn wrong_chain_produces_modal() {
        let provider = Arc::new(FakeWalletProvider::new(None, Some(chain(1, "Ethereum"))));
        let guard = guard(provider, chain(5, "Goerli"));

        assert_eq!(guard.evaluate(), GuardState::Wrong);
        let modal = guard.modal().expect("modal while wrong");
        assert_eq!(modal.title, "Connect your wallet to Goerli");
        assert_eq!(modal.action_label, "Click this to connect to Goerli");
        assert_eq!(modal.target_chain_id, 5);
    }

    #[test]
    fn disconnect_returns_to_correct() {
        let provider = Arc::new(FakeWalletProvider::new(None, Some(chain(1, "Ethereum"))));
        let guard = guard(provider.clone(), chain(5, "Goerli"));
        assert_eq!(guard.evaluate(), GuardState::Wrong);

        provider.set_chain(None);
        assert_eq!(guard.evaluate(), GuardState::Correct);
        assert!(guard.modal().is_none());
        assert!(guard.network().is_correct_chain);
    }

    #[tokio::test]
    async fn second_click_while_pending_sends_nothing() {
        let provider = Arc::new(
            FakeWalletProvider::new(None, Some(chain(1, "Ethereum")))
                .with_known_chains(vec![chain(5, "Goerli")]),
        );
        let guard = Arc::new(guard(provider.clone(), chain(5, "Goerli")));
        let release = provider.hold_next_switch();

        let first = tokio::spawn({
            let guard = guard.clone();
            async move { guard.switch_network().await }
        });
        for _ in 0..100 {
            if !provider.switch_calls().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(guard.switch_pending());
        assert!(guard.modal().expect("still wrong").switch_pending);

        let second = guard.switch_network().await.expect("no error");
        assert_eq!(second, SwitchOutcome::AlreadyPending);
        assert_eq!(provider.switch_calls(), vec![5]);

        release.send(Ok(())).expect("switch waiting");
        let outcome = first.await.expect("joined").expect("switch ok");
        assert_eq!(
            outcome,
            SwitchOutcome::Switched {
                state: GuardState::Correct
            }
        );
        assert_eq!(provider.switch_calls(), vec![5]);
        assert!(!guard.switch_pending());
    }

    #[tokio::test]
    async fn rejected_switch_stays_wrong_and_notifies() {
        let provider = Arc::new(FakeWalletProvider::new(None, Some(chain(1, "Ethereum"))));
        let notifications = Arc::new(NotificationService::new(10));
        let guard = ChainGuard::new(provider.clone(), chain(5, "Goerli"), notifications.clone());

        let release = provider.hold_next_switch();
        release
            .send(Err(AppError::ChainSwitch("request rejected by user".to_string())))
            .expect("gate armed");

        let err = guard.switch_network().await.expect_err("rejected");
        assert!(matches!(err, AppError::ChainSwitch(_)));
        assert_eq!(guard.evaluate(), GuardState::Wrong);
        assert_eq!(provider.switch_calls(), vec![5]);

        let recent = notifications.recent(1).await;
        assert_eq!(recent[0].notif_type, "network.switch_failed");

        // The user may retry by hand; that is a new request.
        guard.switch_network().await.expect("second attempt succeeds");
        assert_eq!(provider.switch_calls(), vec![5, 5]);
    }

    #[tokio::test]
    async fn accepted_switch_without_new_chain_is_not_reported_as_done() {
        let provider = Arc::new(
            FakeWalletProvider::new(None, Some(chain(1, "Ethereum")))
                .with_known_chains(vec![chain(5, "Goerli")])
                .with_lagging_switch(),
        );
        let notifications = Arc::new(NotificationService::new(10));
        let guard = ChainGuard::new(provider.clone(), chain(5, "Goerli"), notifications.clone());

        let outcome = guard.switch_network().await.expect("switch accepted");
        assert_eq!(
            outcome,
            SwitchOutcome::Switched {
                state: GuardState::Wrong
            }
        );
        let recent = notifications.recent(1).await;
        assert_eq!(recent[0].notif_type, "network.switch_requested");
        assert_eq!(recent[0].title, "Network switch requested");
        assert_eq!(recent[0].message, "Waiting for the wallet to report Goerli");

        provider.set_chain(Some(chain(5, "Goerli")));
        assert_eq!(guard.evaluate(), GuardState::Correct);
    }

    #[tokio::test]
    async fn completed_switch_is_reported() {
        let provider = Arc::new(
            FakeWalletProvider::new(None, Some(chain(1, "Ethereum")))
                .with_known_chains(vec![chain(5, "Goerli")]),
        );
        let notifications = Arc::new(NotificationService::new(10));
        let guard = ChainGuard::new(provider, chain(5, "Goerli"), notifications.clone());

        guard.switch_network().await.expect("switched");
        let recent = notifications.recent(1).await;
        assert_eq!(recent[0].title, "Network switched");
        assert_eq!(recent[0].message, "Wallet moved to Goerli");
    }
}
