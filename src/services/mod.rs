// All service modules
pub mod account_resolver;
pub mod chain_guard;
pub mod dashboard;
pub mod notification_service;
pub mod onchain;
pub mod read_binding;
pub mod wallet_provider;
pub mod write_binding;

#[cfg(test)]
pub mod testing;

// Re-export for convenience
pub use account_resolver::AccountResolver;
pub use chain_guard::ChainGuard;
pub use dashboard::DashboardController;
pub use notification_service::NotificationService;
pub use onchain::EthersTransport;
pub use read_binding::ReadBinding;
pub use wallet_provider::RpcWalletProvider;
pub use write_binding::WriteBinding;

use std::sync::Arc;

/// Start all background services
pub fn start_background_services(
    provider: Arc<RpcWalletProvider>,
    dashboard: Arc<DashboardController>,
) {
    tracing::info!("Starting background services...");

    // Wallet watcher feeds provider events; the dashboard loop consumes them.
    provider.spawn_watcher();
    tokio::spawn(dashboard.run());

    tracing::info!("All background services started successfully");
}
