use ethers::types::Address;
use std::env;
use std::str::FromStr;
use url::Url;

use crate::constants::{
    DEFAULT_STAKE_AMOUNT, DEFAULT_STAKE_REFERRAL, DEFAULT_STAKING_CONTRACT,
    DEFAULT_SUPPORTED_CHAINS, DEFAULT_TOKEN_CONTRACT, DEFAULT_WALLET_RPC_URL,
    NOTIFICATION_HISTORY, PROVIDER_POLL_INTERVAL_MS, READ_REFRESH_SECS, RPC_MAX_INFLIGHT,
    RPC_TIMEOUT_SECS,
};
use crate::models::ChainDescriptor;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Wallet / RPC
    pub wallet_rpc_url: String,
    pub ethereum_rpc_url: String,
    pub supported_chains: Vec<ChainDescriptor>,

    // Contract Addresses
    pub staking_contract_address: String,
    pub token_contract_address: String,
    pub stake_referral_address: String,
    pub stake_default_amount: Option<String>,

    // Timing
    pub provider_poll_interval_ms: u64,
    pub rpc_timeout_secs: u64,
    pub read_refresh_secs: u64,
    pub rpc_max_inflight: usize,

    // Notifications
    pub notification_history: usize,

    // CORS
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            wallet_rpc_url: DEFAULT_WALLET_RPC_URL.to_string(),
            ethereum_rpc_url: DEFAULT_WALLET_RPC_URL.to_string(),
            supported_chains: parse_supported_chains(DEFAULT_SUPPORTED_CHAINS)
                .unwrap_or_default(),
            staking_contract_address: DEFAULT_STAKING_CONTRACT.to_string(),
            token_contract_address: DEFAULT_TOKEN_CONTRACT.to_string(),
            stake_referral_address: DEFAULT_STAKE_REFERRAL.to_string(),
            stake_default_amount: Some(DEFAULT_STAKE_AMOUNT.to_string()),
            provider_poll_interval_ms: PROVIDER_POLL_INTERVAL_MS,
            rpc_timeout_secs: RPC_TIMEOUT_SECS,
            read_refresh_secs: READ_REFRESH_SECS,
            rpc_max_inflight: RPC_MAX_INFLIGHT,
            notification_history: NOTIFICATION_HISTORY,
            cors_allowed_origins: "*".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let wallet_rpc_url =
            env::var("WALLET_RPC_URL").unwrap_or_else(|_| defaults.wallet_rpc_url.clone());
        let ethereum_rpc_url = env::var("ETHEREUM_RPC_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| wallet_rpc_url.clone());

        let supported_chains = match env::var("SUPPORTED_CHAINS") {
            Ok(raw) => parse_supported_chains(&raw)?,
            Err(_) => defaults.supported_chains.clone(),
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),

            wallet_rpc_url,
            ethereum_rpc_url,
            supported_chains,

            staking_contract_address: env::var("STAKING_CONTRACT_ADDRESS")
                .unwrap_or(defaults.staking_contract_address),
            token_contract_address: env::var("TOKEN_CONTRACT_ADDRESS")
                .unwrap_or(defaults.token_contract_address),
            stake_referral_address: env::var("STAKE_REFERRAL_ADDRESS")
                .unwrap_or(defaults.stake_referral_address),
            stake_default_amount: match env::var("STAKE_DEFAULT_AMOUNT") {
                Ok(v) if v.trim().is_empty() => None,
                Ok(v) => Some(v.trim().to_string()),
                Err(_) => defaults.stake_default_amount,
            },

            provider_poll_interval_ms: parse_env_or("PROVIDER_POLL_INTERVAL_MS", defaults.provider_poll_interval_ms)?,
            rpc_timeout_secs: parse_env_or("RPC_TIMEOUT_SECS", defaults.rpc_timeout_secs)?,
            read_refresh_secs: parse_env_or("READ_REFRESH_SECS", defaults.read_refresh_secs)?,
            rpc_max_inflight: parse_env_or("RPC_MAX_INFLIGHT", defaults.rpc_max_inflight)?,

            notification_history: parse_env_or("NOTIFICATION_HISTORY", defaults.notification_history)?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.supported_chains.is_empty() {
            anyhow::bail!("SUPPORTED_CHAINS is empty");
        }
        Url::parse(&self.wallet_rpc_url)
            .map_err(|e| anyhow::anyhow!("WALLET_RPC_URL is invalid: {}", e))?;
        Url::parse(&self.ethereum_rpc_url)
            .map_err(|e| anyhow::anyhow!("ETHEREUM_RPC_URL is invalid: {}", e))?;

        for (name, value) in [
            ("STAKING_CONTRACT_ADDRESS", &self.staking_contract_address),
            ("TOKEN_CONTRACT_ADDRESS", &self.token_contract_address),
            ("STAKE_REFERRAL_ADDRESS", &self.stake_referral_address),
        ] {
            let address = Address::from_str(value.trim())
                .map_err(|_| anyhow::anyhow!("{} is not a valid address", name))?;
            if address.is_zero() || value.starts_with("0x0000") {
                tracing::warn!("Using placeholder {}", name);
            }
        }

        if self.provider_poll_interval_ms == 0 {
            anyhow::bail!("PROVIDER_POLL_INTERVAL_MS must be > 0");
        }
        if self.rpc_timeout_secs == 0 {
            anyhow::bail!("RPC_TIMEOUT_SECS must be > 0");
        }
        if self.rpc_max_inflight == 0 {
            anyhow::bail!("RPC_MAX_INFLIGHT must be > 0");
        }
        if self.read_refresh_secs == 0 {
            tracing::warn!("READ_REFRESH_SECS is 0; reads refresh only when inputs change");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    /// The single chain the dashboard requires: the first supported entry.
    pub fn target_chain(&self) -> anyhow::Result<&ChainDescriptor> {
        self.supported_chains
            .first()
            .ok_or_else(|| anyhow::anyhow!("SUPPORTED_CHAINS is empty"))
    }
}

// Parses `id:name` pairs separated by commas, e.g. `1:Ethereum,5:Goerli`.
pub fn parse_supported_chains(raw: &str) -> anyhow::Result<Vec<ChainDescriptor>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (id, name) = entry.split_once(':').unwrap_or((entry, ""));
            let id: u64 = id
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid chain id in SUPPORTED_CHAINS: {}", entry))?;
            let name = name.trim();
            Ok(ChainDescriptor::new(
                id,
                if name.is_empty() {
                    format!("Chain {}", id)
                } else {
                    name.to_string()
                },
            ))
        })
        .collect()
}

fn parse_env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().parse()?),
        _ => Ok(default),
    }
}
