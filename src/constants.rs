/// Application constants

// Contract addresses (Ethereum mainnet, Lido)
pub const DEFAULT_STAKING_CONTRACT: &str = "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84";
pub const DEFAULT_TOKEN_CONTRACT: &str = DEFAULT_STAKING_CONTRACT;
pub const DEFAULT_STAKE_REFERRAL: &str = "0x6fBa46974b2b1bEfefA034e236A32e1f10C5A148";
pub const DEFAULT_STAKE_AMOUNT: &str = "0.1";

// Chains
pub const DEFAULT_SUPPORTED_CHAINS: &str = "1:Ethereum";
pub const DEFAULT_WALLET_RPC_URL: &str = "http://127.0.0.1:1248";

// Minimal ABI fragments, only the functions this dashboard invokes.
pub const STAKING_ABI: &[&str] = &[
    "function totalSupply() view returns (uint256)",
    "function submit(address _referral) payable returns (uint256)",
];
pub const TOKEN_ABI: &[&str] = &["function balanceOf(address owner) view returns (uint256)"];

pub const FN_TOTAL_SUPPLY: &str = "totalSupply";
pub const FN_BALANCE_OF: &str = "balanceOf";
pub const FN_SUBMIT: &str = "submit";

// Display
pub const NATIVE_DECIMALS: u32 = 18;
pub const NATIVE_SYMBOL: &str = "ETH";
pub const GROUPED_FRACTION_DIGITS: u32 = 3;

// Page copy
pub const LABEL_STAKED: &str = "You staked";
pub const LABEL_AVAILABLE: &str = "Available to stake";
pub const LABEL_TOTAL_STAKED: &str = "Total staked on Lido";
pub const LABEL_STAKE_BUTTON: &str = "Stake";
pub const LABEL_STAKE_AMOUNT: &str = "Amount of ETH to stake";

// Provider / RPC
pub const PROVIDER_POLL_INTERVAL_MS: u64 = 1_500;
pub const PROVIDER_EVENT_CAPACITY: usize = 64;
pub const RPC_TIMEOUT_SECS: u64 = 6;
pub const RPC_MAX_INFLIGHT: usize = 8;
pub const RPC_BREAKER_THRESHOLD: u32 = 3;
pub const RPC_BREAKER_BASE_SECS: u64 = 2;
pub const RPC_BREAKER_MAX_SECS: u64 = 45;
pub const READ_REFRESH_SECS: u64 = 15;

// Notifications
pub const NOTIFICATION_HISTORY: usize = 50;
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 100;

// API version
pub const API_VERSION: &str = "v1";

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;
