use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== CHAIN ====================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub id: u64,
    pub name: String,
}

impl ChainDescriptor {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

// ==================== NETWORK ====================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardState {
    Correct,
    Wrong,
}

/// Blocking dialog shown while the wallet sits on the wrong chain. It carries a
/// single action: switching to the target chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkModal {
    pub title: String,
    pub action_label: String,
    pub target_chain_id: u64,
    pub switch_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkView {
    pub active_chain: Option<ChainDescriptor>,
    pub target_chain: ChainDescriptor,
    pub is_correct_chain: bool,
    pub state: GuardState,
    pub switch_pending: bool,
}

// ==================== SESSION ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub address: Option<String>,
    pub connected_address: Option<String>,
    pub resolved_address: Option<String>,
    pub resolution_pending: bool,
}

// ==================== BINDINGS ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReadState {
    /// No caller address; the widget asks the user to connect instead of calling.
    Disconnected,
    Loading,
    Ready { value: String },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub label: String,
    pub unit: String,
    #[serde(flatten)]
    pub state: ReadState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    Disconnected,
    Idle,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteView {
    pub label: String,
    pub value_field_name: String,
    pub default_amount: Option<String>,
    pub contract: String,
    pub function: String,
    pub state: WriteState,
    pub last_tx_hash: Option<String>,
}

// ==================== DASHBOARD ====================
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    /// Wrong network: the modal replaces the page content.
    Blocked { modal: NetworkModal },
    Ready {
        session: SessionView,
        network: NetworkView,
        staked: Panel,
        available: Panel,
        total_staked: Panel,
        stake: WriteView,
    },
}

// ==================== NOTIFICATION ====================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub notif_type: String,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ==================== API ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
