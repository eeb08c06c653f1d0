// src/api/mod.rs

pub mod dashboard;
pub mod health;
pub mod network;
pub mod notifications;
pub mod stake;

use std::sync::Arc;

// AppState definition
use crate::config::Config;
use crate::services::{DashboardController, NotificationService};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub dashboard: Arc<DashboardController>,
    pub notifications: Arc<NotificationService>,
}
