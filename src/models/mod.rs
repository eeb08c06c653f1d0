// src/models/mod.rs
pub mod dashboard;

pub use dashboard::{
    ApiResponse, ChainDescriptor, DashboardView, GuardState, NetworkModal, NetworkView,
    Notification, Panel, ReadState, SessionView, WriteState, WriteView,
};
