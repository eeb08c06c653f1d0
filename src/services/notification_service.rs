use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

use crate::{constants::NOTIFICATION_CHANNEL_CAPACITY, models::Notification};

/// User-visible outcome channel (the dashboard's toasts). Every write outcome
/// and every failed network switch goes through here.
pub struct NotificationService {
    sender: broadcast::Sender<Notification>,
    history: RwLock<VecDeque<Notification>>,
    history_limit: usize,
    next_id: AtomicU64,
}

impl NotificationService {
    pub fn new(history_limit: usize) -> Self {
        let (sender, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            sender,
            history: RwLock::new(VecDeque::with_capacity(history_limit)),
            history_limit: history_limit.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn send_notification(
        &self,
        notif_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Notification {
        let notification = Notification {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            notif_type: notif_type.to_string(),
            title: title.into(),
            message: message.into(),
            data,
            created_at: chrono::Utc::now(),
        };

        {
            let mut history = self.history.write().await;
            if history.len() >= self.history_limit {
                history.pop_front();
            }
            history.push_back(notification.clone());
        }

        // No subscribers just means nobody is watching live.
        let _ = self.sender.send(notification.clone());

        tracing::info!(
            "Notification [{}] {} - {}",
            notification.notif_type,
            notification.title,
            notification.message
        );
        notification
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Newest first.
    pub async fn recent(&self, limit: usize) -> Vec<Notification> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    TransactionSubmitted,
    TransactionFailed,
    NetworkSwitchRequested,
    NetworkSwitchFailed,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransactionSubmitted => "transaction.submitted",
            Self::TransactionFailed => "transaction.failed",
            Self::NetworkSwitchRequested => "network.switch_requested",
            Self::NetworkSwitchFailed => "network.switch_failed",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_type_to_string_maps() {
        assert_eq!(
            NotificationType::TransactionSubmitted.to_string(),
            "transaction.submitted"
        );
        assert_eq!(
            NotificationType::NetworkSwitchFailed.to_string(),
            "network.switch_failed"
        );
        assert_eq!(
            NotificationType::NetworkSwitchRequested.to_string(),
            "network.switch_requested"
        );
    }

    #[tokio::test]
    async fn send_broadcasts_and_records_history() {
        let service = NotificationService::new(2);
        let mut rx = service.subscribe();

        service
            .send_notification(NotificationType::TransactionSubmitted, "a", "first", None)
            .await;
        service
            .send_notification(NotificationType::TransactionFailed, "b", "second", None)
            .await;
        service
            .send_notification(NotificationType::TransactionFailed, "c", "third", None)
            .await;

        let received = rx.recv().await.expect("broadcast");
        assert_eq!(received.title, "a");

        let recent = service.recent(10).await;
        let titles: Vec<&str> = recent.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);
        assert!(recent[0].id > recent[1].id);
    }
}
