use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::{Error, Result};
use crate::container::ContainerID;
use crate::model::{EventType, Severity};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

/// A notification before it was assigned an id by the [`NotificationStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub event_type: EventType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub container_id: Option<ContainerID>,
    pub container_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: u64,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub event_type: EventType,
    pub title: String,
    pub message: String,
    pub container_id: Option<ContainerID>,
    pub container_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug)]
struct Inner {
    next_id: u64,
    notifications: VecDeque<Notification>,
}

/// Bounded list of notifications, oldest evicted first.
#[derive(Debug)]
pub struct NotificationStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}

impl NotificationStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                next_id: 1,
                notifications: VecDeque::with_capacity(capacity),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores an alert as a new unread notification and returns it.
    pub fn push(&self, alert: Alert) -> Notification {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let notification = Notification {
            id,
            severity: alert.severity,
            event_type: alert.event_type,
            title: alert.title,
            message: alert.message,
            container_id: alert.container_id,
            container_name: alert.container_name,
            timestamp: alert.timestamp,
            read: false,
        };
        while inner.notifications.len() >= self.capacity {
            inner.notifications.pop_front();
        }
        inner.notifications.push_back(notification.clone());
        notification
    }

    /// All retained notifications, newest first.
    pub fn list(&self) -> Vec<Notification> {
        self.lock().notifications.iter().rev().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().notifications.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&self, id: u64) -> Result<()> {
        let mut inner = self.lock();
        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(Error::UnknownNotification(id))?;
        notification.read = true;
        Ok(())
    }

    pub fn mark_all_read(&self) {
        self.lock()
            .notifications
            .iter_mut()
            .for_each(|n| n.read = true);
    }

    pub fn clear(&self) {
        self.lock().notifications.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(title: &str) -> Alert {
        Alert {
            event_type: EventType::Test,
            severity: Severity::Info,
            title: title.to_owned(),
            message: String::new(),
            container_id: None,
            container_name: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_list_is_newest_first() {
        let store = NotificationStore::default();
        store.push(alert("first"));
        store.push(alert("second"));
        let titles: Vec<String> = store.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let store = NotificationStore::new(2);
        let first = store.push(alert("a"));
        store.push(alert("b"));
        let third = store.push(alert("c"));
        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, third.id);
        assert!(list.iter().all(|n| n.id != first.id));
        assert!(store.mark_read(first.id).is_err());
    }

    #[test]
    fn test_read_state() {
        let store = NotificationStore::default();
        let a = store.push(alert("a"));
        store.push(alert("b"));
        assert_eq!(store.unread_count(), 2);

        store.mark_read(a.id).unwrap();
        assert_eq!(store.unread_count(), 1);
        assert!(matches!(
            store.mark_read(999),
            Err(Error::UnknownNotification(999))
        ));

        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);

        store.clear();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let store = NotificationStore::default();
        let notification = store.push(alert("a"));
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "info");
        assert_eq!(value["eventType"], "test");
        assert_eq!(value["read"], false);
        assert!(value["containerId"].is_null());
    }
}
