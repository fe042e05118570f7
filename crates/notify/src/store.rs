//! Notification persistence abstraction.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use docflow_core::{DomainError, DomainResult, UserId};

use crate::notification::{Notification, NotificationId};

/// Storage for notification rows.
///
/// Implementations are keyed by `NotificationId` and must support a
/// per-recipient scan; ordering is the service's concern.
pub trait NotificationStore: Send + Sync {
    fn insert(&self, notification: Notification) -> DomainResult<()>;

    fn get(&self, id: NotificationId) -> DomainResult<Option<Notification>>;

    fn update(&self, notification: Notification) -> DomainResult<()>;

    /// Every row for the recipient, hidden ones included.
    fn for_recipient(&self, recipient: UserId) -> DomainResult<Vec<Notification>>;
}

impl<S> NotificationStore for Arc<S>
where
    S: NotificationStore + ?Sized,
{
    fn insert(&self, notification: Notification) -> DomainResult<()> {
        (**self).insert(notification)
    }

    fn get(&self, id: NotificationId) -> DomainResult<Option<Notification>> {
        (**self).get(id)
    }

    fn update(&self, notification: Notification) -> DomainResult<()> {
        (**self).update(notification)
    }

    fn for_recipient(&self, recipient: UserId) -> DomainResult<Vec<Notification>> {
        (**self).for_recipient(recipient)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    rows: RwLock<BTreeMap<NotificationId, Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> DomainResult<std::sync::RwLockReadGuard<'_, BTreeMap<NotificationId, Notification>>> {
        self.rows
            .read()
            .map_err(|_| DomainError::unavailable("notification store lock poisoned"))
    }

    fn write(
        &self,
    ) -> DomainResult<std::sync::RwLockWriteGuard<'_, BTreeMap<NotificationId, Notification>>>
    {
        self.rows
            .write()
            .map_err(|_| DomainError::unavailable("notification store lock poisoned"))
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn insert(&self, notification: Notification) -> DomainResult<()> {
        self.write()?.insert(notification.id, notification);
        Ok(())
    }

    fn get(&self, id: NotificationId) -> DomainResult<Option<Notification>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn update(&self, notification: Notification) -> DomainResult<()> {
        let mut rows = self.write()?;
        if !rows.contains_key(&notification.id) {
            return Err(DomainError::not_found());
        }
        rows.insert(notification.id, notification);
        Ok(())
    }

    fn for_recipient(&self, recipient: UserId) -> DomainResult<Vec<Notification>> {
        Ok(self
            .read()?
            .values()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect())
    }
}
