//! Notification inbox operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use docflow_core::{DomainError, DomainResult, UserId};

use crate::notification::{EntityRef, Notification, NotificationId, NotificationType};
use crate::store::NotificationStore;
use crate::transport::NotificationTransport;

/// Listing window. `limit == 0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// Inbox service over a notification store plus optional outbound channels.
///
/// # Invariants
/// - Listings exclude hidden rows and are newest-first.
/// - Flag mutations require the caller to own the row.
/// - Outbound delivery failures are logged, never propagated.
pub struct NotificationService<S> {
    store: S,
    transports: Vec<Arc<dyn NotificationTransport>>,
}

impl<S: NotificationStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            transports: Vec::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn NotificationTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Persist a notification, then push it through every transport.
    pub fn create(
        &self,
        recipient: UserId,
        kind: NotificationType,
        title: impl Into<String>,
        body: Option<String>,
        entity: Option<EntityRef>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Notification> {
        let notification = Notification::new(recipient, kind, title, body, entity, created_at);
        self.store.insert(notification.clone())?;

        for transport in &self.transports {
            if let Err(err) = transport.deliver(&notification) {
                warn!(
                    channel = transport.name(),
                    notification_id = %notification.id,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }

        Ok(notification)
    }

    /// Visible notifications for a user, newest first.
    pub fn list_for_user(&self, user: UserId, page: Page) -> DomainResult<Vec<Notification>> {
        let mut rows = self.visible(user)?;
        let iter = rows.drain(..).skip(page.offset);
        Ok(if page.limit == 0 {
            iter.collect()
        } else {
            iter.take(page.limit).collect()
        })
    }

    /// Visible notifications of one kind, newest first.
    pub fn list_by_type(
        &self,
        user: UserId,
        kind: NotificationType,
        page: Page,
    ) -> DomainResult<Vec<Notification>> {
        let mut rows = self.visible(user)?;
        rows.retain(|n| n.kind == kind);
        let iter = rows.drain(..).skip(page.offset);
        Ok(if page.limit == 0 {
            iter.collect()
        } else {
            iter.take(page.limit).collect()
        })
    }

    pub fn unread_count(&self, user: UserId) -> DomainResult<u64> {
        Ok(self.visible(user)?.iter().filter(|n| !n.read).count() as u64)
    }

    /// Mark one notification read. Idempotent for already-read rows.
    pub fn mark_read(&self, user: UserId, id: NotificationId) -> DomainResult<()> {
        let mut row = self.owned(user, id)?;
        if !row.read {
            row.read = true;
            self.store.update(row)?;
        }
        Ok(())
    }

    /// Hide one notification from every future listing.
    pub fn soft_delete(&self, user: UserId, id: NotificationId) -> DomainResult<()> {
        let mut row = self.owned(user, id)?;
        if !row.hidden {
            row.hidden = true;
            self.store.update(row)?;
        }
        Ok(())
    }

    pub fn mark_all_read(&self, user: UserId) -> DomainResult<u64> {
        let mut touched = 0;
        for mut row in self.visible(user)? {
            if !row.read {
                row.read = true;
                self.store.update(row)?;
                touched += 1;
            }
        }
        Ok(touched)
    }

    pub fn soft_delete_all(&self, user: UserId) -> DomainResult<u64> {
        let mut touched = 0;
        for mut row in self.visible(user)? {
            row.hidden = true;
            self.store.update(row)?;
            touched += 1;
        }
        Ok(touched)
    }

    // ── helpers ──────────────────────────────────────────────────────────────

    fn visible(&self, user: UserId) -> DomainResult<Vec<Notification>> {
        let mut rows = self.store.for_recipient(user)?;
        rows.retain(|n| !n.hidden);
        // Newest first; id (UUIDv7) breaks created_at ties deterministically.
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    fn owned(&self, user: UserId, id: NotificationId) -> DomainResult<Notification> {
        let row = self.store.get(id)?.ok_or_else(DomainError::not_found)?;
        if row.recipient != user {
            return Err(DomainError::forbidden(
                "notification belongs to another user",
            ));
        }
        Ok(row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryNotificationStore;
    use chrono::Duration;

    fn service() -> NotificationService<InMemoryNotificationStore> {
        NotificationService::new(InMemoryNotificationStore::new())
    }

    fn seed(
        svc: &NotificationService<InMemoryNotificationStore>,
        user: UserId,
        count: usize,
    ) -> Vec<Notification> {
        let base = Utc::now();
        (0..count)
            .map(|i| {
                svc.create(
                    user,
                    NotificationType::System,
                    format!("notice {i}"),
                    None,
                    None,
                    base + Duration::seconds(i as i64),
                )
                .expect("create should succeed")
            })
            .collect()
    }

    #[test]
    fn listing_is_newest_first_and_paged() {
        let svc = service();
        let user = UserId::new();
        let rows = seed(&svc, user, 5);

        let page = svc
            .list_for_user(
                user,
                Page {
                    offset: 0,
                    limit: 2,
                },
            )
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, rows[4].id);
        assert_eq!(page[1].id, rows[3].id);

        let rest = svc
            .list_for_user(
                user,
                Page {
                    offset: 2,
                    limit: 0,
                },
            )
            .unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].id, rows[2].id);
    }

    #[test]
    fn hidden_rows_drop_out_of_listings_and_counts() {
        let svc = service();
        let user = UserId::new();
        let rows = seed(&svc, user, 3);

        svc.soft_delete(user, rows[1].id).unwrap();

        let visible = svc.list_for_user(user, Page::default()).unwrap();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|n| n.id != rows[1].id));
        assert_eq!(svc.unread_count(user).unwrap(), 2);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let svc = service();
        let user = UserId::new();
        let rows = seed(&svc, user, 1);

        svc.mark_read(user, rows[0].id).unwrap();
        svc.mark_read(user, rows[0].id).unwrap();
        assert_eq!(svc.unread_count(user).unwrap(), 0);
    }

    #[test]
    fn flag_mutations_require_ownership() {
        let svc = service();
        let owner = UserId::new();
        let intruder = UserId::new();
        let rows = seed(&svc, owner, 1);

        let err = svc.mark_read(intruder, rows[0].id).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let err = svc.soft_delete(intruder, rows[0].id).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn unknown_notification_is_not_found() {
        let svc = service();
        let err = svc
            .mark_read(UserId::new(), NotificationId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound));
    }

    #[test]
    fn bulk_operations_touch_every_visible_row() {
        let svc = service();
        let user = UserId::new();
        seed(&svc, user, 4);

        assert_eq!(svc.mark_all_read(user).unwrap(), 4);
        assert_eq!(svc.unread_count(user).unwrap(), 0);
        // Already read: nothing left to touch.
        assert_eq!(svc.mark_all_read(user).unwrap(), 0);

        assert_eq!(svc.soft_delete_all(user).unwrap(), 4);
        assert!(svc.list_for_user(user, Page::default()).unwrap().is_empty());
    }

    #[test]
    fn type_filter_excludes_other_kinds() {
        let svc = service();
        let user = UserId::new();
        svc.create(
            user,
            NotificationType::DocumentAssigned,
            "assigned",
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        svc.create(
            user,
            NotificationType::System,
            "maintenance window",
            None,
            None,
            Utc::now(),
        )
        .unwrap();

        let assigned = svc
            .list_by_type(user, NotificationType::DocumentAssigned, Page::default())
            .unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].title, "assigned");
    }

    #[test]
    fn failing_transport_does_not_fail_creation() {
        struct Flaky;
        impl NotificationTransport for Flaky {
            fn name(&self) -> &str {
                "flaky"
            }
            fn deliver(&self, _n: &Notification) -> Result<(), crate::transport::TransportError> {
                Err(crate::transport::TransportError {
                    reason: "connection refused".into(),
                })
            }
        }

        let svc = service().with_transport(Arc::new(Flaky));
        let user = UserId::new();
        let created = svc.create(
            user,
            NotificationType::System,
            "still stored",
            None,
            None,
            Utc::now(),
        );
        assert!(created.is_ok());
        assert_eq!(svc.unread_count(user).unwrap(), 1);
    }
}
