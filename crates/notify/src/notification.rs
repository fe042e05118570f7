//! Notification records.
//!
//! Notifications are immutable at creation except for two flags: `read` and
//! `hidden`. Deletion is soft; a hidden notification stays in the store but
//! drops out of every listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docflow_core::UserId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What happened, in coarse buckets usable for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DocumentAssigned,
    ActionRecorded,
    StageAdvanced,
    DocumentTypeChanged,
    AccountApproved,
    System,
}

/// Loose pointer to the entity a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Document(Uuid),
    User(Uuid),
    Department(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub kind: NotificationType,
    pub title: String,
    pub body: Option<String>,
    pub entity: Option<EntityRef>,
    pub read: bool,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        kind: NotificationType,
        title: impl Into<String>,
        body: Option<String>,
        entity: Option<EntityRef>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            kind,
            title: title.into(),
            body,
            entity,
            read: false,
            hidden: false,
            created_at,
        }
    }
}
