//! `docflow-notify` — user notification inbox and outbound delivery.

pub mod notification;
pub mod service;
pub mod store;
pub mod transport;

pub use notification::{EntityRef, Notification, NotificationId, NotificationType};
pub use service::{NotificationService, Page};
pub use store::{InMemoryNotificationStore, NotificationStore};
pub use transport::{NoopTransport, NotificationTransport, TransportError};
