use chrono::{DateTime, Utc};
use serde::Deserialize;

use docflow_core::DepartmentId;
use docflow_documents::{ActionState, DistributionType, SecurityLevel};

// -------------------------
// Auth
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
}

// -------------------------
// Org
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub parent: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReparentRequest {
    pub parent: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    /// Permission ids to grant at creation.
    #[serde(default)]
    pub permissions: Vec<uuid::Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub name: String,
    pub category: String,
}

// -------------------------
// Identity admin
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DisableUserRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SetUserDepartmentRequest {
    pub department: Option<DepartmentId>,
}

// -------------------------
// Documents
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub security_level: SecurityLevel,
    pub distribution: DistributionType,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignDocumentRequest {
    pub department: Option<DepartmentId>,
    pub handler: Option<docflow_core::UserId>,
}

#[derive(Debug, Deserialize)]
pub struct RecordActionRequest {
    pub state: ActionState,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetDocumentTypeRequest {
    pub document_type: uuid::Uuid,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDocumentTypeRequest {
    pub name: String,
}

// -------------------------
// Notifications
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
    /// Optional kind filter for notification listings.
    pub kind: Option<docflow_notify::NotificationType>,
}
