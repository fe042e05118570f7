use docflow_identity::ResolvedUser;

/// Authenticated caller for a request.
///
/// Built once by the auth middleware and carried as a request extension; role
/// ids are resolved to names there so handlers can gate on them without
/// another catalog lookup.
#[derive(Debug, Clone)]
pub struct AuthContext {
    user: ResolvedUser,
    role_names: Vec<String>,
}

impl AuthContext {
    pub fn new(user: ResolvedUser, role_names: Vec<String>) -> Self {
        Self { user, role_names }
    }

    pub fn user(&self) -> &ResolvedUser {
        &self.user
    }

    pub fn user_id(&self) -> docflow_core::UserId {
        self.user.user_id
    }

    pub fn role_names(&self) -> &[String] {
        &self.role_names
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.role_names.iter().any(|r| r == name)
    }
}
