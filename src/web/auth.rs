//! Session resolution and permission checks.
//!
//! The caller's user id arrives in the `x-user-id` header, set by the
//! fronting auth proxy. It is resolved to an active user on every request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tuin_common::{AccessScope, Permission, User};

use super::api::{ApiError, SharedState};
use crate::errors::ServiceError;
use crate::services::Caller;

pub const USER_HEADER: &str = "x-user-id";

pub fn has_permission(user: &User, permission: Permission) -> bool {
    user.is_admin() || user.role.permissions().contains(&permission)
}

pub fn has_garden_access(user: &User, garden_id: i64) -> bool {
    user.is_admin() || user.garden_access.contains(&garden_id)
}

pub fn accessible_gardens(user: &User) -> AccessScope {
    if user.is_admin() {
        AccessScope::All
    } else {
        AccessScope::Gardens(user.garden_access.clone())
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fails with 403 unless the user holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<&Self, ApiError> {
        if has_permission(&self.0, permission) {
            Ok(self)
        } else {
            tracing::warn!(
                user_id = self.0.id,
                permission = permission.as_str(),
                "Permission denied"
            );
            Err(ServiceError::Forbidden.into())
        }
    }

    pub fn caller(&self) -> Caller {
        Caller::for_user(&self.0)
    }
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(ServiceError::Unauthorized)?;
        let user = state.users.authenticate(id).await?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuin_common::{Role, UserStatus};

    fn user(role: Role, gardens: Vec<i64>) -> User {
        User {
            id: 1,
            email: "a@b.nl".to_string(),
            full_name: "A".to_string(),
            role,
            status: UserStatus::Active,
            garden_access: gardens,
            force_password_change: false,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_admin_has_everything() {
        let admin = user(Role::Admin, vec![]);
        assert!(has_permission(&admin, Permission::UsersManage));
        assert!(has_garden_access(&admin, 99));
        assert_eq!(accessible_gardens(&admin), AccessScope::All);
    }

    #[test]
    fn test_user_permissions_follow_role() {
        let member = user(Role::User, vec![4]);
        assert!(has_permission(&member, Permission::TasksComplete));
        assert!(has_permission(&member, Permission::LogbookCreate));
        assert!(!has_permission(&member, Permission::GardensCreate));
        assert!(!has_permission(&member, Permission::TasksDelete));
        assert!(has_garden_access(&member, 4));
        assert!(!has_garden_access(&member, 5));
        assert_eq!(accessible_gardens(&member), AccessScope::Gardens(vec![4]));
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let member = CurrentUser(user(Role::User, vec![]));
        assert!(member.require(Permission::GardensView).is_ok());
        assert!(member.require(Permission::GardensDelete).is_err());
    }
}
