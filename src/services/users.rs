use serde::Serialize;
use serde_json::json;
use rand::seq::IndexedRandom;
use sha2::{Digest, Sha256};
use tuin_common::{Role, User, UserStatus};

use super::validation::{clean, is_valid_email, validate_id, validate_input};
use super::{Caller, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::models::{NewUser, NewUserRequest, UserPatch};

const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHJKMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789!@#$%";
const PASSWORD_LENGTH: usize = 16;

/// A freshly created user and the one-time password handed to them.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub user: User,
    pub temporary_password: String,
}

/// Random 16-character password without look-alike characters.
pub fn generate_temp_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LENGTH)
        .filter_map(|_| PASSWORD_CHARSET.choose(&mut rng))
        .map(|&b| b as char)
        .collect()
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Active users, newest first.
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<User>> {
        let users = self
            .ctx
            .db
            .call(|db| db.list_users().map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "users", "list", None);
        Ok(users)
    }

    pub async fn create(&self, caller: &Caller, request: NewUserRequest) -> ServiceResult<CreatedUser> {
        let (Some(email), Some(full_name), Some(role)) = (
            clean(request.email.as_ref()),
            clean(request.full_name.as_ref()),
            clean(request.role.as_ref()),
        ) else {
            return Err(ServiceError::validation(
                "email",
                "Email, full name, and role are required",
            ));
        };
        let email = email.to_lowercase();
        if !is_valid_email(&email) {
            return Err(ServiceError::validation("email", "Invalid email format"));
        }
        let role: Role = role
            .parse()
            .map_err(|e: String| ServiceError::validation("role", e))?;
        validate_input(&full_name, "full_name", self.ctx.max_input_length)?;
        let garden_access = request.garden_access.unwrap_or_default();
        for &id in &garden_access {
            validate_id(id, "garden_access")?;
        }

        let temporary_password = generate_temp_password();
        let new_user = NewUser {
            email: email.clone(),
            full_name,
            role,
            status: UserStatus::Active,
            password_hash: hash_password(&temporary_password),
            force_password_change: true,
            garden_access,
        };
        let user = self
            .ctx
            .db
            .call(move |db| {
                if db.find_user_by_email(&new_user.email)?.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "User with email {} already exists",
                        new_user.email
                    )));
                }
                Ok(db.create_user(&new_user)?)
            })
            .await?;

        tracing::info!(user_id = user.id, role = user.role.as_str(), "User created");
        self.ctx.audit.log_user_action(
            caller.user_id,
            "create",
            "users",
            json!({ "user_id": user.id, "email": email }),
        );
        Ok(CreatedUser {
            user,
            temporary_password,
        })
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<User> {
        validate_id(id, "id")?;
        let user = self.load(id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "users", "read", Some(id));
        Ok(user)
    }

    pub async fn update(&self, caller: &Caller, id: i64, patch: UserPatch) -> ServiceResult<User> {
        validate_id(id, "id")?;
        if patch.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("full_name", "Full name cannot be empty"));
        }
        let patch = UserPatch {
            full_name: clean(patch.full_name.as_ref()),
            ..patch
        };
        if let Some(name) = patch.full_name.as_deref() {
            validate_input(name, "full_name", self.ctx.max_input_length)?;
        }
        for &garden_id in patch.garden_access.iter().flatten() {
            validate_id(garden_id, "garden_access")?;
        }
        let current = self.load(id).await?;
        if !current.is_active {
            return Err(ServiceError::not_found("User", id));
        }

        let user = self
            .ctx
            .db
            .call(move |db| db.update_user(id, &patch).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "update", "users", json!({ "user_id": id }));
        Ok(user)
    }

    /// Deactivate a user and revoke their garden access.
    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        let deleted = self
            .ctx
            .db
            .call(move |db| db.soft_delete_user(id).map_err(ServiceError::from))
            .await?;
        if !deleted {
            return Err(ServiceError::not_found("User", id));
        }
        tracing::info!(user_id = id, "User deactivated");
        self.ctx
            .audit
            .log_user_action(caller.user_id, "delete", "users", json!({ "user_id": id }));
        Ok(true)
    }

    /// Resolve a session's user id to an active user.
    pub async fn authenticate(&self, id: i64) -> ServiceResult<User> {
        if id <= 0 {
            return Err(ServiceError::Unauthorized);
        }
        match self
            .ctx
            .db
            .call(move |db| db.get_user(id).map_err(ServiceError::from))
            .await?
        {
            Some(user) if user.is_active && user.status != UserStatus::Inactive => Ok(user),
            _ => Err(ServiceError::Unauthorized),
        }
    }

    async fn load(&self, id: i64) -> ServiceResult<User> {
        self.ctx
            .db
            .call(move |db| db.get_user(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::context;

    fn request(email: &str, name: &str, role: &str) -> NewUserRequest {
        NewUserRequest {
            email: Some(email.to_string()),
            full_name: Some(name.to_string()),
            role: Some(role.to_string()),
            garden_access: None,
        }
    }

    #[test]
    fn test_temp_password_shape() {
        for _ in 0..20 {
            let password = generate_temp_password();
            assert_eq!(password.len(), 16);
            assert!(password.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
        }
        assert!(!PASSWORD_CHARSET.contains(&b'0'));
        assert!(!PASSWORD_CHARSET.contains(&b'l'));
    }

    #[test]
    fn test_temp_password_uses_full_charset_at_every_position() {
        let mut seen = vec![std::collections::HashSet::new(); PASSWORD_LENGTH];
        for _ in 0..5000 {
            for (pos, b) in generate_temp_password().bytes().enumerate() {
                seen[pos].insert(b);
            }
        }
        for (pos, chars) in seen.iter().enumerate() {
            assert_eq!(chars.len(), PASSWORD_CHARSET.len(), "position {}", pos);
        }
    }

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_create_validation_messages() {
        let service = UserService::new(context());
        let caller = Caller::system();
        let cases = [
            (request("", "An", "user"), "Email, full name, and role are required"),
            (request("not-an-email", "An", "user"), "Invalid email format"),
            (request("an@example.nl", "An", "owner"), "Role must be admin or user"),
        ];
        for (input, message) in cases {
            let err = service.create(&caller, input).await.unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_rejects_duplicates() {
        let service = UserService::new(context());
        let caller = Caller::system();
        let created = service
            .create(&caller, request("  An@Example.NL ", "An de Vries", "user"))
            .await
            .unwrap();
        assert_eq!(created.user.email, "an@example.nl");
        assert_eq!(created.user.status, UserStatus::Active);
        assert!(created.user.force_password_change);
        assert_eq!(created.temporary_password.len(), 16);

        let err = service
            .create(&caller, request("an@example.nl", "Ander", "admin"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "User with email an@example.nl already exists"
        );
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let service = UserService::new(context());
        let caller = Caller::system();
        let created = service
            .create(&caller, request("piet@example.nl", "Piet", "user"))
            .await
            .unwrap();
        let id = created.user.id;

        let updated = service
            .update(
                &caller,
                id,
                UserPatch {
                    role: Some(Role::Admin),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.is_admin());

        assert!(service.authenticate(id).await.is_ok());
        assert!(service.delete(&caller, id).await.unwrap());
        assert!(service.list(&caller).await.unwrap().is_empty());
        assert!(matches!(
            service.authenticate(id).await,
            Err(ServiceError::Unauthorized)
        ));
        assert!(matches!(
            service.delete(&caller, id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user() {
        let service = UserService::new(context());
        assert!(matches!(
            service.authenticate(42).await,
            Err(ServiceError::Unauthorized)
        ));
    }
}
