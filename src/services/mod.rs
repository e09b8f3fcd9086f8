//! Garden service layer.
//!
//! Each service validates its input before touching the store, maps
//! missing rows to `ServiceError::NotFound` and records an audit event
//! for every successful read or mutation. Callers at the edge (HTTP API,
//! CLI) turn results into the `{ data, error, success }` envelope with
//! [`envelope`].

pub mod gardens;
pub mod logbook;
pub mod plant_beds;
pub mod plants;
pub mod tasks;
pub mod users;
pub mod validation;

pub use gardens::GardenService;
pub use logbook::LogbookService;
pub use plant_beds::PlantBedService;
pub use plants::PlantService;
pub use tasks::TaskService;
pub use users::UserService;

use tuin_common::{AccessScope, ServiceResponse, User};

use crate::audit::AuditLogger;
use crate::config::TuinToml;
use crate::errors::ServiceError;
use crate::store::DbHandle;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Shared dependencies handed to every service.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: DbHandle,
    pub audit: AuditLogger,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_input_length: usize,
}

impl ServiceContext {
    pub fn new(db: DbHandle, audit: AuditLogger, toml: &TuinToml) -> Self {
        Self {
            db,
            audit,
            default_page_size: toml.pagination.default_page_size,
            max_page_size: toml.pagination.max_page_size,
            max_input_length: toml.security.max_input_length,
        }
    }

    /// Context with default limits, used by tests and one-off CLI commands.
    pub fn with_defaults(db: DbHandle) -> Self {
        Self::new(db, AuditLogger::disabled(), &TuinToml::default())
    }
}

/// Who is calling a service and which gardens they may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<i64>,
    pub scope: AccessScope,
}

impl Caller {
    /// Unrestricted caller for CLI and background jobs.
    pub fn system() -> Self {
        Self {
            user_id: None,
            scope: AccessScope::All,
        }
    }

    pub fn for_user(user: &User) -> Self {
        let scope = if user.is_admin() {
            AccessScope::All
        } else {
            AccessScope::Gardens(user.garden_access.clone())
        };
        Self {
            user_id: Some(user.id),
            scope,
        }
    }

    /// Fails with `Forbidden` when the garden is outside the caller's scope.
    pub fn ensure_garden(&self, garden_id: i64) -> ServiceResult<()> {
        if self.scope.allows(garden_id) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }

    pub(crate) fn garden_filter(&self) -> Option<Vec<i64>> {
        self.scope.garden_ids().map(|ids| ids.to_vec())
    }
}

/// Convert a service result into the response envelope. Unexpected
/// failures are logged in full and reported with a generic message.
pub fn envelope<T>(result: ServiceResult<T>) -> ServiceResponse<T> {
    match result {
        Ok(data) => ServiceResponse::ok(data),
        Err(err) => {
            if let ServiceError::Database(source) = &err {
                tracing::error!(error = ?source, "Service operation failed");
            }
            ServiceResponse::err(err.public_message())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::TuinDb;

    pub fn context() -> ServiceContext {
        let db = TuinDb::new_in_memory().expect("in-memory db");
        ServiceContext::with_defaults(DbHandle::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let response = envelope::<i32>(Ok(5));
        assert!(response.success);
        assert_eq!(response.data, Some(5));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_envelope_hides_database_details() {
        let response =
            envelope::<i32>(Err(ServiceError::Database(anyhow::anyhow!("disk I/O error"))));
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("An unexpected error occurred")
        );
    }

    #[test]
    fn test_envelope_not_found_message() {
        let response = envelope::<i32>(Err(ServiceError::not_found("Garden", 42)));
        assert_eq!(
            response.error.as_deref(),
            Some("Garden with ID 42 not found")
        );
    }

    #[test]
    fn test_caller_scope() {
        let caller = Caller {
            user_id: Some(2),
            scope: AccessScope::Gardens(vec![1, 3]),
        };
        assert!(caller.ensure_garden(3).is_ok());
        assert!(matches!(
            caller.ensure_garden(2),
            Err(ServiceError::Forbidden)
        ));
        assert_eq!(caller.garden_filter(), Some(vec![1, 3]));
        assert_eq!(Caller::system().garden_filter(), None);
    }
}
