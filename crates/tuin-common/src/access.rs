//! Roles, permissions and garden access scopes.
//!
//! | Role    | Permissions                                                        |
//! |---------|--------------------------------------------------------------------|
//! | `admin` | every permission                                                   |
//! | `user`  | view gardens/beds/plants/tasks/logbook, complete tasks, add logbook |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    /// Permissions granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::Admin => Permission::ALL,
            Self::User => &[
                Permission::GardensView,
                Permission::PlantBedsView,
                Permission::PlantsView,
                Permission::TasksComplete,
                Permission::TasksView,
                Permission::LogbookCreate,
                Permission::LogbookView,
            ],
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err("Role must be admin or user".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Invalid user status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "gardens.view")]
    GardensView,
    #[serde(rename = "gardens.create")]
    GardensCreate,
    #[serde(rename = "gardens.edit")]
    GardensEdit,
    #[serde(rename = "gardens.delete")]
    GardensDelete,
    #[serde(rename = "plant_beds.view")]
    PlantBedsView,
    #[serde(rename = "plant_beds.create")]
    PlantBedsCreate,
    #[serde(rename = "plant_beds.edit")]
    PlantBedsEdit,
    #[serde(rename = "plant_beds.delete")]
    PlantBedsDelete,
    #[serde(rename = "plants.view")]
    PlantsView,
    #[serde(rename = "plants.create")]
    PlantsCreate,
    #[serde(rename = "plants.edit")]
    PlantsEdit,
    #[serde(rename = "plants.delete")]
    PlantsDelete,
    #[serde(rename = "tasks.view")]
    TasksView,
    #[serde(rename = "tasks.create")]
    TasksCreate,
    #[serde(rename = "tasks.edit")]
    TasksEdit,
    #[serde(rename = "tasks.delete")]
    TasksDelete,
    #[serde(rename = "tasks.complete")]
    TasksComplete,
    #[serde(rename = "logbook.view")]
    LogbookView,
    #[serde(rename = "logbook.create")]
    LogbookCreate,
    #[serde(rename = "logbook.edit")]
    LogbookEdit,
    #[serde(rename = "logbook.delete")]
    LogbookDelete,
    #[serde(rename = "users.view")]
    UsersView,
    #[serde(rename = "users.invite")]
    UsersInvite,
    #[serde(rename = "users.manage")]
    UsersManage,
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Self::GardensView,
        Self::GardensCreate,
        Self::GardensEdit,
        Self::GardensDelete,
        Self::PlantBedsView,
        Self::PlantBedsCreate,
        Self::PlantBedsEdit,
        Self::PlantBedsDelete,
        Self::PlantsView,
        Self::PlantsCreate,
        Self::PlantsEdit,
        Self::PlantsDelete,
        Self::TasksView,
        Self::TasksCreate,
        Self::TasksEdit,
        Self::TasksDelete,
        Self::TasksComplete,
        Self::LogbookView,
        Self::LogbookCreate,
        Self::LogbookEdit,
        Self::LogbookDelete,
        Self::UsersView,
        Self::UsersInvite,
        Self::UsersManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GardensView => "gardens.view",
            Self::GardensCreate => "gardens.create",
            Self::GardensEdit => "gardens.edit",
            Self::GardensDelete => "gardens.delete",
            Self::PlantBedsView => "plant_beds.view",
            Self::PlantBedsCreate => "plant_beds.create",
            Self::PlantBedsEdit => "plant_beds.edit",
            Self::PlantBedsDelete => "plant_beds.delete",
            Self::PlantsView => "plants.view",
            Self::PlantsCreate => "plants.create",
            Self::PlantsEdit => "plants.edit",
            Self::PlantsDelete => "plants.delete",
            Self::TasksView => "tasks.view",
            Self::TasksCreate => "tasks.create",
            Self::TasksEdit => "tasks.edit",
            Self::TasksDelete => "tasks.delete",
            Self::TasksComplete => "tasks.complete",
            Self::LogbookView => "logbook.view",
            Self::LogbookCreate => "logbook.create",
            Self::LogbookEdit => "logbook.edit",
            Self::LogbookDelete => "logbook.delete",
            Self::UsersView => "users.view",
            Self::UsersInvite => "users.invite",
            Self::UsersManage => "users.manage",
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Invalid permission: {}", s))
    }
}

/// The set of gardens a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Gardens(Vec<i64>),
}

impl AccessScope {
    pub fn allows(&self, garden_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Gardens(ids) => ids.contains(&garden_id),
        }
    }

    /// Garden ids to filter on, or `None` when unrestricted.
    pub fn garden_ids(&self) -> Option<&[i64]> {
        match self {
            Self::All => None,
            Self::Gardens(ids) => Some(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_every_permission() {
        for p in Permission::ALL {
            assert!(Role::Admin.permissions().contains(p));
        }
    }

    #[test]
    fn test_user_role_is_read_mostly() {
        let perms = Role::User.permissions();
        assert!(perms.contains(&Permission::TasksComplete));
        assert!(perms.contains(&Permission::LogbookCreate));
        assert!(!perms.contains(&Permission::GardensCreate));
        assert!(!perms.contains(&Permission::UsersManage));
    }

    #[test]
    fn test_permission_from_str_matches_wire_name() {
        assert_eq!(
            Permission::from_str("plant_beds.edit").unwrap(),
            Permission::PlantBedsEdit
        );
        let json = serde_json::to_string(&Permission::TasksComplete).unwrap();
        assert_eq!(json, "\"tasks.complete\"");
    }

    #[test]
    fn test_role_error_message() {
        assert_eq!(Role::from_str("owner").unwrap_err(), "Role must be admin or user");
    }

    #[test]
    fn test_access_scope_allows() {
        assert!(AccessScope::All.allows(7));
        let scope = AccessScope::Gardens(vec![1, 2]);
        assert!(scope.allows(2));
        assert!(!scope.allows(3));
        assert_eq!(scope.garden_ids(), Some(&[1, 2][..]));
    }
}
