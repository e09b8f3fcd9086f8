//! Input and filter types accepted by the store and service layers.
//!
//! One input struct serves both create and update: on create the service
//! enforces the required fields, on update every `None` leaves the stored
//! value untouched.

use serde::{Deserialize, Serialize};
use tuin_common::{PlantStatus, Role, SortDirection, SunExposure, TaskPriority, TaskType, UserStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GardenInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub total_area: Option<String>,
    pub length: Option<String>,
    pub width: Option<String>,
    pub garden_type: Option<String>,
    pub maintenance_level: Option<String>,
    pub soil_type: Option<String>,
    pub watering_system: Option<String>,
    pub established_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantBedInput {
    pub letter_code: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub size: Option<String>,
    pub soil_type: Option<String>,
    pub sun_exposure: Option<SunExposure>,
    pub description: Option<String>,
    pub season_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlantInput {
    pub name: Option<String>,
    pub scientific_name: Option<String>,
    pub variety: Option<String>,
    pub color: Option<String>,
    pub height: Option<f64>,
    pub plants_per_sqm: Option<i64>,
    pub sun_preference: Option<SunExposure>,
    pub planting_date: Option<String>,
    pub expected_harvest_date: Option<String>,
    pub status: Option<PlantStatus>,
    pub notes: Option<String>,
    pub care_instructions: Option<String>,
    pub watering_frequency: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogbookInput {
    pub plant_bed_id: Option<i64>,
    pub plant_id: Option<i64>,
    pub entry_date: Option<String>,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    pub plant_id: Option<i64>,
    pub plant_bed_id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub estimated_minutes: Option<i64>,
    pub notes: Option<String>,
}

/// Validated task ready for insertion. `plant_bed_id` is always resolved.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub plant_id: Option<i64>,
    pub plant_bed_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub estimated_minutes: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<String>,
    pub garden_access: Option<Vec<i64>>,
}

/// Validated user ready for insertion.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: String,
    pub force_password_change: bool,
    pub garden_access: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub garden_access: Option<Vec<i64>>,
}

/// Search, sort and window for the garden listing.
#[derive(Debug, Clone, Default)]
pub struct GardenQuery {
    pub search: Option<String>,
    pub sort_field: String,
    pub direction: SortDirection,
    pub limit: u32,
    pub offset: u32,
    /// Restrict to these gardens; `None` means all
    pub garden_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogbookFilter {
    pub plant_bed_id: Option<i64>,
    pub plant_id: Option<i64>,
    pub garden_id: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    #[serde(skip)]
    pub garden_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub garden_id: Option<i64>,
    pub plant_bed_id: Option<i64>,
    pub plant_id: Option<i64>,
    pub completed: Option<bool>,
    pub priority: Option<TaskPriority>,
    /// Inclusive ISO date bounds on `due_date`
    pub due_from: Option<String>,
    pub due_to: Option<String>,
    #[serde(skip)]
    pub garden_ids: Option<Vec<i64>>,
}
