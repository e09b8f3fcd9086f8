use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::access::{Role, UserStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Garden {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub total_area: Option<String>,
    pub length: Option<String>,
    pub width: Option<String>,
    pub garden_type: Option<String>,
    pub maintenance_level: Option<String>,
    pub soil_type: Option<String>,
    pub watering_system: Option<String>,
    pub established_date: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SunExposure {
    #[serde(rename = "full-sun")]
    FullSun,
    #[serde(rename = "partial-sun")]
    PartialSun,
    #[serde(rename = "shade")]
    Shade,
}

impl SunExposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullSun => "full-sun",
            Self::PartialSun => "partial-sun",
            Self::Shade => "shade",
        }
    }
}

impl FromStr for SunExposure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-sun" | "full_sun" => Ok(Self::FullSun),
            "partial-sun" | "partial_sun" => Ok(Self::PartialSun),
            "shade" => Ok(Self::Shade),
            _ => Err(format!("Invalid sun exposure: {}", s)),
        }
    }
}

/// A subdivision of a garden ("plantvak"), identified by its letter code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantBed {
    pub id: i64,
    pub garden_id: i64,
    pub letter_code: String,
    pub name: String,
    pub location: Option<String>,
    pub size: Option<String>,
    pub soil_type: Option<String>,
    pub sun_exposure: Option<SunExposure>,
    pub description: Option<String>,
    pub season_year: Option<i32>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlantStatus {
    #[default]
    Healthy,
    NeedsAttention,
    Diseased,
    Dead,
    Harvested,
}

impl PlantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::NeedsAttention => "needs_attention",
            Self::Diseased => "diseased",
            Self::Dead => "dead",
            Self::Harvested => "harvested",
        }
    }
}

impl FromStr for PlantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(Self::Healthy),
            "needs_attention" => Ok(Self::NeedsAttention),
            "diseased" => Ok(Self::Diseased),
            "dead" => Ok(Self::Dead),
            "harvested" => Ok(Self::Harvested),
            _ => Err(format!("Invalid plant status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub id: i64,
    pub plant_bed_id: i64,
    pub name: String,
    pub scientific_name: Option<String>,
    pub variety: Option<String>,
    pub color: Option<String>,
    pub height: Option<f64>,
    pub plants_per_sqm: Option<i64>,
    pub sun_preference: Option<SunExposure>,
    pub planting_date: Option<String>,
    pub expected_harvest_date: Option<String>,
    pub status: PlantStatus,
    pub notes: Option<String>,
    pub care_instructions: Option<String>,
    pub watering_frequency: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogbookEntry {
    pub id: i64,
    pub plant_bed_id: i64,
    pub plant_id: Option<i64>,
    pub entry_date: String,
    pub notes: String,
    pub photo_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Watering,
    Fertilizing,
    Pruning,
    Harvesting,
    Planting,
    PestControl,
    #[default]
    General,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watering => "watering",
            Self::Fertilizing => "fertilizing",
            Self::Pruning => "pruning",
            Self::Harvesting => "harvesting",
            Self::Planting => "planting",
            Self::PestControl => "pest_control",
            Self::General => "general",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watering" => Ok(Self::Watering),
            "fertilizing" => Ok(Self::Fertilizing),
            "pruning" => Ok(Self::Pruning),
            "harvesting" => Ok(Self::Harvesting),
            "planting" => Ok(Self::Planting),
            "pest_control" => Ok(Self::PestControl),
            "general" => Ok(Self::General),
            _ => Err(format!("Invalid task type: {}", s)),
        }
    }
}

/// A unit of garden work. Attached to a plant, a plant bed, or both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub plant_id: Option<i64>,
    pub plant_bed_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: String,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    /// Estimated duration in minutes.
    pub estimated_minutes: Option<i64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub status: UserStatus,
    pub garden_access: Vec<i64>,
    pub force_password_change: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
