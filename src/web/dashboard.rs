//! One dashboard route, two views: administrators get garden-wide
//! counts and management controls, members get their own task overview.

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tuin_common::{ServiceResponse, Task};

use super::api::{ApiError, SharedState};
use super::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::services::Caller;
use crate::services::tasks::TaskStats;
use crate::store::models::TaskFilter;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminStats {
    pub gardens: u64,
    pub plant_beds: u64,
    pub plants: u64,
    pub open_tasks: u64,
    pub users: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserStats {
    pub my_open_tasks: usize,
    pub due_today: usize,
    pub overdue: usize,
    pub completed_this_week: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Admin {
        stats: AdminStats,
        labels: Vec<&'static str>,
        controls: Vec<&'static str>,
    },
    User {
        stats: UserStats,
        labels: Vec<&'static str>,
        tasks: Vec<Task>,
    },
}

pub async fn build_dashboard(
    state: &SharedState,
    user: &CurrentUser,
    today: NaiveDate,
) -> Result<Dashboard, ServiceError> {
    if user.0.is_admin() {
        let stats = state
            .db
            .call(|db| {
                let open_tasks = db
                    .list_tasks(&TaskFilter {
                        completed: Some(false),
                        ..TaskFilter::default()
                    })?
                    .len() as u64;
                Ok::<_, anyhow::Error>(AdminStats {
                    gardens: db.count_gardens()?,
                    plant_beds: db.count_plant_beds()?,
                    plants: db.count_plants()?,
                    open_tasks,
                    users: db.count_users()?,
                })
            })
            .await?;
        return Ok(Dashboard::Admin {
            stats,
            labels: vec!["Gardens", "Plant beds", "Plants", "Open tasks", "Users"],
            controls: vec!["create_garden", "manage_users"],
        });
    }

    let caller: Caller = user.caller();
    let tasks = state.tasks.list(&caller, TaskFilter::default()).await?;
    let summary = TaskStats::compute(&tasks, today);
    let open: Vec<Task> = tasks.into_iter().filter(|t| !t.completed).collect();
    Ok(Dashboard::User {
        stats: UserStats {
            my_open_tasks: open.len(),
            due_today: summary.due_today,
            overdue: summary.overdue,
            completed_this_week: summary.completed_this_week,
        },
        labels: vec!["My open tasks", "Due today", "Overdue", "Completed this week"],
        tasks: open,
    })
}

pub async fn get_dashboard(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = build_dashboard(&state, &user, Local::now().date_naive()).await?;
    Ok(Json(ServiceResponse::ok(dashboard)))
}
