use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tuin_common::{PaginationParams, Permission, ServiceResponse, SortDirection, SortOptions};

use super::auth::CurrentUser;
use super::{dashboard, webhook};
use crate::errors::ServiceError;
use crate::services::{
    GardenService, LogbookService, PlantBedService, PlantService, ServiceContext, TaskService,
    UserService,
};
use crate::store::DbHandle;
use crate::store::models::{
    GardenInput, LogbookFilter, LogbookInput, NewUserRequest, PlantBedInput, PlantInput, TaskFilter,
    TaskInput, UserPatch,
};
use crate::tools::build_monitor::BuildMonitor;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub gardens: GardenService,
    pub plant_beds: PlantBedService,
    pub plants: PlantService,
    pub logbook: LogbookService,
    pub tasks: TaskService,
    pub users: UserService,
    pub webhook_secret: Option<String>,
    /// Runs build analysis for failed deployments; `None` disables it
    pub build_monitor: Option<BuildMonitor>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        ctx: ServiceContext,
        webhook_secret: Option<String>,
        build_monitor: Option<BuildMonitor>,
    ) -> Self {
        Self {
            db: ctx.db.clone(),
            gardens: GardenService::new(ctx.clone()),
            plant_beds: PlantBedService::new(ctx.clone()),
            plants: PlantService::new(ctx.clone()),
            logbook: LogbookService::new(ctx.clone()),
            tasks: TaskService::new(ctx.clone()),
            users: UserService::new(ctx),
            webhook_secret,
            build_monitor,
        }
    }
}

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GardenListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<SortDirection>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    #[serde(default = "default_true")]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub affected: usize,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub week_start: Option<NaiveDate>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    BadRequest(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, field) = match self {
            ApiError::Service(err) => {
                let status = match &err {
                    ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,
                    ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
                    ServiceError::Conflict(_) => StatusCode::CONFLICT,
                    ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
                    ServiceError::Forbidden => StatusCode::FORBIDDEN,
                    ServiceError::Database(source) => {
                        tracing::error!(error = ?source, "Request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                let field = match &err {
                    ServiceError::Validation { field, .. } => Some(field.clone()),
                    _ => None,
                };
                (status, err.public_message(), field)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
        };

        let mut body = serde_json::to_value(ServiceResponse::<()>::err(message))
            .unwrap_or_else(|_| serde_json::json!({ "success": false }));
        if let Some(field) = field {
            body["field"] = serde_json::Value::String(field);
        }
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

// ── Extractors ────────────────────────────────────────────────────────
// axum's extractors with their rejections rendered as the JSON envelope.

#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

fn ok<T: Serialize>(data: T) -> Json<ServiceResponse<T>> {
    Json(ServiceResponse::ok(data))
}

fn created<T: Serialize>(data: T) -> (StatusCode, Json<ServiceResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/gardens", get(list_gardens).post(create_garden))
        .route(
            "/api/gardens/{id}",
            get(get_garden).patch(update_garden).delete(delete_garden),
        )
        .route(
            "/api/gardens/{id}/plant-beds",
            get(list_plant_beds).post(create_plant_bed),
        )
        .route(
            "/api/plant-beds/{id}",
            get(get_plant_bed)
                .patch(update_plant_bed)
                .delete(delete_plant_bed),
        )
        .route(
            "/api/plant-beds/{id}/plants",
            get(list_plants).post(create_plant),
        )
        .route(
            "/api/plants/{id}",
            get(get_plant).patch(update_plant).delete(delete_plant),
        )
        .route("/api/logbook", get(list_logbook).post(create_logbook_entry))
        .route(
            "/api/logbook/{id}",
            get(get_logbook_entry)
                .patch(update_logbook_entry)
                .delete(delete_logbook_entry),
        )
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/stats", get(task_stats))
        .route("/api/tasks/today", get(tasks_today))
        .route("/api/tasks/overdue", get(tasks_overdue))
        .route("/api/tasks/calendar", get(task_calendar))
        .route("/api/tasks/bulk-complete", post(bulk_complete_tasks))
        .route("/api/tasks/bulk-delete", post(bulk_delete_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/complete", post(complete_task))
        .route("/api/admin/users", get(list_users).post(create_user))
        .route(
            "/api/admin/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route(
            "/api/webhooks/vercel-build",
            get(webhook::verify_endpoint).post(webhook::receive),
        )
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

// Gardens

async fn list_gardens(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<GardenListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::GardensView)?;
    let params = PaginationParams {
        page: query.page,
        page_size: query.page_size,
    };
    let sort = query.sort_field.map(|field| SortOptions {
        field,
        direction: query.sort_direction.unwrap_or_default(),
    });
    let page = state
        .gardens
        .get_all(
            &user.caller(),
            &params,
            query.search.as_deref(),
            sort.as_ref(),
        )
        .await?;
    Ok(ok(page))
}

async fn create_garden(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<GardenInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::GardensCreate)?;
    let garden = state.gardens.create(&user.caller(), req).await?;
    Ok(created(garden))
}

async fn get_garden(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::GardensView)?;
    Ok(ok(state.gardens.get_by_id(&user.caller(), id).await?))
}

async fn update_garden(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<GardenInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::GardensEdit)?;
    Ok(ok(state.gardens.update(&user.caller(), id, req).await?))
}

async fn delete_garden(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::GardensDelete)?;
    Ok(ok(state.gardens.delete(&user.caller(), id).await?))
}

// Plant beds

async fn list_plant_beds(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(garden_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantBedsView)?;
    Ok(ok(state
        .plant_beds
        .get_by_garden(&user.caller(), garden_id)
        .await?))
}

async fn create_plant_bed(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(garden_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PlantBedInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantBedsCreate)?;
    let bed = state
        .plant_beds
        .create(&user.caller(), garden_id, req)
        .await?;
    Ok(created(bed))
}

async fn get_plant_bed(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantBedsView)?;
    Ok(ok(state
        .plant_beds
        .get_with_garden(&user.caller(), id)
        .await?))
}

async fn update_plant_bed(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PlantBedInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantBedsEdit)?;
    Ok(ok(state.plant_beds.update(&user.caller(), id, req).await?))
}

async fn delete_plant_bed(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantBedsDelete)?;
    Ok(ok(state.plant_beds.delete(&user.caller(), id).await?))
}

// Plants

async fn list_plants(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(plant_bed_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantsView)?;
    Ok(ok(state
        .plants
        .list_for_bed(&user.caller(), plant_bed_id)
        .await?))
}

async fn create_plant(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(plant_bed_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PlantInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantsCreate)?;
    let plant = state
        .plants
        .create(&user.caller(), plant_bed_id, req)
        .await?;
    Ok(created(plant))
}

async fn get_plant(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantsView)?;
    Ok(ok(state.plants.get_by_id(&user.caller(), id).await?))
}

async fn update_plant(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<PlantInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantsEdit)?;
    Ok(ok(state.plants.update(&user.caller(), id, req).await?))
}

async fn delete_plant(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::PlantsDelete)?;
    Ok(ok(state.plants.delete(&user.caller(), id).await?))
}

// Logbook

async fn list_logbook(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiQuery(filter): ApiQuery<LogbookFilter>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::LogbookView)?;
    Ok(ok(state.logbook.get_all(&user.caller(), filter).await?))
}

async fn create_logbook_entry(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<LogbookInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::LogbookCreate)?;
    Ok(created(state.logbook.create(&user.caller(), req).await?))
}

async fn get_logbook_entry(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::LogbookView)?;
    Ok(ok(state.logbook.get_by_id(&user.caller(), id).await?))
}

async fn update_logbook_entry(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<LogbookInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::LogbookEdit)?;
    Ok(ok(state.logbook.update(&user.caller(), id, req).await?))
}

async fn delete_logbook_entry(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::LogbookDelete)?;
    Ok(ok(state.logbook.delete(&user.caller(), id).await?))
}

// Tasks

async fn list_tasks(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    Ok(ok(state.tasks.list(&user.caller(), filter).await?))
}

async fn create_task(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<TaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksCreate)?;
    Ok(created(state.tasks.create(&user.caller(), req).await?))
}

async fn task_stats(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    Ok(ok(state.tasks.stats(&user.caller(), today()).await?))
}

async fn tasks_today(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    Ok(ok(state.tasks.today(&user.caller(), today()).await?))
}

async fn tasks_overdue(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    Ok(ok(state.tasks.overdue(&user.caller(), today()).await?))
}

/// Defaults to the Monday of the current week.
async fn task_calendar(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiQuery(query): ApiQuery<CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    let week_start = query.week_start.unwrap_or_else(|| {
        let now = today();
        now - Duration::days(now.weekday().num_days_from_monday() as i64)
    });
    Ok(ok(state
        .tasks
        .weekly_calendar(&user.caller(), week_start)
        .await?))
}

async fn bulk_complete_tasks(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<BulkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksComplete)?;
    let affected = state.tasks.bulk_complete(&user.caller(), req.ids).await?;
    Ok(ok(BulkResult { affected }))
}

async fn bulk_delete_tasks(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<BulkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksDelete)?;
    let affected = state.tasks.bulk_delete(&user.caller(), req.ids).await?;
    Ok(ok(BulkResult { affected }))
}

async fn get_task(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksView)?;
    Ok(ok(state.tasks.get_by_id(&user.caller(), id).await?))
}

async fn update_task(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<TaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksEdit)?;
    Ok(ok(state.tasks.update(&user.caller(), id, req).await?))
}

async fn delete_task(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksDelete)?;
    Ok(ok(state.tasks.delete(&user.caller(), id).await?))
}

async fn complete_task(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    body: Result<Option<Json<CompleteRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::TasksComplete)?;
    let completed = body?.map(|Json(b)| b.completed).unwrap_or(true);
    Ok(ok(state.tasks.complete(&user.caller(), id, completed).await?))
}

// Users

async fn list_users(
    State(state): State<SharedState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::UsersView)?;
    Ok(ok(state.users.list(&user.caller()).await?))
}

async fn create_user(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::UsersInvite)?;
    Ok(created(state.users.create(&user.caller(), req).await?))
}

async fn get_user(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::UsersView)?;
    Ok(ok(state.users.get_by_id(&user.caller(), id).await?))
}

async fn update_user(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UserPatch>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::UsersManage)?;
    Ok(ok(state.users.update(&user.caller(), id, req).await?))
}

async fn delete_user(
    State(state): State<SharedState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(Permission::UsersManage)?;
    if id == user.0.id {
        return Err(ApiError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    Ok(ok(state.users.delete(&user.caller(), id).await?))
}

// ── Tests ─────────────────────────────────────────────────────────────
