use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tuin_common::Task;

use super::validation::{clean, validate_date, validate_id, validate_optional};
use super::{Caller, PlantBedService, PlantService, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::models::{NewTask, TaskFilter, TaskInput};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub due_today: usize,
    /// Open tasks due within the next 7 days, excluding today
    pub upcoming: usize,
    pub completion_rate: u32,
    pub plants_with_tasks: usize,
    pub completed_this_week: usize,
    pub total_estimated_minutes: i64,
}

impl TaskStats {
    /// Summarise `tasks` as seen on `today`.
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let week_ahead = today + Duration::days(7);
        let week_ago = today - Duration::days(6);
        let mut stats = TaskStats {
            total: tasks.len(),
            ..Self::default()
        };
        let mut plants = HashSet::new();

        for task in tasks {
            if let Some(plant_id) = task.plant_id {
                plants.insert(plant_id);
            }
            if task.completed {
                stats.completed += 1;
                let finished = task.completed_at.as_deref().and_then(date_prefix);
                if finished.is_some_and(|d| d >= week_ago && d <= today) {
                    stats.completed_this_week += 1;
                }
                continue;
            }
            stats.pending += 1;
            stats.total_estimated_minutes += task.estimated_minutes.unwrap_or(0);
            match date_prefix(&task.due_date) {
                Some(due) if due < today => stats.overdue += 1,
                Some(due) if due == today => stats.due_today += 1,
                Some(due) if due <= week_ahead => stats.upcoming += 1,
                _ => {}
            }
        }

        stats.plants_with_tasks = plants.len();
        stats.completion_rate = if stats.total == 0 {
            0
        } else {
            ((stats.completed as f64 / stats.total as f64) * 100.0).round() as u32
        };
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub day_name: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCalendar {
    pub week_start: String,
    pub week_end: String,
    pub week_number: u32,
    pub days: Vec<CalendarDay>,
}

impl WeeklyCalendar {
    /// Seven days from `week_start`, each with the tasks due that day.
    pub fn build(week_start: NaiveDate, tasks: &[Task]) -> Self {
        let days = (0..7)
            .map(|offset| {
                let date = week_start + Duration::days(offset);
                CalendarDay {
                    date: date.format("%Y-%m-%d").to_string(),
                    day_name: date.format("%A").to_string(),
                    tasks: tasks
                        .iter()
                        .filter(|t| date_prefix(&t.due_date) == Some(date))
                        .cloned()
                        .collect(),
                }
            })
            .collect();
        Self {
            week_start: week_start.format("%Y-%m-%d").to_string(),
            week_end: (week_start + Duration::days(6)).format("%Y-%m-%d").to_string(),
            week_number: week_start.iso_week().week(),
            days,
        }
    }
}

fn date_prefix(value: &str) -> Option<NaiveDate> {
    value
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

#[derive(Clone)]
pub struct TaskService {
    ctx: ServiceContext,
    beds: PlantBedService,
    plants: PlantService,
}

impl TaskService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            beds: PlantBedService::new(ctx.clone()),
            plants: PlantService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn create(&self, caller: &Caller, input: TaskInput) -> ServiceResult<Task> {
        let title = clean(input.title.as_ref())
            .ok_or_else(|| ServiceError::validation("title", "Task title is required"))?;
        let due_date = clean(input.due_date.as_ref())
            .ok_or_else(|| ServiceError::validation("due_date", "Due date is required"))?;
        validate_date(&due_date, "due_date")?;
        let description = clean(input.description.as_ref());
        let notes = clean(input.notes.as_ref());
        self.validate_text(Some(&title), description.as_deref(), notes.as_deref())?;
        check_minutes(input.estimated_minutes)?;

        let plant_bed_id = self
            .resolve_plant_bed(caller, input.plant_id, input.plant_bed_id)
            .await?
            .ok_or_else(|| {
                ServiceError::validation("plant_bed_id", "Either a plant or a plant bed is required")
            })?;

        let task = NewTask {
            plant_id: input.plant_id,
            plant_bed_id,
            title,
            description,
            due_date,
            priority: input.priority.unwrap_or_default(),
            task_type: input.task_type.unwrap_or_default(),
            estimated_minutes: input.estimated_minutes,
            notes,
        };
        let task = self
            .ctx
            .db
            .call(move |db| db.create_task(&task).map_err(ServiceError::from))
            .await?;
        tracing::info!(task_id = task.id, plant_bed_id, "Task created");
        self.ctx
            .audit
            .log_user_action(caller.user_id, "create", "tasks", json!({ "task_id": task.id }));
        Ok(task)
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<Task> {
        validate_id(id, "id")?;
        let task = self.load(caller, id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "tasks", "read", Some(id));
        Ok(task)
    }

    pub async fn update(&self, caller: &Caller, id: i64, input: TaskInput) -> ServiceResult<Task> {
        validate_id(id, "id")?;
        if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("title", "Task title is required"));
        }
        let mut input = TaskInput {
            title: clean(input.title.as_ref()),
            description: clean(input.description.as_ref()),
            due_date: clean(input.due_date.as_ref()),
            notes: clean(input.notes.as_ref()),
            ..input
        };
        if let Some(due) = input.due_date.as_deref() {
            validate_date(due, "due_date")?;
        }
        self.validate_text(
            input.title.as_deref(),
            input.description.as_deref(),
            input.notes.as_deref(),
        )?;
        check_minutes(input.estimated_minutes)?;
        self.load(caller, id).await?;
        if input.plant_id.is_some() || input.plant_bed_id.is_some() {
            input.plant_bed_id = self
                .resolve_plant_bed(caller, input.plant_id, input.plant_bed_id)
                .await?;
        }

        let task = self
            .ctx
            .db
            .call(move |db| db.update_task(id, &input).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "update", "tasks", json!({ "task_id": id }));
        Ok(task)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        self.load(caller, id).await?;
        self.ctx
            .db
            .call(move |db| db.delete_task(id).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "delete", "tasks", json!({ "task_id": id }));
        Ok(true)
    }

    /// Mark a task done or reopen it; `completed_at` follows the flag.
    pub async fn complete(&self, caller: &Caller, id: i64, completed: bool) -> ServiceResult<Task> {
        validate_id(id, "id")?;
        self.load(caller, id).await?;
        let task = self
            .ctx
            .db
            .call(move |db| db.set_task_completed(id, completed).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Task", id))?;
        self.ctx.audit.log_user_action(
            caller.user_id,
            if completed { "complete" } else { "reopen" },
            "tasks",
            json!({ "task_id": id }),
        );
        Ok(task)
    }

    pub async fn bulk_complete(&self, caller: &Caller, ids: Vec<i64>) -> ServiceResult<usize> {
        self.check_bulk(caller, &ids).await?;
        let audit_ids = ids.clone();
        let count = self
            .ctx
            .db
            .call(move |db| db.bulk_complete_tasks(&ids).map_err(ServiceError::from))
            .await?;
        self.ctx.audit.log_user_action(
            caller.user_id,
            "bulk_complete",
            "tasks",
            json!({ "task_ids": audit_ids, "count": count }),
        );
        Ok(count)
    }

    pub async fn bulk_delete(&self, caller: &Caller, ids: Vec<i64>) -> ServiceResult<usize> {
        self.check_bulk(caller, &ids).await?;
        let audit_ids = ids.clone();
        let count = self
            .ctx
            .db
            .call(move |db| db.bulk_delete_tasks(&ids).map_err(ServiceError::from))
            .await?;
        self.ctx.audit.log_user_action(
            caller.user_id,
            "bulk_delete",
            "tasks",
            json!({ "task_ids": audit_ids, "count": count }),
        );
        Ok(count)
    }

    /// Tasks matching `filter` within the caller's gardens.
    pub async fn list(&self, caller: &Caller, filter: TaskFilter) -> ServiceResult<Vec<Task>> {
        for id in [filter.garden_id, filter.plant_bed_id, filter.plant_id]
            .into_iter()
            .flatten()
        {
            validate_id(id, "id")?;
        }
        let filter = TaskFilter {
            garden_ids: caller.garden_filter(),
            ..filter
        };
        let tasks = self
            .ctx
            .db
            .call(move |db| db.list_tasks(&filter).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "tasks", "list", None);
        Ok(tasks)
    }

    pub async fn today(&self, caller: &Caller, today: NaiveDate) -> ServiceResult<Vec<Task>> {
        let day = today.format("%Y-%m-%d").to_string();
        self.list(
            caller,
            TaskFilter {
                completed: Some(false),
                due_from: Some(day.clone()),
                due_to: Some(day),
                ..TaskFilter::default()
            },
        )
        .await
    }

    /// Open tasks due before `today`.
    pub async fn overdue(&self, caller: &Caller, today: NaiveDate) -> ServiceResult<Vec<Task>> {
        let yesterday = (today - Duration::days(1)).format("%Y-%m-%d").to_string();
        self.list(
            caller,
            TaskFilter {
                completed: Some(false),
                due_to: Some(yesterday),
                ..TaskFilter::default()
            },
        )
        .await
    }

    pub async fn for_plant_bed(&self, caller: &Caller, plant_bed_id: i64) -> ServiceResult<Vec<Task>> {
        validate_id(plant_bed_id, "plant_bed_id")?;
        self.beds.load(caller, plant_bed_id).await?;
        self.list(
            caller,
            TaskFilter {
                plant_bed_id: Some(plant_bed_id),
                ..TaskFilter::default()
            },
        )
        .await
    }

    pub async fn stats(&self, caller: &Caller, today: NaiveDate) -> ServiceResult<TaskStats> {
        let tasks = self.list(caller, TaskFilter::default()).await?;
        Ok(TaskStats::compute(&tasks, today))
    }

    pub async fn weekly_calendar(
        &self,
        caller: &Caller,
        week_start: NaiveDate,
    ) -> ServiceResult<WeeklyCalendar> {
        let tasks = self
            .list(
                caller,
                TaskFilter {
                    due_from: Some(week_start.format("%Y-%m-%d").to_string()),
                    due_to: Some((week_start + Duration::days(6)).format("%Y-%m-%d").to_string()),
                    ..TaskFilter::default()
                },
            )
            .await?;
        Ok(WeeklyCalendar::build(week_start, &tasks))
    }

    /// Plant bed for a task: the given bed, or the plant's bed. When both
    /// are given they must agree.
    async fn resolve_plant_bed(
        &self,
        caller: &Caller,
        plant_id: Option<i64>,
        plant_bed_id: Option<i64>,
    ) -> ServiceResult<Option<i64>> {
        let from_plant = match plant_id {
            Some(id) => {
                validate_id(id, "plant_id")?;
                Some(self.plants.load(caller, id).await?.plant_bed_id)
            }
            None => None,
        };
        match (from_plant, plant_bed_id) {
            (Some(a), Some(b)) if a != b => Err(ServiceError::validation(
                "plant_id",
                "Plant does not belong to the selected plant bed",
            )),
            (_, Some(bed)) => {
                validate_id(bed, "plant_bed_id")?;
                self.beds.load(caller, bed).await?;
                Ok(Some(bed))
            }
            (Some(bed), None) => Ok(Some(bed)),
            (None, None) => Ok(None),
        }
    }

    async fn check_bulk(&self, caller: &Caller, ids: &[i64]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Err(ServiceError::validation("ids", "At least one task ID is required"));
        }
        for &id in ids {
            validate_id(id, "ids")?;
            self.load(caller, id).await?;
        }
        Ok(())
    }

    async fn load(&self, caller: &Caller, id: i64) -> ServiceResult<Task> {
        let task = self
            .ctx
            .db
            .call(move |db| db.get_task(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Task", id))?;
        // Stored tasks always carry their bed
        let bed = task
            .plant_bed_id
            .ok_or_else(|| ServiceError::not_found("Task", id))?;
        let garden_id = self
            .ctx
            .db
            .call(move |db| db.garden_id_for_plant_bed(bed).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Plant bed", bed))?;
        caller.ensure_garden(garden_id)?;
        Ok(task)
    }

    fn validate_text(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        notes: Option<&str>,
    ) -> ServiceResult<()> {
        let max = self.ctx.max_input_length;
        validate_optional(title, "title", max)?;
        validate_optional(description, "description", max)?;
        validate_optional(notes, "notes", max)?;
        Ok(())
    }
}

fn check_minutes(minutes: Option<i64>) -> ServiceResult<()> {
    if minutes.is_some_and(|m| m < 0) {
        return Err(ServiceError::validation(
            "estimated_minutes",
            "Estimated minutes cannot be negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::context;
    use crate::services::GardenService;
    use crate::store::models::{GardenInput, PlantBedInput, PlantInput};
    use tuin_common::{AccessScope, TaskPriority, TaskType};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(id: i64, due: &str, completed: bool, completed_at: Option<&str>) -> Task {
        Task {
            id,
            plant_id: Some(id % 2),
            plant_bed_id: Some(1),
            title: format!("taak {id}"),
            description: None,
            due_date: due.to_string(),
            completed,
            completed_at: completed_at.map(str::to_string),
            priority: TaskPriority::Medium,
            task_type: TaskType::General,
            estimated_minutes: Some(15),
            notes: None,
            created_at: "2026-04-01 08:00:00".to_string(),
            updated_at: "2026-04-01 08:00:00".to_string(),
        }
    }

    #[test]
    fn test_stats_buckets() {
        let today = date("2026-04-15");
        let tasks = vec![
            task(1, "2026-04-10", false, None),
            task(2, "2026-04-15", false, None),
            task(3, "2026-04-20", false, None),
            task(4, "2026-05-30", false, None),
            task(5, "2026-04-12", true, Some("2026-04-14 10:00:00")),
            task(6, "2026-03-01", true, Some("2026-03-02 10:00:00")),
        ];
        let stats = TaskStats::compute(&tasks, today);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.due_today, 1);
        assert_eq!(stats.upcoming, 1);
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(stats.completed_this_week, 1);
        assert_eq!(stats.plants_with_tasks, 2);
        assert_eq!(stats.total_estimated_minutes, 60);
    }

    #[test]
    fn test_stats_empty() {
        let stats = TaskStats::compute(&[], date("2026-04-15"));
        assert_eq!(stats, TaskStats::default());
    }

    #[test]
    fn test_weekly_calendar_shape() {
        let start = date("2026-04-13");
        let tasks = vec![task(1, "2026-04-13", false, None), task(2, "2026-04-19", false, None)];
        let calendar = WeeklyCalendar::build(start, &tasks);
        assert_eq!(calendar.week_end, "2026-04-19");
        assert_eq!(calendar.week_number, 16);
        assert_eq!(calendar.days.len(), 7);
        assert_eq!(calendar.days[0].day_name, "Monday");
        assert_eq!(calendar.days[0].tasks.len(), 1);
        assert_eq!(calendar.days[6].day_name, "Sunday");
        assert_eq!(calendar.days[6].tasks.len(), 1);
        assert!(calendar.days[3].tasks.is_empty());
    }

    struct Fixture {
        service: TaskService,
        garden_id: i64,
        bed_id: i64,
        plant_id: i64,
    }

    async fn setup() -> Fixture {
        let ctx = context();
        let caller = Caller::system();
        let garden = GardenService::new(ctx.clone())
            .create(
                &caller,
                GardenInput {
                    name: Some("Hof".to_string()),
                    location: Some("Delft".to_string()),
                    ..GardenInput::default()
                },
            )
            .await
            .unwrap();
        let bed = PlantBedService::new(ctx.clone())
            .create(&caller, garden.id, PlantBedInput::default())
            .await
            .unwrap();
        let plant = PlantService::new(ctx.clone())
            .create(
                &caller,
                bed.id,
                PlantInput {
                    name: Some("Sla".to_string()),
                    ..PlantInput::default()
                },
            )
            .await
            .unwrap();
        Fixture {
            service: TaskService::new(ctx),
            garden_id: garden.id,
            bed_id: bed.id,
            plant_id: plant.id,
        }
    }

    fn input(title: &str, due: &str) -> TaskInput {
        TaskInput {
            title: Some(title.to_string()),
            due_date: Some(due.to_string()),
            ..TaskInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = setup().await;
        let caller = Caller::system();
        let err = f
            .service
            .create(&caller, input("", "2026-04-01"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Task title is required");
        let err = f
            .service
            .create(&caller, TaskInput { due_date: None, ..input("Water", "") })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Due date is required");
        let err = f
            .service
            .create(&caller, input("Water", "2026-04-01"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Either a plant or a plant bed is required");
        let err = f
            .service
            .create(
                &caller,
                TaskInput {
                    plant_bed_id: Some(f.bed_id),
                    estimated_minutes: Some(-5),
                    ..input("Water", "2026-04-01")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_task_for_plant_gets_its_bed() {
        let f = setup().await;
        let task = f
            .service
            .create(
                &Caller::system(),
                TaskInput {
                    plant_id: Some(f.plant_id),
                    ..input("Oogsten", "2026-04-01")
                },
            )
            .await
            .unwrap();
        assert_eq!(task.plant_bed_id, Some(f.bed_id));
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.task_type, TaskType::General);
    }

    #[tokio::test]
    async fn test_complete_and_reopen() {
        let f = setup().await;
        let caller = Caller::system();
        let task = f
            .service
            .create(
                &caller,
                TaskInput {
                    plant_bed_id: Some(f.bed_id),
                    ..input("Snoeien", "2026-04-01")
                },
            )
            .await
            .unwrap();
        let done = f.service.complete(&caller, task.id, true).await.unwrap();
        assert!(done.completed && done.completed_at.is_some());
        let reopened = f.service.complete(&caller, task.id, false).await.unwrap();
        assert!(!reopened.completed && reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_today_overdue_and_bulk() {
        let f = setup().await;
        let caller = Caller::system();
        let mut ids = Vec::new();
        for due in ["2026-04-10", "2026-04-15", "2026-04-16"] {
            let t = f
                .service
                .create(
                    &caller,
                    TaskInput {
                        plant_bed_id: Some(f.bed_id),
                        ..input("Water", due)
                    },
                )
                .await
                .unwrap();
            ids.push(t.id);
        }
        let today = date("2026-04-15");
        assert_eq!(f.service.today(&caller, today).await.unwrap().len(), 1);
        let overdue = f.service.overdue(&caller, today).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, ids[0]);

        assert_eq!(f.service.bulk_complete(&caller, ids.clone()).await.unwrap(), 3);
        assert!(f.service.overdue(&caller, today).await.unwrap().is_empty());
        let stats = f.service.stats(&caller, today).await.unwrap();
        assert_eq!(stats.completion_rate, 100);

        assert!(matches!(
            f.service.bulk_delete(&caller, vec![]).await,
            Err(ServiceError::Validation { .. })
        ));
        assert_eq!(f.service.bulk_delete(&caller, ids).await.unwrap(), 3);
        assert!(f.service.for_plant_bed(&caller, f.bed_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_scoped_to_gardens() {
        let f = setup().await;
        f.service
            .create(
                &Caller::system(),
                TaskInput {
                    plant_bed_id: Some(f.bed_id),
                    ..input("Water", "2026-04-01")
                },
            )
            .await
            .unwrap();
        let member = Caller {
            user_id: Some(2),
            scope: AccessScope::Gardens(vec![f.garden_id]),
        };
        let outsider = Caller {
            user_id: Some(3),
            scope: AccessScope::Gardens(vec![]),
        };
        assert_eq!(
            f.service.list(&member, TaskFilter::default()).await.unwrap().len(),
            1
        );
        assert!(
            f.service
                .list(&outsider, TaskFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }
}
