use serde_json::json;
use tuin_common::LogbookEntry;

use super::validation::{clean, validate_date, validate_id, validate_input, validate_optional};
use super::{Caller, PlantBedService, PlantService, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::models::{LogbookFilter, LogbookInput};

#[derive(Clone)]
pub struct LogbookService {
    ctx: ServiceContext,
    beds: PlantBedService,
    plants: PlantService,
}

impl LogbookService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            beds: PlantBedService::new(ctx.clone()),
            plants: PlantService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn create(&self, caller: &Caller, input: LogbookInput) -> ServiceResult<LogbookEntry> {
        let plant_bed_id = input
            .plant_bed_id
            .ok_or_else(|| ServiceError::validation("plant_bed_id", "Plant bed ID is required"))?;
        validate_id(plant_bed_id, "plant_bed_id")?;
        let notes = clean(input.notes.as_ref())
            .ok_or_else(|| ServiceError::validation("notes", "Notes are required"))?;
        let entry_date = clean(input.entry_date.as_ref())
            .ok_or_else(|| ServiceError::validation("entry_date", "Entry date is required"))?;
        validate_date(&entry_date, "entry_date")?;
        validate_input(&notes, "notes", self.ctx.max_input_length)?;
        let photo_url = clean(input.photo_url.as_ref());
        validate_optional(photo_url.as_deref(), "photo_url", self.ctx.max_input_length)?;

        let bed = self.beds.load(caller, plant_bed_id).await?;
        if !bed.is_active {
            return Err(ServiceError::not_found("Plant bed", plant_bed_id));
        }
        if let Some(plant_id) = input.plant_id {
            validate_id(plant_id, "plant_id")?;
            let plant = self.plants.load(caller, plant_id).await?;
            if plant.plant_bed_id != plant_bed_id {
                return Err(ServiceError::validation(
                    "plant_id",
                    "Plant does not belong to the selected plant bed",
                ));
            }
        }

        let plant_id = input.plant_id;
        let entry = self
            .ctx
            .db
            .call(move |db| {
                db.create_logbook_entry(
                    plant_bed_id,
                    plant_id,
                    &entry_date,
                    &notes,
                    photo_url.as_deref(),
                )
                .map_err(ServiceError::from)
            })
            .await?;
        self.ctx.audit.log_user_action(
            caller.user_id,
            "create",
            "logbook",
            json!({ "entry_id": entry.id, "plant_bed_id": plant_bed_id }),
        );
        Ok(entry)
    }

    /// Entries newest first, restricted to the caller's gardens.
    pub async fn get_all(
        &self,
        caller: &Caller,
        filter: LogbookFilter,
    ) -> ServiceResult<Vec<LogbookEntry>> {
        for (id, field) in [
            (filter.plant_bed_id, "plant_bed_id"),
            (filter.plant_id, "plant_id"),
            (filter.garden_id, "garden_id"),
        ] {
            if let Some(id) = id {
                validate_id(id, field)?;
            }
        }
        let filter = LogbookFilter {
            limit: filter.limit.map(|l| l.min(self.ctx.max_page_size).max(1)),
            garden_ids: caller.garden_filter(),
            ..filter
        };
        let entries = self
            .ctx
            .db
            .call(move |db| db.list_logbook_entries(&filter).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "logbook", "list", None);
        Ok(entries)
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<LogbookEntry> {
        validate_id(id, "id")?;
        let entry = self.load(caller, id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "logbook", "read", Some(id));
        Ok(entry)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: LogbookInput,
    ) -> ServiceResult<LogbookEntry> {
        validate_id(id, "id")?;
        if input.notes.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("notes", "Notes are required"));
        }
        let input = LogbookInput {
            notes: clean(input.notes.as_ref()),
            entry_date: clean(input.entry_date.as_ref()),
            photo_url: clean(input.photo_url.as_ref()),
            ..input
        };
        validate_optional(input.notes.as_deref(), "notes", self.ctx.max_input_length)?;
        validate_optional(input.photo_url.as_deref(), "photo_url", self.ctx.max_input_length)?;
        if let Some(date) = input.entry_date.as_deref() {
            validate_date(date, "entry_date")?;
        }
        let current = self.load(caller, id).await?;
        if let Some(plant_id) = input.plant_id {
            let plant = self.plants.load(caller, plant_id).await?;
            if plant.plant_bed_id != current.plant_bed_id {
                return Err(ServiceError::validation(
                    "plant_id",
                    "Plant does not belong to the selected plant bed",
                ));
            }
        }

        let entry = self
            .ctx
            .db
            .call(move |db| db.update_logbook_entry(id, &input).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "update", "logbook", json!({ "entry_id": id }));
        Ok(entry)
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        self.load(caller, id).await?;
        self.ctx
            .db
            .call(move |db| db.delete_logbook_entry(id).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "delete", "logbook", json!({ "entry_id": id }));
        Ok(true)
    }

    async fn load(&self, caller: &Caller, id: i64) -> ServiceResult<LogbookEntry> {
        let entry = self
            .ctx
            .db
            .call(move |db| db.get_logbook_entry(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Logbook entry", id))?;
        self.beds.load(caller, entry.plant_bed_id).await?;
        Ok(entry)
    }
}
