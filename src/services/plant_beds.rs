use serde::Serialize;
use serde_json::json;
use tuin_common::{Garden, PlantBed};

use super::validation::{clean, validate_id, validate_optional};
use super::{Caller, GardenService, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::letter_code::{is_valid_letter_code, next_letter_code};
use crate::store::models::PlantBedInput;

/// A plant bed together with the garden it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct PlantBedWithGarden {
    #[serde(flatten)]
    pub plant_bed: PlantBed,
    pub garden: Garden,
}

#[derive(Clone)]
pub struct PlantBedService {
    ctx: ServiceContext,
    gardens: GardenService,
}

impl PlantBedService {
    pub fn new(ctx: ServiceContext) -> Self {
        let gardens = GardenService::new(ctx.clone());
        Self { ctx, gardens }
    }

    /// Create a bed in an active garden. Without an explicit code the next
    /// free letter code is assigned; the name falls back to the code.
    pub async fn create(
        &self,
        caller: &Caller,
        garden_id: i64,
        input: PlantBedInput,
    ) -> ServiceResult<PlantBed> {
        validate_id(garden_id, "garden_id")?;
        caller.ensure_garden(garden_id)?;
        let input = trimmed(input);
        self.validate_fields(&input)?;
        let requested = match input.letter_code.as_deref() {
            Some(code) => Some(checked_code(code)?),
            None => None,
        };
        self.gardens.load(garden_id).await?;

        let bed = self
            .ctx
            .db
            .call(move |db| {
                let existing = db.letter_codes_for_garden(garden_id)?;
                let code = match requested {
                    Some(code) if existing.iter().any(|c| c.eq_ignore_ascii_case(&code)) => {
                        return Err(ServiceError::Conflict(format!(
                            "Letter code {} is already in use in this garden",
                            code
                        )));
                    }
                    Some(code) => code,
                    None => next_letter_code(&existing),
                };
                let name = input.name.clone().unwrap_or_else(|| code.clone());
                Ok(db.create_plant_bed(garden_id, &code, &name, &input)?)
            })
            .await?;

        tracing::info!(plant_bed_id = bed.id, garden_id, letter_code = %bed.letter_code, "Plant bed created");
        self.ctx.audit.log_user_action(
            caller.user_id,
            "create",
            "plant_beds",
            json!({ "plant_bed_id": bed.id, "garden_id": garden_id }),
        );
        Ok(bed)
    }

    /// Active beds of a garden ordered by letter code.
    pub async fn get_by_garden(&self, caller: &Caller, garden_id: i64) -> ServiceResult<Vec<PlantBed>> {
        validate_id(garden_id, "garden_id")?;
        caller.ensure_garden(garden_id)?;
        self.gardens.load(garden_id).await?;
        let beds = self
            .ctx
            .db
            .call(move |db| db.list_plant_beds(garden_id).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "plant_beds", "list", None);
        Ok(beds)
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<PlantBed> {
        validate_id(id, "id")?;
        let bed = self.load(caller, id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "plant_beds", "read", Some(id));
        Ok(bed)
    }

    /// Bed and garden loaded side by side.
    pub async fn get_with_garden(
        &self,
        caller: &Caller,
        id: i64,
    ) -> ServiceResult<PlantBedWithGarden> {
        validate_id(id, "id")?;
        let garden_id = self
            .ctx
            .db
            .call(move |db| db.garden_id_for_plant_bed(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Plant bed", id))?;
        caller.ensure_garden(garden_id)?;

        let (plant_bed, garden) =
            futures::try_join!(self.load(caller, id), self.gardens.load(garden_id))?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "plant_beds", "read", Some(id));
        Ok(PlantBedWithGarden { plant_bed, garden })
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: PlantBedInput,
    ) -> ServiceResult<PlantBed> {
        validate_id(id, "id")?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("name", "Plant bed name cannot be empty"));
        }
        let mut input = trimmed(input);
        self.validate_fields(&input)?;
        if let Some(code) = input.letter_code.as_deref() {
            input.letter_code = Some(checked_code(code)?);
        }
        let current = self.load(caller, id).await?;

        let bed = self
            .ctx
            .db
            .call(move |db| {
                if let Some(code) = input.letter_code.as_deref() {
                    let taken = db
                        .letter_codes_for_garden(current.garden_id)?
                        .iter()
                        .any(|c| c.eq_ignore_ascii_case(code) && !c.eq_ignore_ascii_case(&current.letter_code));
                    if taken {
                        return Err(ServiceError::Conflict(format!(
                            "Letter code {} is already in use in this garden",
                            code
                        )));
                    }
                }
                Ok(db.update_plant_bed(id, &input)?)
            })
            .await?;
        self.ctx.audit.log_user_action(
            caller.user_id,
            "update",
            "plant_beds",
            json!({ "plant_bed_id": id }),
        );
        Ok(bed)
    }

    /// Hard delete; plants, logbook entries and tasks go with it.
    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        self.load(caller, id).await?;
        self.ctx
            .db
            .call(move |db| db.delete_plant_bed(id).map_err(ServiceError::from))
            .await?;
        tracing::info!(plant_bed_id = id, "Plant bed deleted");
        self.ctx.audit.log_user_action(
            caller.user_id,
            "delete",
            "plant_beds",
            json!({ "plant_bed_id": id }),
        );
        Ok(true)
    }

    /// Load a bed and check the caller may see its garden.
    pub(crate) async fn load(&self, caller: &Caller, id: i64) -> ServiceResult<PlantBed> {
        let bed = self
            .ctx
            .db
            .call(move |db| db.get_plant_bed(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Plant bed", id))?;
        caller.ensure_garden(bed.garden_id)?;
        Ok(bed)
    }

    fn validate_fields(&self, input: &PlantBedInput) -> ServiceResult<()> {
        let max = self.ctx.max_input_length;
        validate_optional(input.name.as_deref(), "name", max)?;
        validate_optional(input.location.as_deref(), "location", max)?;
        validate_optional(input.size.as_deref(), "size", max)?;
        validate_optional(input.soil_type.as_deref(), "soil_type", max)?;
        validate_optional(input.description.as_deref(), "description", max)?;
        Ok(())
    }
}

fn checked_code(code: &str) -> ServiceResult<String> {
    let code = code.trim().to_ascii_uppercase();
    if !is_valid_letter_code(&code) {
        return Err(ServiceError::validation(
            "letter_code",
            "Letter code must be a letter optionally followed by a number",
        ));
    }
    Ok(code)
}

fn trimmed(input: PlantBedInput) -> PlantBedInput {
    PlantBedInput {
        letter_code: clean(input.letter_code.as_ref()),
        name: clean(input.name.as_ref()),
        location: clean(input.location.as_ref()),
        size: clean(input.size.as_ref()),
        soil_type: clean(input.soil_type.as_ref()),
        description: clean(input.description.as_ref()),
        ..input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::context;
    use crate::store::models::GardenInput;
    use tuin_common::AccessScope;

    async fn setup() -> (PlantBedService, i64) {
        let ctx = context();
        let garden = GardenService::new(ctx.clone())
            .create(
                &Caller::system(),
                GardenInput {
                    name: Some("Hof".to_string()),
                    location: Some("Delft".to_string()),
                    ..GardenInput::default()
                },
            )
            .await
            .unwrap();
        (PlantBedService::new(ctx), garden.id)
    }

    #[tokio::test]
    async fn test_letter_codes_assigned_in_order() {
        let (service, garden_id) = setup().await;
        let caller = Caller::system();
        let a = service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        let b = service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        assert_eq!(a.letter_code, "A");
        assert_eq!(a.name, "A");
        assert_eq!(b.letter_code, "B");
    }

    #[tokio::test]
    async fn test_explicit_code_conflict() {
        let (service, garden_id) = setup().await;
        let caller = Caller::system();
        service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        let result = service
            .create(
                &caller,
                garden_id,
                PlantBedInput {
                    letter_code: Some("a".to_string()),
                    ..PlantBedInput::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_in_missing_garden() {
        let (service, _) = setup().await;
        let err = service
            .create(&Caller::system(), 404, PlantBedInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Garden with ID 404 not found");
    }

    #[tokio::test]
    async fn test_get_with_garden() {
        let (service, garden_id) = setup().await;
        let caller = Caller::system();
        let bed = service
            .create(
                &caller,
                garden_id,
                PlantBedInput {
                    name: Some("Kruiden".to_string()),
                    ..PlantBedInput::default()
                },
            )
            .await
            .unwrap();
        let both = service.get_with_garden(&caller, bed.id).await.unwrap();
        assert_eq!(both.plant_bed.name, "Kruiden");
        assert_eq!(both.garden.id, garden_id);
    }

    #[tokio::test]
    async fn test_update_letter_code_must_be_free() {
        let (service, garden_id) = setup().await;
        let caller = Caller::system();
        let a = service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        let taken = service
            .update(
                &caller,
                a.id,
                PlantBedInput {
                    letter_code: Some("B".to_string()),
                    ..PlantBedInput::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(ServiceError::Conflict(_))));

        let moved = service
            .update(
                &caller,
                a.id,
                PlantBedInput {
                    letter_code: Some("C".to_string()),
                    ..PlantBedInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.letter_code, "C");
    }

    #[tokio::test]
    async fn test_out_of_scope_caller_is_forbidden() {
        let (service, garden_id) = setup().await;
        let bed = service
            .create(&Caller::system(), garden_id, PlantBedInput::default())
            .await
            .unwrap();
        let outsider = Caller {
            user_id: Some(5),
            scope: AccessScope::Gardens(vec![]),
        };
        assert!(matches!(
            service.get_by_id(&outsider, bed.id).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_delete_then_missing() {
        let (service, garden_id) = setup().await;
        let caller = Caller::system();
        let bed = service
            .create(&caller, garden_id, PlantBedInput::default())
            .await
            .unwrap();
        assert!(service.delete(&caller, bed.id).await.unwrap());
        let err = service.get_by_id(&caller, bed.id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Plant bed with ID {} not found", bed.id));
    }
}
