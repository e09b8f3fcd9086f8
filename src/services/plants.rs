use serde_json::json;
use tuin_common::{Plant, PlantStatus};

use super::validation::{clean, validate_id, validate_optional};
use super::{Caller, PlantBedService, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::models::PlantInput;

#[derive(Clone)]
pub struct PlantService {
    ctx: ServiceContext,
    beds: PlantBedService,
}

impl PlantService {
    pub fn new(ctx: ServiceContext) -> Self {
        let beds = PlantBedService::new(ctx.clone());
        Self { ctx, beds }
    }

    pub async fn create(
        &self,
        caller: &Caller,
        plant_bed_id: i64,
        input: PlantInput,
    ) -> ServiceResult<Plant> {
        validate_id(plant_bed_id, "plant_bed_id")?;
        let name = clean(input.name.as_ref())
            .ok_or_else(|| ServiceError::validation("name", "Plant name is required"))?;
        let input = PlantInput {
            name: Some(name),
            ..trimmed(input)
        };
        self.validate_fields(&input)?;
        self.beds.load(caller, plant_bed_id).await?;

        let plant = self
            .ctx
            .db
            .call(move |db| db.create_plant(plant_bed_id, &input).map_err(ServiceError::from))
            .await?;
        tracing::info!(plant_id = plant.id, plant_bed_id, "Plant created");
        self.ctx.audit.log_user_action(
            caller.user_id,
            "create",
            "plants",
            json!({ "plant_id": plant.id, "plant_bed_id": plant_bed_id }),
        );
        Ok(plant)
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<Plant> {
        validate_id(id, "id")?;
        let plant = self.load(caller, id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "plants", "read", Some(id));
        Ok(plant)
    }

    pub async fn list_for_bed(&self, caller: &Caller, plant_bed_id: i64) -> ServiceResult<Vec<Plant>> {
        validate_id(plant_bed_id, "plant_bed_id")?;
        self.beds.load(caller, plant_bed_id).await?;
        let plants = self
            .ctx
            .db
            .call(move |db| db.list_plants(plant_bed_id).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "plants", "list", None);
        Ok(plants)
    }

    pub async fn update(&self, caller: &Caller, id: i64, input: PlantInput) -> ServiceResult<Plant> {
        validate_id(id, "id")?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("name", "Plant name cannot be empty"));
        }
        if input.height.is_some_and(|h| h < 0.0) {
            return Err(ServiceError::validation("height", "Height cannot be negative"));
        }
        let input = trimmed(input);
        self.validate_fields(&input)?;
        self.load(caller, id).await?;

        let plant = self
            .ctx
            .db
            .call(move |db| db.update_plant(id, &input).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "update", "plants", json!({ "plant_id": id }));
        Ok(plant)
    }

    pub async fn set_status(
        &self,
        caller: &Caller,
        id: i64,
        status: PlantStatus,
    ) -> ServiceResult<Plant> {
        self.update(
            caller,
            id,
            PlantInput {
                status: Some(status),
                ..PlantInput::default()
            },
        )
        .await
    }

    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        self.load(caller, id).await?;
        self.ctx
            .db
            .call(move |db| db.delete_plant(id).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "delete", "plants", json!({ "plant_id": id }));
        Ok(true)
    }

    pub(crate) async fn load(&self, caller: &Caller, id: i64) -> ServiceResult<Plant> {
        let plant = self
            .ctx
            .db
            .call(move |db| db.get_plant(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Plant", id))?;
        self.beds.load(caller, plant.plant_bed_id).await?;
        Ok(plant)
    }

    fn validate_fields(&self, input: &PlantInput) -> ServiceResult<()> {
        let max = self.ctx.max_input_length;
        validate_optional(input.name.as_deref(), "name", max)?;
        validate_optional(input.scientific_name.as_deref(), "scientific_name", max)?;
        validate_optional(input.variety.as_deref(), "variety", max)?;
        validate_optional(input.color.as_deref(), "color", max)?;
        validate_optional(input.notes.as_deref(), "notes", max)?;
        validate_optional(input.care_instructions.as_deref(), "care_instructions", max)?;
        if input.plants_per_sqm.is_some_and(|n| n < 0) {
            return Err(ServiceError::validation(
                "plants_per_sqm",
                "Plants per square metre cannot be negative",
            ));
        }
        Ok(())
    }
}

fn trimmed(input: PlantInput) -> PlantInput {
    PlantInput {
        name: clean(input.name.as_ref()),
        scientific_name: clean(input.scientific_name.as_ref()),
        variety: clean(input.variety.as_ref()),
        color: clean(input.color.as_ref()),
        planting_date: clean(input.planting_date.as_ref()),
        expected_harvest_date: clean(input.expected_harvest_date.as_ref()),
        notes: clean(input.notes.as_ref()),
        care_instructions: clean(input.care_instructions.as_ref()),
        ..input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::context;
    use crate::services::GardenService;
    use crate::store::models::{GardenInput, PlantBedInput};

    async fn setup() -> (PlantService, i64) {
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
        (PlantService::new(ctx), bed.id)
    }

    fn named(name: &str) -> PlantInput {
        PlantInput {
            name: Some(name.to_string()),
            ..PlantInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let (service, bed) = setup().await;
        let err = service
            .create(&Caller::system(), bed, PlantInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Plant name is required");
    }

    #[tokio::test]
    async fn test_create_requires_existing_bed() {
        let (service, _) = setup().await;
        let err = service
            .create(&Caller::system(), 999, named("Tomaat"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Plant bed with ID 999 not found");
    }

    #[tokio::test]
    async fn test_list_and_set_status() {
        let (service, bed) = setup().await;
        let caller = Caller::system();
        let tomaat = service.create(&caller, bed, named("Tomaat")).await.unwrap();
        service.create(&caller, bed, named("Basilicum")).await.unwrap();

        let names: Vec<String> = service
            .list_for_bed(&caller, bed)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Basilicum", "Tomaat"]);

        let updated = service
            .set_status(&caller, tomaat.id, PlantStatus::NeedsAttention)
            .await
            .unwrap();
        assert_eq!(updated.status, PlantStatus::NeedsAttention);
        assert_eq!(updated.name, "Tomaat");
    }

    #[tokio::test]
    async fn test_delete_plant() {
        let (service, bed) = setup().await;
        let caller = Caller::system();
        let plant = service.create(&caller, bed, named("Prei")).await.unwrap();
        assert!(service.delete(&caller, plant.id).await.unwrap());
        assert!(matches!(
            service.get_by_id(&caller, plant.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}
