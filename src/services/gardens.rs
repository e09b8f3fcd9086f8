use serde_json::json;
use tuin_common::{Garden, Page, PaginationParams, SortDirection, SortOptions};

use super::validation::{clamp_pagination, clean, validate_id, validate_input, validate_optional};
use super::{Caller, ServiceContext, ServiceResult};
use crate::errors::ServiceError;
use crate::store::models::{GardenInput, GardenQuery};

const SORT_FIELDS: &[&str] = &["created_at", "updated_at", "name", "location", "description"];

#[derive(Clone)]
pub struct GardenService {
    ctx: ServiceContext,
}

impl GardenService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Page of active gardens visible to the caller.
    pub async fn get_all(
        &self,
        caller: &Caller,
        params: &PaginationParams,
        search: Option<&str>,
        sort: Option<&SortOptions>,
    ) -> ServiceResult<Page<Garden>> {
        let (page, page_size) =
            clamp_pagination(params, self.ctx.default_page_size, self.ctx.max_page_size);
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        if let Some(term) = search {
            validate_input(term, "search", self.ctx.max_input_length)?;
        }

        let (sort_field, direction) = match sort {
            Some(s) if SORT_FIELDS.contains(&s.field.as_str()) => (s.field.clone(), s.direction),
            Some(s) => {
                tracing::warn!(
                    user_id = ?caller.user_id,
                    sort_field = %s.field,
                    allowed = ?SORT_FIELDS,
                    "Security violation: invalid sort field for gardens"
                );
                return Err(ServiceError::validation("sort_field", "Invalid sort field"));
            }
            None => ("created_at".to_string(), SortDirection::Desc),
        };

        let query = GardenQuery {
            search: search.map(str::to_string),
            sort_field,
            direction,
            limit: page_size,
            offset: (page - 1).saturating_mul(page_size),
            garden_ids: caller.garden_filter(),
        };
        let (gardens, count) = self
            .ctx
            .db
            .call(move |db| db.list_gardens(&query).map_err(ServiceError::from))
            .await?;

        self.ctx
            .audit
            .log_data_access(caller.user_id, "gardens", "list", None);
        Ok(Page::new(gardens, count, page, page_size))
    }

    pub async fn get_by_id(&self, caller: &Caller, id: i64) -> ServiceResult<Garden> {
        validate_id(id, "id")?;
        caller.ensure_garden(id)?;
        let garden = self.load(id).await?;
        self.ctx
            .audit
            .log_data_access(caller.user_id, "gardens", "read", Some(id));
        Ok(garden)
    }

    pub async fn create(&self, caller: &Caller, input: GardenInput) -> ServiceResult<Garden> {
        let name = clean(input.name.as_ref())
            .ok_or_else(|| ServiceError::validation("name", "Garden name is required"))?;
        let location = clean(input.location.as_ref())
            .ok_or_else(|| ServiceError::validation("location", "Garden location is required"))?;
        let input = GardenInput {
            name: Some(name),
            location: Some(location),
            ..trimmed(input)
        };
        self.validate_fields(&input)?;

        let garden = self
            .ctx
            .db
            .call(move |db| db.create_garden(&input).map_err(ServiceError::from))
            .await?;
        tracing::info!(garden_id = garden.id, name = %garden.name, "Garden created");
        self.ctx.audit.log_user_action(
            caller.user_id,
            "create",
            "gardens",
            json!({ "garden_id": garden.id }),
        );
        Ok(garden)
    }

    pub async fn update(
        &self,
        caller: &Caller,
        id: i64,
        input: GardenInput,
    ) -> ServiceResult<Garden> {
        validate_id(id, "id")?;
        caller.ensure_garden(id)?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ServiceError::validation("name", "Garden name cannot be empty"));
        }
        if input.location.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(ServiceError::validation(
                "location",
                "Garden location cannot be empty",
            ));
        }
        let input = trimmed(input);
        self.validate_fields(&input)?;
        self.load(id).await?;

        let garden = self
            .ctx
            .db
            .call(move |db| db.update_garden(id, &input).map_err(ServiceError::from))
            .await?;
        self.ctx
            .audit
            .log_user_action(caller.user_id, "update", "gardens", json!({ "garden_id": id }));
        Ok(garden)
    }

    /// Soft-delete. Access grants for the garden are dropped first; a
    /// failure there is logged and does not stop the delete.
    pub async fn delete(&self, caller: &Caller, id: i64) -> ServiceResult<bool> {
        validate_id(id, "id")?;
        caller.ensure_garden(id)?;
        self.load(id).await?;

        let removed: ServiceResult<usize> = self
            .ctx
            .db
            .call(move |db| {
                db.remove_garden_access_for_garden(id)
                    .map_err(ServiceError::from)
            })
            .await;
        if let Err(e) = removed {
            tracing::warn!(garden_id = id, error = %e, "Failed to remove garden access rows");
        }

        let deleted = self
            .ctx
            .db
            .call(move |db| db.soft_delete_garden(id).map_err(ServiceError::from))
            .await?;
        if !deleted {
            return Err(ServiceError::not_found("Garden", id));
        }
        tracing::info!(garden_id = id, "Garden deactivated");
        self.ctx
            .audit
            .log_user_action(caller.user_id, "delete", "gardens", json!({ "garden_id": id }));
        Ok(true)
    }

    pub(crate) async fn load(&self, id: i64) -> ServiceResult<Garden> {
        self.ctx
            .db
            .call(move |db| db.get_garden(id).map_err(ServiceError::from))
            .await?
            .ok_or_else(|| ServiceError::not_found("Garden", id))
    }

    fn validate_fields(&self, input: &GardenInput) -> ServiceResult<()> {
        let max = self.ctx.max_input_length;
        validate_optional(input.name.as_deref(), "name", max)?;
        validate_optional(input.description.as_deref(), "description", max)?;
        validate_optional(input.location.as_deref(), "location", max)?;
        validate_optional(input.garden_type.as_deref(), "garden_type", max)?;
        validate_optional(input.soil_type.as_deref(), "soil_type", max)?;
        validate_optional(input.watering_system.as_deref(), "watering_system", max)?;
        validate_optional(input.notes.as_deref(), "notes", max)?;
        Ok(())
    }
}

fn trimmed(input: GardenInput) -> GardenInput {
    GardenInput {
        name: clean(input.name.as_ref()),
        description: clean(input.description.as_ref()),
        location: clean(input.location.as_ref()),
        total_area: clean(input.total_area.as_ref()),
        length: clean(input.length.as_ref()),
        width: clean(input.width.as_ref()),
        garden_type: clean(input.garden_type.as_ref()),
        maintenance_level: clean(input.maintenance_level.as_ref()),
        soil_type: clean(input.soil_type.as_ref()),
        watering_system: clean(input.watering_system.as_ref()),
        established_date: clean(input.established_date.as_ref()),
        notes: clean(input.notes.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::context;
    use tuin_common::AccessScope;

    fn input(name: &str, location: &str) -> GardenInput {
        GardenInput {
            name: Some(name.to_string()),
            location: Some(location.to_string()),
            ..GardenInput::default()
        }
    }

    fn expect_validation(result: ServiceResult<Garden>, message: &str) {
        match result {
            Err(ServiceError::Validation { message: m, .. }) => assert_eq!(m, message),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_requires_name_and_location() {
        let service = GardenService::new(context());
        let caller = Caller::system();
        expect_validation(
            service.create(&caller, input("  ", "Utrecht")).await,
            "Garden name is required",
        );
        expect_validation(
            service.create(&caller, input("Hof", "")).await,
            "Garden location is required",
        );
    }

    #[tokio::test]
    async fn test_create_trims_fields() {
        let service = GardenService::new(context());
        let garden = service
            .create(&Caller::system(), input("  Hof  ", " Delft "))
            .await
            .unwrap();
        assert_eq!(garden.name, "Hof");
        assert_eq!(garden.location, "Delft");
        assert!(garden.is_active);
    }

    #[tokio::test]
    async fn test_create_rejects_script() {
        let service = GardenService::new(context());
        let result = service
            .create(
                &Caller::system(),
                GardenInput {
                    description: Some("<script>alert(1)</script>".to_string()),
                    ..input("Hof", "Delft")
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_get_all_paginates_and_sorts() {
        let service = GardenService::new(context());
        let caller = Caller::system();
        for name in ["Cedar", "Appel", "Berk"] {
            service.create(&caller, input(name, "Zeist")).await.unwrap();
        }
        let sort = SortOptions {
            field: "name".to_string(),
            direction: SortDirection::Asc,
        };
        let page = service
            .get_all(
                &caller,
                &PaginationParams {
                    page: Some(1),
                    page_size: Some(2),
                },
                None,
                Some(&sort),
            )
            .await
            .unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.total_pages, 2);
        let names: Vec<&str> = page.data.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Appel", "Berk"]);
    }

    #[tokio::test]
    async fn test_get_all_rejects_unknown_sort_field() {
        let service = GardenService::new(context());
        let sort = SortOptions {
            field: "password_hash; drop table gardens".to_string(),
            direction: SortDirection::Asc,
        };
        let result = service
            .get_all(
                &Caller::system(),
                &PaginationParams::default(),
                None,
                Some(&sort),
            )
            .await;
        match result {
            Err(ServiceError::Validation { field, message }) => {
                assert_eq!(field, "sort_field");
                assert_eq!(message, "Invalid sort field");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_all_empty_state() {
        let service = GardenService::new(context());
        let page = service
            .get_all(&Caller::system(), &PaginationParams::default(), None, None)
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.count, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 10);
    }

    #[tokio::test]
    async fn test_get_all_respects_scope() {
        let service = GardenService::new(context());
        let a = service
            .create(&Caller::system(), input("A", "x"))
            .await
            .unwrap();
        service
            .create(&Caller::system(), input("B", "y"))
            .await
            .unwrap();
        let caller = Caller {
            user_id: Some(9),
            scope: AccessScope::Gardens(vec![a.id]),
        };
        let page = service
            .get_all(&caller, &PaginationParams::default(), None, None)
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].id, a.id);
    }

    #[tokio::test]
    async fn test_update_rejects_blank_name() {
        let service = GardenService::new(context());
        let garden = service
            .create(&Caller::system(), input("Hof", "Delft"))
            .await
            .unwrap();
        let result = service
            .update(
                &Caller::system(),
                garden.id,
                GardenInput {
                    name: Some(" ".to_string()),
                    ..GardenInput::default()
                },
            )
            .await;
        expect_validation(result, "Garden name cannot be empty");
    }

    #[tokio::test]
    async fn test_update_missing_garden() {
        let service = GardenService::new(context());
        let err = service
            .update(&Caller::system(), 77, GardenInput::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Garden with ID 77 not found");
    }

    #[tokio::test]
    async fn test_delete_soft_deletes() {
        let service = GardenService::new(context());
        let caller = Caller::system();
        let garden = service.create(&caller, input("Hof", "Delft")).await.unwrap();
        assert!(service.delete(&caller, garden.id).await.unwrap());
        assert!(matches!(
            service.get_by_id(&caller, garden.id).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            service.delete(&caller, garden.id).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_id_never_reaches_store() {
        let service = GardenService::new(context());
        assert!(matches!(
            service.get_by_id(&Caller::system(), 0).await,
            Err(ServiceError::Validation { .. })
        ));
    }
}
