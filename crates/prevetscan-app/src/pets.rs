// Pet profile management for the signed-in account.

use prevetscan_core::model::{NewPet, Pet};
use uuid::Uuid;

use crate::error::{service_error, store_error, AppError};
use crate::services::Services;

fn checked(pet: &NewPet) -> Result<NewPet, AppError> {
    pet.validate()
        .map_err(|e| AppError::bad_request(e.to_string()))?;
    Ok(pet.normalized())
}

fn bearer_of(bearer: Option<&str>) -> &str {
    bearer.map(str::trim).unwrap_or_default()
}

pub async fn list_pets(services: &Services, bearer: Option<&str>) -> Result<Vec<Pet>, AppError> {
    let user = services.authenticate(bearer).await?;
    services
        .pets
        .list_pets(bearer_of(bearer), &user.id)
        .await
        .map_err(service_error("Failed to load pets"))
}

pub async fn get_pet(services: &Services, bearer: Option<&str>, id: Uuid) -> Result<Pet, AppError> {
    services.authenticate(bearer).await?;
    services
        .pets
        .get_pet(bearer_of(bearer), id)
        .await
        .map_err(store_error("Failed to load pet"))
}

pub async fn create_pet(
    services: &Services,
    bearer: Option<&str>,
    pet: NewPet,
) -> Result<Pet, AppError> {
    let user = services.authenticate(bearer).await?;
    let pet = checked(&pet)?;
    services
        .pets
        .insert_pet(bearer_of(bearer), &user.id, &pet)
        .await
        .map_err(service_error("Failed to save pet"))
}

pub async fn update_pet(
    services: &Services,
    bearer: Option<&str>,
    id: Uuid,
    pet: NewPet,
) -> Result<Pet, AppError> {
    services.authenticate(bearer).await?;
    let pet = checked(&pet)?;
    services
        .pets
        .update_pet(bearer_of(bearer), id, &pet)
        .await
        .map_err(store_error("Failed to update pet"))
}

pub async fn delete_pet(services: &Services, bearer: Option<&str>, id: Uuid) -> Result<(), AppError> {
    services.authenticate(bearer).await?;
    services
        .pets
        .delete_pet(bearer_of(bearer), id)
        .await
        .map_err(store_error("Failed to delete pet"))
}
