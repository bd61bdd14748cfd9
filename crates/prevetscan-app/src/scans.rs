// Scan history for the signed-in account.

use prevetscan_core::model::Scan;
use uuid::Uuid;

use crate::error::{service_error, store_error, AppError};
use crate::services::Services;

/// Newest first.
pub async fn list_scans(services: &Services, bearer: Option<&str>) -> Result<Vec<Scan>, AppError> {
    let user = services.authenticate(bearer).await?;
    services
        .scans
        .list_scans(bearer.map(str::trim).unwrap_or_default(), &user.id)
        .await
        .map_err(service_error("Failed to load scans"))
}

pub async fn delete_scan(
    services: &Services,
    bearer: Option<&str>,
    id: Uuid,
) -> Result<(), AppError> {
    services.authenticate(bearer).await?;
    services
        .scans
        .delete_scan(bearer.map(str::trim).unwrap_or_default(), id)
        .await
        .map_err(store_error("Failed to delete scan"))
}
