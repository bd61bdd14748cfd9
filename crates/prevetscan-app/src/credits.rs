// Credit balance lookup for the signed-in account.

use chrono::{DateTime, Utc};
use prevetscan_core::model::ExpiryStatus;
use serde::Serialize;

use crate::error::{service_error, AppError};
use crate::services::Services;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    /// Usable credits right now; zero once the balance has expired.
    pub credits: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_today: bool,
}

pub async fn check_credits(
    services: &Services,
    bearer: Option<&str>,
) -> Result<CreditSummary, AppError> {
    check_credits_at(services, bearer, Utc::now()).await
}

pub(crate) async fn check_credits_at(
    services: &Services,
    bearer: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CreditSummary, AppError> {
    let user = services.authenticate(bearer).await?;
    let bearer = bearer.map(str::trim).unwrap_or_default();

    let balance = services
        .credits
        .balance(bearer, &user.id)
        .await
        .map_err(service_error("Failed to check credits"))?;

    Ok(CreditSummary {
        credits: balance.usable_at(now),
        expires_at: balance.expires_at,
        expires_today: balance.expiry_status(now) == ExpiryStatus::ExpiresToday,
    })
}
