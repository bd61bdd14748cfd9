// Image-analysis pipeline: authenticate, validate, gate on credits and the
// bot challenge, call the AI provider, persist the scan, then charge.

use chrono::Utc;
use prevetscan_baas::BaasError;
use prevetscan_core::model::{AnalysisResult, HealthCategory, NewScan};
use prevetscan_llm::ImagePayload;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{service_error, AppError};
use crate::services::Services;

/// Body of an analysis request. Every field is optional on the wire so that
/// absence is reported as a 400 rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub turnstile_token: Option<String>,
    #[serde(default)]
    pub pet_id: Option<Uuid>,
}

/// A charged, persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub scan_id: Uuid,
    pub credits_remaining: i64,
}

/// Fields that passed validation.
struct ValidRequest {
    image: ImagePayload,
    category: HealthCategory,
    token: String,
    pet_id: Option<Uuid>,
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::bad_request(message)),
    }
}

fn validate(request: &AnalyzeRequest) -> Result<ValidRequest, AppError> {
    let image = required(&request.image, "Missing image")?;
    let category = required(&request.category, "Missing category")?;
    let token = required(&request.turnstile_token, "Missing verification token")?;

    let image = ImagePayload::parse(image)
        .map_err(|e| AppError::bad_request(format!("Invalid image: {e}")))?;
    let category = category
        .parse::<HealthCategory>()
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    Ok(ValidRequest {
        image,
        category,
        token: token.to_string(),
        pet_id: request.pet_id,
    })
}

/// Run one analysis for the caller identified by `bearer`.
///
/// Nothing reaches the AI provider unless the caller is authenticated, the
/// request is complete, a credit is usable and the challenge token passes.
/// A scan that cannot be paid for is deleted again before returning.
pub async fn run_analysis(
    services: &Services,
    bearer: Option<&str>,
    request: AnalyzeRequest,
    remote_ip: Option<&str>,
) -> Result<AnalysisOutcome, AppError> {
    let user = services.authenticate(bearer).await?;
    let bearer = bearer.map(str::trim).unwrap_or_default();

    let valid = validate(&request).map_err(|e| {
        warn!(user_id = %user.id, reason = e.message(), "analysis request rejected");
        e
    })?;

    let balance = services
        .credits
        .balance(bearer, &user.id)
        .await
        .map_err(service_error("Failed to check credits"))?;
    if balance.usable_at(Utc::now()) <= 0 {
        warn!(user_id = %user.id, credits = balance.credits, "no usable credits");
        return Err(AppError::insufficient_credits());
    }

    match services.verifier.verify(&valid.token, remote_ip).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::VerificationFailed("Verification failed".into())),
        Err(e) => {
            warn!(error = %e, "challenge verification unavailable");
            return Err(AppError::Upstream("Verification failed".into()));
        }
    }

    let analysis = services
        .analyzer
        .analyze(&valid.image, valid.category)
        .await
        .map_err(|e| {
            warn!(error = %e, category = %valid.category, "analysis failed");
            AppError::Upstream("Analysis failed".into())
        })?;

    let new_scan = NewScan::from_analysis(&user.id, valid.pet_id, valid.category, &analysis);
    let scan = services
        .scans
        .insert_scan(bearer, &new_scan)
        .await
        .map_err(service_error("Failed to save scan"))?;

    let remaining = match services.credits.deduct_one(bearer, &user.id).await {
        Ok(remaining) => remaining,
        Err(deduct_err) => {
            if let Err(rollback_err) = services.scans.delete_scan(bearer, scan.id).await {
                error!(
                    scan_id = %scan.id,
                    error = %rollback_err,
                    "failed to remove unpaid scan"
                );
            }
            return Err(match deduct_err {
                BaasError::InsufficientCredits => AppError::insufficient_credits(),
                other => service_error("Failed to deduct credit")(other),
            });
        }
    };

    info!(
        user_id = %user.id,
        scan_id = %scan.id,
        category = %valid.category,
        severity = analysis.severity.as_str(),
        credits_remaining = remaining,
        "analysis complete"
    );

    Ok(AnalysisOutcome {
        analysis,
        scan_id: scan.id,
        credits_remaining: remaining,
    })
}
