// Vendor handles shared by every request, plus caller authentication.

use std::sync::Arc;

use prevetscan_baas::{AuthUser, BaasClient, BaasError};
use prevetscan_core::config::Config;
use prevetscan_llm::GeminiClient;
use tracing::warn;

use crate::challenge::TurnstileVerifier;
use crate::error::AppError;
use crate::ports::{
    AnalysisProvider, ChatProvider, CreditLedger, HumanVerifier, IdentityProvider, PetStore,
    ScanStore,
};

/// One handle per vendor seam. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub credits: Arc<dyn CreditLedger>,
    pub scans: Arc<dyn ScanStore>,
    pub pets: Arc<dyn PetStore>,
    pub analyzer: Arc<dyn AnalysisProvider>,
    pub chat: Arc<dyn ChatProvider>,
    pub verifier: Arc<dyn HumanVerifier>,
}

impl Services {
    /// Wire every seam to its production client.
    pub fn from_config(config: &Config) -> Self {
        let baas = Arc::new(BaasClient::from_config(config));
        let gemini = Arc::new(GeminiClient::from_config(config));
        Self {
            identity: baas.clone(),
            credits: baas.clone(),
            scans: baas.clone(),
            pets: baas,
            analyzer: gemini.clone(),
            chat: gemini,
            verifier: Arc::new(TurnstileVerifier::from_config(config)),
        }
    }

    /// Resolve the caller from its bearer token.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<AuthUser, AppError> {
        let bearer = match bearer.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AppError::Unauthorized("No authorization".into())),
        };
        match self.identity.authenticate(bearer).await {
            Ok(user) => Ok(user),
            Err(BaasError::Unauthorized) | Err(BaasError::NotFound) => {
                Err(AppError::unauthorized())
            }
            Err(e) => {
                warn!(error = %e, "identity lookup failed");
                Err(AppError::Upstream("Authentication failed".into()))
            }
        }
    }
}
