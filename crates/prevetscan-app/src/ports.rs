// Vendor seams.
//
// The pipelines only see these traits. Production wires them to the BaaS,
// Gemini and Turnstile clients; tests wire them to in-memory fakes.

use async_trait::async_trait;
use prevetscan_baas::{AuthUser, BaasClient, BaasError};
use prevetscan_core::model::{
    AnalysisResult, CreditBalance, HealthCategory, NewPet, NewScan, Pet, Scan,
};
use prevetscan_llm::{ChatEvent, ChatRequest, GeminiClient, ImagePayload, LlmError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::challenge::ChallengeError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, bearer: &str) -> Result<AuthUser, BaasError>;
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn balance(&self, bearer: &str, user_id: &str) -> Result<CreditBalance, BaasError>;

    /// Take exactly one credit; returns the remaining balance.
    async fn deduct_one(&self, bearer: &str, user_id: &str) -> Result<i64, BaasError>;
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn list_scans(&self, bearer: &str, user_id: &str) -> Result<Vec<Scan>, BaasError>;
    async fn insert_scan(&self, bearer: &str, scan: &NewScan) -> Result<Scan, BaasError>;
    async fn delete_scan(&self, bearer: &str, id: Uuid) -> Result<(), BaasError>;
}

#[async_trait]
pub trait PetStore: Send + Sync {
    async fn list_pets(&self, bearer: &str, user_id: &str) -> Result<Vec<Pet>, BaasError>;
    async fn get_pet(&self, bearer: &str, id: Uuid) -> Result<Pet, BaasError>;
    async fn insert_pet(&self, bearer: &str, user_id: &str, pet: &NewPet)
        -> Result<Pet, BaasError>;
    async fn update_pet(&self, bearer: &str, id: Uuid, pet: &NewPet) -> Result<Pet, BaasError>;
    async fn delete_pet(&self, bearer: &str, id: Uuid) -> Result<(), BaasError>;
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        image: &ImagePayload,
        category: HealthCategory,
    ) -> Result<AnalysisResult, LlmError>;
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send `ChatEvent`s for one reply, ending with `Done` or `Error`.
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ChatEvent>);
}

#[async_trait]
pub trait HumanVerifier: Send + Sync {
    /// `Ok(false)` means the challenge token was rejected.
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool, ChallengeError>;
}

// ---------------------------------------------------------------------------
// BaaS implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl IdentityProvider for BaasClient {
    async fn authenticate(&self, bearer: &str) -> Result<AuthUser, BaasError> {
        self.get_user(bearer).await
    }
}

#[async_trait]
impl CreditLedger for BaasClient {
    async fn balance(&self, bearer: &str, user_id: &str) -> Result<CreditBalance, BaasError> {
        self.get_user_credits(bearer, user_id).await
    }

    async fn deduct_one(&self, bearer: &str, user_id: &str) -> Result<i64, BaasError> {
        self.deduct_credit(bearer, user_id).await
    }
}

#[async_trait]
impl ScanStore for BaasClient {
    async fn list_scans(&self, bearer: &str, user_id: &str) -> Result<Vec<Scan>, BaasError> {
        BaasClient::list_scans(self, bearer, user_id).await
    }

    async fn insert_scan(&self, bearer: &str, scan: &NewScan) -> Result<Scan, BaasError> {
        BaasClient::insert_scan(self, bearer, scan).await
    }

    async fn delete_scan(&self, bearer: &str, id: Uuid) -> Result<(), BaasError> {
        BaasClient::delete_scan(self, bearer, id).await
    }
}

#[async_trait]
impl PetStore for BaasClient {
    async fn list_pets(&self, bearer: &str, user_id: &str) -> Result<Vec<Pet>, BaasError> {
        BaasClient::list_pets(self, bearer, user_id).await
    }

    async fn get_pet(&self, bearer: &str, id: Uuid) -> Result<Pet, BaasError> {
        BaasClient::get_pet(self, bearer, id).await
    }

    async fn insert_pet(
        &self,
        bearer: &str,
        user_id: &str,
        pet: &NewPet,
    ) -> Result<Pet, BaasError> {
        BaasClient::insert_pet(self, bearer, user_id, pet).await
    }

    async fn update_pet(&self, bearer: &str, id: Uuid, pet: &NewPet) -> Result<Pet, BaasError> {
        BaasClient::update_pet(self, bearer, id, pet).await
    }

    async fn delete_pet(&self, bearer: &str, id: Uuid) -> Result<(), BaasError> {
        BaasClient::delete_pet(self, bearer, id).await
    }
}

// ---------------------------------------------------------------------------
// Gemini implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl AnalysisProvider for GeminiClient {
    async fn analyze(
        &self,
        image: &ImagePayload,
        category: HealthCategory,
    ) -> Result<AnalysisResult, LlmError> {
        self.analyze_image(image, category).await
    }
}

#[async_trait]
impl ChatProvider for GeminiClient {
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ChatEvent>) {
        GeminiClient::stream_chat(self, request, tx).await
    }
}
