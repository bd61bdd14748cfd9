// In-memory vendor fakes for pipeline and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use prevetscan_baas::{AuthUser, BaasError};
use prevetscan_core::model::{
    AnalysisResult, CreditBalance, HealthCategory, NewPet, NewScan, Pet, Scan, Severity,
};
use prevetscan_llm::{ChatEvent, ChatRequest, ImagePayload, LlmError};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::challenge::ChallengeError;
use crate::ports::{
    AnalysisProvider, ChatProvider, CreditLedger, HumanVerifier, IdentityProvider, PetStore,
    ScanStore,
};
use crate::services::Services;

/// Bearer token the fake identity provider accepts.
pub const VALID_TOKEN: &str = "valid-token";
/// Account behind `VALID_TOKEN`.
pub const USER_ID: &str = "user-1";

/// Base64 for a tiny payload; enough for `ImagePayload::parse`.
pub const TINY_IMAGE: &str = "aGVsbG8=";

pub fn sample_analysis() -> AnalysisResult {
    AnalysisResult {
        severity: Severity::Moderate,
        title: "Early tartar buildup".into(),
        observations: vec!["Yellow deposits on upper canines".into()],
        possible_causes: vec!["Plaque accumulation".into()],
        vet_will_examine: vec!["Gum line under sedation".into()],
        questions_to_ask: vec!["Is a scale and polish enough?".into()],
        urgency: "Within a month".into(),
        next_steps: "Book a dental check and start brushing.".into(),
        disclaimer: "AI guidance, not a diagnosis.".into(),
        financial_forecast: "Cleaning now ($300) vs extractions later ($1200+).".into(),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// BaaS
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BackendState {
    balance: CreditBalance,
    scans: Vec<Scan>,
    pets: Vec<Pet>,
    balance_failure: Option<BaasError>,
    deduct_failure: Option<BaasError>,
    insert_scan_failure: Option<BaasError>,
    delete_scan_failure: Option<BaasError>,
}

/// Accounts, credits, scans and pets for a single user.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn with_balance(balance: CreditBalance) -> Self {
        Self {
            state: Mutex::new(BackendState {
                balance,
                ..BackendState::default()
            }),
        }
    }

    pub fn with_credits(credits: i64) -> Self {
        Self::with_balance(CreditBalance::new(credits, None))
    }

    pub fn fail_next_balance(&self, err: BaasError) {
        lock(&self.state).balance_failure = Some(err);
    }

    /// Make the next deduction fail with `err` without touching the balance.
    pub fn fail_next_deduction(&self, err: BaasError) {
        lock(&self.state).deduct_failure = Some(err);
    }

    pub fn fail_next_scan_insert(&self, err: BaasError) {
        lock(&self.state).insert_scan_failure = Some(err);
    }

    pub fn fail_next_scan_delete(&self, err: BaasError) {
        lock(&self.state).delete_scan_failure = Some(err);
    }

    pub fn credits(&self) -> i64 {
        lock(&self.state).balance.credits
    }

    pub fn scans(&self) -> Vec<Scan> {
        lock(&self.state).scans.clone()
    }

    pub fn pets(&self) -> Vec<Pet> {
        lock(&self.state).pets.clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeBackend {
    async fn authenticate(&self, bearer: &str) -> Result<AuthUser, BaasError> {
        if bearer == VALID_TOKEN {
            Ok(AuthUser {
                id: USER_ID.into(),
                email: Some("owner@example.com".into()),
            })
        } else {
            Err(BaasError::Unauthorized)
        }
    }
}

#[async_trait]
impl CreditLedger for FakeBackend {
    async fn balance(&self, _bearer: &str, _user_id: &str) -> Result<CreditBalance, BaasError> {
        let mut state = lock(&self.state);
        match state.balance_failure.take() {
            Some(err) => Err(err),
            None => Ok(state.balance),
        }
    }

    async fn deduct_one(&self, _bearer: &str, _user_id: &str) -> Result<i64, BaasError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.deduct_failure.take() {
            return Err(err);
        }
        if state.balance.credits <= 0 {
            return Err(BaasError::InsufficientCredits);
        }
        state.balance.credits -= 1;
        Ok(state.balance.credits)
    }
}

#[async_trait]
impl ScanStore for FakeBackend {
    async fn list_scans(&self, _bearer: &str, user_id: &str) -> Result<Vec<Scan>, BaasError> {
        let state = lock(&self.state);
        let mut scans: Vec<Scan> = state
            .scans
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(scans)
    }

    async fn insert_scan(&self, _bearer: &str, scan: &NewScan) -> Result<Scan, BaasError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.insert_scan_failure.take() {
            return Err(err);
        }
        let stored = scan.clone().into_scan(Uuid::new_v4(), Utc::now());
        state.scans.push(stored.clone());
        Ok(stored)
    }

    async fn delete_scan(&self, _bearer: &str, id: Uuid) -> Result<(), BaasError> {
        let mut state = lock(&self.state);
        if let Some(err) = state.delete_scan_failure.take() {
            return Err(err);
        }
        let before = state.scans.len();
        state.scans.retain(|s| s.id != id);
        if state.scans.len() == before {
            return Err(BaasError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl PetStore for FakeBackend {
    async fn list_pets(&self, _bearer: &str, user_id: &str) -> Result<Vec<Pet>, BaasError> {
        Ok(lock(&self.state)
            .pets
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_pet(&self, _bearer: &str, id: Uuid) -> Result<Pet, BaasError> {
        lock(&self.state)
            .pets
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(BaasError::NotFound)
    }

    async fn insert_pet(
        &self,
        _bearer: &str,
        user_id: &str,
        pet: &NewPet,
    ) -> Result<Pet, BaasError> {
        let stored = Pet {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: pet.name.clone(),
            species: pet.species,
            breed: pet.breed.clone(),
            age: pet.age,
            weight_kg: pet.weight_kg,
            created_at: Utc::now(),
        };
        lock(&self.state).pets.push(stored.clone());
        Ok(stored)
    }

    async fn update_pet(&self, _bearer: &str, id: Uuid, pet: &NewPet) -> Result<Pet, BaasError> {
        let mut state = lock(&self.state);
        let existing = state
            .pets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BaasError::NotFound)?;
        existing.name = pet.name.clone();
        existing.species = pet.species;
        existing.breed = pet.breed.clone();
        existing.age = pet.age;
        existing.weight_kg = pet.weight_kg;
        Ok(existing.clone())
    }

    async fn delete_pet(&self, _bearer: &str, id: Uuid) -> Result<(), BaasError> {
        let mut state = lock(&self.state);
        let before = state.pets.len();
        state.pets.retain(|p| p.id != id);
        if state.pets.len() == before {
            return Err(BaasError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AI provider
// ---------------------------------------------------------------------------

/// Returns a fixed analysis (or failure) and counts calls.
pub struct FakeAnalyzer {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeAnalyzer {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for FakeAnalyzer {
    async fn analyze(
        &self,
        _image: &ImagePayload,
        _category: HealthCategory,
    ) -> Result<AnalysisResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(LlmError::Http {
                status: 503,
                body: "model overloaded".into(),
            })
        } else {
            Ok(sample_analysis())
        }
    }
}

/// Replays a scripted event sequence and records the requests it saw.
#[derive(Default)]
pub struct FakeChat {
    script: Mutex<Vec<ChatEvent>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn scripted(events: Vec<ChatEvent>) -> Self {
        Self {
            script: Mutex::new(events),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ChatProvider for FakeChat {
    async fn stream_chat(&self, request: ChatRequest, tx: mpsc::Sender<ChatEvent>) {
        lock(&self.requests).push(request);
        let events = lock(&self.script).clone();
        for event in events {
            if tx.send(event).await.is_err() {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Challenge
// ---------------------------------------------------------------------------

pub struct FakeVerifier {
    accept: bool,
    calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            accept: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HumanVerifier for FakeVerifier {
    async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> Result<bool, ChallengeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.accept)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Every fake plus the `Services` wired to them.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub chat: Arc<FakeChat>,
    pub verifier: Arc<FakeVerifier>,
}

impl Harness {
    pub fn new(backend: FakeBackend) -> Self {
        Self {
            backend: Arc::new(backend),
            analyzer: Arc::new(FakeAnalyzer::succeeding()),
            chat: Arc::new(FakeChat::default()),
            verifier: Arc::new(FakeVerifier::accepting()),
        }
    }

    pub fn with_credits(credits: i64) -> Self {
        Self::new(FakeBackend::with_credits(credits))
    }

    pub fn analyzer(mut self, analyzer: FakeAnalyzer) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn chat(mut self, chat: FakeChat) -> Self {
        self.chat = Arc::new(chat);
        self
    }

    pub fn verifier(mut self, verifier: FakeVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn services(&self) -> Services {
        Services {
            identity: self.backend.clone(),
            credits: self.backend.clone(),
            scans: self.backend.clone(),
            pets: self.backend.clone(),
            analyzer: self.analyzer.clone(),
            chat: self.chat.clone(),
            verifier: self.verifier.clone(),
        }
    }
}
