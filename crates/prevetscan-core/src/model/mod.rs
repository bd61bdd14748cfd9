// Domain records shared by the AI client, the BaaS client and the HTTP layer.

pub mod analysis;
pub mod credits;
pub mod pet;
pub mod scan;

pub use analysis::{AnalysisResult, HealthCategory, Severity};
pub use credits::{CreditBalance, ExpiryStatus};
pub use pet::{NewPet, Pet, PetAge, Species};
pub use scan::{NewScan, Scan};

use thiserror::Error;

/// Opaque account identifier issued by the auth provider.
pub type AccountId = String;

/// Validation failures for owner-supplied records.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("unknown health category: {0}")]
    UnknownCategory(String),

    #[error("unknown species: {0}")]
    UnknownSpecies(String),
}
