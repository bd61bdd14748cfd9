// Pet records owned by a single account.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
    Rabbit,
    Bird,
    Reptile,
    Other,
}

impl Species {
    pub fn as_str(self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Rabbit => "rabbit",
            Species::Bird => "bird",
            Species::Reptile => "reptile",
            Species::Other => "other",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dog" => Ok(Species::Dog),
            "cat" => Ok(Species::Cat),
            "rabbit" => Ok(Species::Rabbit),
            "bird" => Ok(Species::Bird),
            "reptile" => Ok(Species::Reptile),
            "other" => Ok(Species::Other),
            other => Err(ModelError::UnknownSpecies(other.to_string())),
        }
    }
}

/// Age as whole years plus remaining months. Stored as two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PetAge {
    #[serde(rename = "age_years")]
    pub years: u8,
    #[serde(rename = "age_months")]
    pub months: u8,
}

impl PetAge {
    pub fn new(years: u8, months: u8) -> Self {
        Self { years, months }
    }
}

/// A stored pet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub user_id: AccountId,
    pub name: String,
    pub species: Species,
    #[serde(default)]
    pub breed: String,
    #[serde(flatten)]
    pub age: PetAge,
    pub weight_kg: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Owner-supplied fields for creating or editing a pet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPet {
    pub name: String,
    pub species: Species,
    #[serde(default)]
    pub breed: String,
    #[serde(flatten)]
    pub age: PetAge,
    pub weight_kg: f64,
}

impl NewPet {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Invalid {
                field: "name",
                message: "must not be empty".into(),
            });
        }
        if self.age.months > 11 {
            return Err(ModelError::Invalid {
                field: "age_months",
                message: format!("must be between 0 and 11, got {}", self.age.months),
            });
        }
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(ModelError::Invalid {
                field: "weight_kg",
                message: format!("must be > 0, got {}", self.weight_kg),
            });
        }
        Ok(())
    }

    /// Trimmed copy used when persisting.
    pub fn normalized(&self) -> NewPet {
        NewPet {
            name: self.name.trim().to_string(),
            breed: self.breed.trim().to_string(),
            ..self.clone()
        }
    }
}
