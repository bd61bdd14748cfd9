// Pet and scan tables over PostgREST.

use prevetscan_core::model::{NewPet, NewScan, Pet, Scan};
use serde_json::Value;
use uuid::Uuid;

use crate::client::BaasClient;
use crate::error::BaasError;

const RETURN_REPRESENTATION: (&str, &str) = ("Prefer", "return=representation");

/// PostgREST always answers with an array; a write that matched nothing is
/// an empty one.
fn single<T>(rows: Vec<T>) -> Result<T, BaasError> {
    rows.into_iter().next().ok_or(BaasError::NotFound)
}

impl BaasClient {
    // -----------------------------------------------------------------------
    // Pets
    // -----------------------------------------------------------------------

    pub async fn list_pets(&self, bearer: &str, user_id: &str) -> Result<Vec<Pet>, BaasError> {
        let path = format!("/rest/v1/pets?select=*&user_id=eq.{user_id}&order=created_at.asc");
        let response = self.send(self.get(&path), bearer).await?;
        Self::read_json(response).await
    }

    pub async fn get_pet(&self, bearer: &str, id: Uuid) -> Result<Pet, BaasError> {
        let path = format!("/rest/v1/pets?select=*&id=eq.{id}");
        let response = self.send(self.get(&path), bearer).await?;
        single(Self::read_json(response).await?)
    }

    pub async fn insert_pet(
        &self,
        bearer: &str,
        user_id: &str,
        pet: &NewPet,
    ) -> Result<Pet, BaasError> {
        let mut row =
            serde_json::to_value(pet).map_err(|e| BaasError::Decode(e.to_string()))?;
        row["user_id"] = Value::String(user_id.to_string());

        let request = self
            .post("/rest/v1/pets")
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(&row);
        let response = self.send(request, bearer).await?;
        single(Self::read_json(response).await?)
    }

    pub async fn update_pet(&self, bearer: &str, id: Uuid, pet: &NewPet) -> Result<Pet, BaasError> {
        let path = format!("/rest/v1/pets?id=eq.{id}");
        let request = self
            .patch(&path)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(pet);
        let response = self.send(request, bearer).await?;
        single(Self::read_json(response).await?)
    }

    pub async fn delete_pet(&self, bearer: &str, id: Uuid) -> Result<(), BaasError> {
        self.delete_row("pets", bearer, id).await
    }

    // -----------------------------------------------------------------------
    // Scans
    // -----------------------------------------------------------------------

    /// Newest first.
    pub async fn list_scans(&self, bearer: &str, user_id: &str) -> Result<Vec<Scan>, BaasError> {
        let path = format!("/rest/v1/scans?select=*&user_id=eq.{user_id}&order=created_at.desc");
        let response = self.send(self.get(&path), bearer).await?;
        Self::read_json(response).await
    }

    pub async fn insert_scan(&self, bearer: &str, scan: &NewScan) -> Result<Scan, BaasError> {
        let request = self
            .post("/rest/v1/scans")
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1)
            .json(scan);
        let response = self.send(request, bearer).await?;
        single(Self::read_json(response).await?)
    }

    pub async fn delete_scan(&self, bearer: &str, id: Uuid) -> Result<(), BaasError> {
        self.delete_row("scans", bearer, id).await
    }

    async fn delete_row(&self, table: &str, bearer: &str, id: Uuid) -> Result<(), BaasError> {
        let path = format!("/rest/v1/{table}?id=eq.{id}");
        let request = self
            .delete(&path)
            .header(RETURN_REPRESENTATION.0, RETURN_REPRESENTATION.1);
        let response = self.send(request, bearer).await?;
        let deleted: Vec<Value> = Self::read_json(response).await?;
        if deleted.is_empty() {
            return Err(BaasError::NotFound);
        }
        Ok(())
    }
}
