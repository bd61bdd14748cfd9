// Backend-as-a-service client: account lookup, credit RPCs, and the pet and
// scan tables, all scoped by the caller's own bearer token.

pub mod client;
pub mod error;
mod records;

pub use client::{AuthUser, BaasClient};
pub use error::BaasError;
