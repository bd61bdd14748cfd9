// Library root for the shared PreVetScan domain: records, credit rules,
// configuration, and report pagination.

pub mod config;
pub mod model;
pub mod report;
