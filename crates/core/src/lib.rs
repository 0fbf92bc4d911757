//! Domain layer for the HR service: employee records, performance scoring,
//! DA increment allocation, and the access policy table. No I/O lives here.

pub mod allocation;
pub mod performance;
pub mod policy;
pub mod types;
