//! Role-driven rules for appointments and accounts.
//!
//! Everything here is synchronous and free of I/O; handlers fetch rows from
//! the backend and ask these modules what the caller may see or do.

pub mod booking;
pub mod dashboard;
pub mod lifecycle;
pub mod provisioning;
pub mod session;
pub mod summary;
pub mod visibility;
