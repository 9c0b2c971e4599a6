pub mod auth_context;
pub mod in_flight;
