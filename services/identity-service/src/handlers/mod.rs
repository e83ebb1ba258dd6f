pub mod auth;
pub mod tenants;
