//! # Auth Core Library
//!
//! Token issuance and verification plus the multi-tenant visibility model
//! shared by every HTTP surface: a principal carries its role and the closed
//! set of tenant IDs it may observe, computed once at login and embedded in
//! the bearer token so downstream services never re-walk the tenant forest.

pub mod extract;
pub mod principal;
pub mod scope;
pub mod token;

pub use principal::{AuthContext, Principal, Role};
pub use scope::VisibilityScope;
pub use token::{Claims, TokenError, TokenService};
