pub mod tenant;
pub mod user;

pub use tenant::Tenant;
pub use user::{User, UserProfile};
