//! OpenSubsonic API client module.

pub mod api;
pub mod auth;
pub mod models;
pub mod provider;

pub use api::{StreamOptions, SubsonicClient};
pub use auth::Credentials;
