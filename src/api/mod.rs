//! Typed wrappers for backend resources.
//!
//! Protected calls go through [`ApiClient`](crate::http_client::ApiClient),
//! so they carry the access token and recover from expiry transparently.

pub mod account;
pub mod ai;
pub mod dashboard;
pub mod roadmaps;
