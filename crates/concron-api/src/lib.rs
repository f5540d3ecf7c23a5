//! HTTP surface of the agent.

mod error;
pub use error::ApiError;

mod http;
pub use http::{HealthApi, serve};

pub use axum;
