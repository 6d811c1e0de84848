pub mod app;
pub mod config;
pub mod drink;
pub mod drink_handlers;
pub mod metrics;
pub mod store;
pub mod validation;

pub use app::{build_router, AppState};
pub use common_http_errors::ApiError;
