//! Fencepost Server - REST API over the service registry.
//!
//! Routes are grouped per resource under `routes/`; handlers borrow the
//! registry from `AppState` and answer with the `ApiResponse` envelope.

pub mod error;
pub mod response;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use response::{ApiResponse, ApiResult};
pub use server::{build_router, serve};
pub use state::AppState;
