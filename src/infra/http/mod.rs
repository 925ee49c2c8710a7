//! HTTP boundary: the public API routes and the admin surface.

pub mod admin;
pub mod api;
pub mod error;

pub use admin::{AdminState, build_admin_router};
pub use api::{ApiState, build_api_router};

use axum::Router;

/// Assemble the full application router.
pub fn build_router(api: ApiState, admin: AdminState) -> Router {
    build_api_router(api).merge(build_admin_router(admin))
}
