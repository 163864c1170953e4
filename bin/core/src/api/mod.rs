//! The HTTP surface: an explicit route table per area, no
//! implicit routing. Auth and role gating are handled by an
//! outer proxy layer and are not part of the core.

use axum::{Json, Router, routing::get};
use burndler_client::api::GetVersionResponse;

use crate::config::core_config;

pub mod build;
pub mod compose;
pub mod container;
pub mod service;
pub mod setup;

pub fn router() -> Router {
  Router::new()
    .route("/", get(get_version))
    .nest("/setup", setup::router())
    .nest("/compose", compose::router())
    .nest("/containers", container::router())
    .nest("/services", service::router())
    .nest("/builds", build::router())
}

async fn get_version() -> Json<GetVersionResponse> {
  Json(GetVersionResponse {
    title: core_config().title.clone(),
    version: format!("v{}", env!("CARGO_PKG_VERSION")),
  })
}
