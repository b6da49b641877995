//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP + websocket endpoints under a single Axum
//! router. Editor hosts fetch snapshots and manage configuration over REST
//! and stream geometry mutations over `/api/ws`.

pub mod auth;
pub mod floorplans;
pub mod seating;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/zones", get(seating::list_zones).post(seating::create_zone))
        .route(
            "/api/zones/{id}",
            get(seating::get_zone)
                .patch(seating::update_zone)
                .delete(seating::delete_zone),
        )
        .route(
            "/api/combinations",
            get(seating::list_combinations).post(seating::create_combination),
        )
        .route(
            "/api/combinations/{id}",
            get(seating::get_combination)
                .patch(seating::update_combination)
                .delete(seating::delete_combination),
        )
        .route(
            "/api/settings",
            get(seating::get_settings).patch(seating::update_settings),
        )
        .route(
            "/api/debug/allocation",
            get(seating::list_allocation_events).post(seating::record_allocation_event),
        )
        .route(
            "/api/floorplans",
            get(floorplans::list_plans).post(floorplans::create_plan),
        )
        .route(
            "/api/floorplans/{id}",
            get(floorplans::get_plan)
                .patch(floorplans::update_plan)
                .delete(floorplans::delete_plan),
        )
        .route(
            "/api/floorplans/{id}/tables",
            get(floorplans::list_tables).post(floorplans::create_table_rest),
        )
        .route(
            "/api/floorplans/{id}/tables/{table_id}",
            get(floorplans::get_table)
                .patch(floorplans::patch_table)
                .delete(floorplans::delete_table_rest),
        )
        .route(
            "/api/floorplans/{id}/savepoints",
            get(floorplans::list_savepoints).post(floorplans::create_savepoint),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
