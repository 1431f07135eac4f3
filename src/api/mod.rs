pub mod handlers;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .nest("/api", api_routes(app_state.clone()))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/admin", admin_routes(state))
        .route(
            "/guides/:id/blocked-dates",
            get(handlers::bookings::blocked_dates),
        )
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::bookings::list).post(handlers::bookings::create),
        )
        .route(
            "/:id",
            get(handlers::bookings::get).patch(handlers::bookings::reschedule),
        )
        .route("/:id/status", put(handlers::bookings::update_status))
        .route("/:id/staff", put(handlers::bookings::assign_staff))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Gateway callback; no session
        .route("/webhook", post(handlers::payments::webhook))
        .merge(
            Router::new()
                .route("/", get(handlers::payments::list))
                .route("/initiate", post(handlers::payments::initiate))
                .route("/:id", get(handlers::payments::get))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings/:id/payout", patch(handlers::admin::set_payout))
        .route("/sweep", post(handlers::admin::run_sweep))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
