//! OpenAPI document for the REST surface.

use axum::Router;
use utoipa::OpenApi;

use super::handlers::{event, registration, system};
use crate::app_state::AppState;

/// Path of the served OpenAPI JSON document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "rsvp-gateway",
        description = "Event registration with capacity limits, an ordered waitlist and automatic promotion."
    ),
    paths(
        system::health_handler,
        event::create_event,
        event::get_event,
        event::cancel_event,
        event::list_hosted_events,
        registration::register,
        registration::cancel_registration,
        registration::list_event_registrations,
        registration::list_user_registrations,
    ),
    tags(
        (name = "System", description = "Service health"),
        (name = "Events", description = "Event lifecycle"),
        (name = "Registrations", description = "Registering, cancelling and waitlist promotion"),
    )
)]
pub struct ApiDoc;

/// Routes serving the OpenAPI document and Swagger UI.
#[cfg(feature = "swagger-ui")]
pub fn routes() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, ApiDoc::openapi()),
    )
}

/// Routes serving the OpenAPI document.
#[cfg(not(feature = "swagger-ui"))]
pub fn routes() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
