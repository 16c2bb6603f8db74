// ============================================================================
// HTTP API - routes under /api
// ============================================================================
//
// Every route sits behind `auth::authenticate`; handlers read the caller from
// `web::ReqData<AuthenticatedIdentity>`. Errors render as
// `{"error": "<Kind>", "message": "..."}`.
//
// ============================================================================

mod errors;
mod handlers;

use actix_web::web;

pub use errors::ApiError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| ApiError::invalid(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| ApiError::invalid(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/orders")
                    .route(web::get().to(handlers::list_orders))
                    .route(web::post().to(handlers::create_order)),
            )
            .route("/orders/user/{user_id}", web::get().to(handlers::list_buyer_orders))
            .route("/orders/{id}/status", web::put().to(handlers::update_order_status))
            .route("/orders/{id}", web::delete().to(handlers::delete_order))
            .route("/vendors/{vendor_id}/stats", web::get().to(handlers::vendor_stats))
            .route("/vendors/{vendor_id}/orders", web::get().to(handlers::vendor_orders))
            .route(
                "/vendors/{vendor_id}/orders/{fragment_id}/status",
                web::put().to(handlers::update_vendor_order_status),
            ),
    );
}
