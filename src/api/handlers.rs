use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::errors::ApiError;
use crate::auth::AuthenticatedIdentity;
use crate::domain::order::{
    LineItem, OrderLifecycleManager, OrderStatus, PlaceOrder, TransitionFragment, TransitionOrder,
};
use crate::domain::vendor::VendorStatsAggregator;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    pub vendor_id: String,
    pub line_total: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub buyer_id: Option<String>,
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl StatusRequest {
    fn target(&self) -> Result<OrderStatus, ApiError> {
        self.status.parse().map_err(|e| ApiError::invalid(format!("{}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub strict: bool,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "marketplace-orders"
    }))
}

/// POST /api/orders
pub async fn create_order(
    manager: web::Data<OrderLifecycleManager>,
    identity: web::ReqData<AuthenticatedIdentity>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    if let Some(buyer_id) = &body.buyer_id {
        if *buyer_id != identity.subject {
            return Err(ApiError::invalid(
                "buyerId does not match the authenticated subject",
            ));
        }
    }

    let command = PlaceOrder {
        buyer_id: identity.subject.clone(),
        items: body
            .items
            .into_iter()
            .map(|item| LineItem::new(item.vendor_id, item.line_total))
            .collect(),
    };

    let placed = manager.place_order(command).await?;
    Ok(HttpResponse::Created().json(placed))
}

/// GET /api/orders
pub async fn list_orders(
    manager: web::Data<OrderLifecycleManager>,
) -> Result<HttpResponse, ApiError> {
    let orders = manager.list_orders().await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// GET /api/orders/user/{user_id}
pub async fn list_buyer_orders(
    manager: web::Data<OrderLifecycleManager>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let orders = manager.list_orders_by_buyer(&path).await?;
    Ok(HttpResponse::Ok().json(orders))
}

/// PUT /api/orders/{id}/status
pub async fn update_order_status(
    manager: web::Data<OrderLifecycleManager>,
    path: web::Path<Uuid>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let command = TransitionOrder {
        order_id: path.into_inner(),
        target: body.target()?,
    };

    let transitioned = manager.transition_order(command).await?;
    Ok(HttpResponse::Ok().json(transitioned))
}

/// DELETE /api/orders/{id}
pub async fn delete_order(
    manager: web::Data<OrderLifecycleManager>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let deleted = manager.delete_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(deleted))
}

/// GET /api/vendors/{vendor_id}/stats
pub async fn vendor_stats(
    aggregator: web::Data<VendorStatsAggregator>,
    path: web::Path<String>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let stats = aggregator.stats(&path, query.strict).await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// GET /api/vendors/{vendor_id}/orders
pub async fn vendor_orders(
    manager: web::Data<OrderLifecycleManager>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let fragments = manager.list_fragments_by_vendor(&path).await?;
    Ok(HttpResponse::Ok().json(fragments))
}

/// PUT /api/vendors/{vendor_id}/orders/{fragment_id}/status
pub async fn update_vendor_order_status(
    manager: web::Data<OrderLifecycleManager>,
    path: web::Path<(String, Uuid)>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let (vendor_id, fragment_id) = path.into_inner();
    let body = body.into_inner();

    let command = TransitionFragment {
        vendor_id,
        fragment_id,
        target: body.target()?,
        tracking_number: body.tracking_number,
    };

    let fragment = manager.transition_fragment(command).await?;
    Ok(HttpResponse::Ok().json(fragment))
}
