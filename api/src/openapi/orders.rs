use super::common::{ApiError, ApiTags, CreateOrderRequest, OrderResponse};
use crate::auth::AuthenticatedUser;
use crate::database::{Database, Role};
use poem::web::Data;
use poem_openapi::{param::Path, payload::Json, OpenApi};
use std::sync::Arc;

pub struct OrdersApi;

#[OpenApi]
impl OrdersApi {
    /// Create order
    ///
    /// Turns the caller's cart into an order at current prices and empties the
    /// cart. Without an address the account address is used.
    #[oai(path = "/orders", method = "post", tag = "ApiTags::Orders")]
    async fn create_order(
        &self,
        db: Data<&Arc<Database>>,
        user: AuthenticatedUser,
        req: Json<CreateOrderRequest>,
    ) -> poem::Result<Json<OrderResponse>> {
        let order = db
            .create_order_from_cart(&user.user_id, req.address.as_deref(), req.status)
            .await
            .map_err(|e| ApiError::internal("Failed to create order", e))?
            .ok_or_else(|| ApiError::BadRequest("Cart is empty".to_string()))?;

        Ok(Json(OrderResponse {
            success: true,
            rs: order,
        }))
    }

    /// Get order
    ///
    /// Visible to the customer who placed it and to admins.
    #[oai(path = "/orders/:oid", method = "get", tag = "ApiTags::Orders")]
    async fn get_order(
        &self,
        db: Data<&Arc<Database>>,
        user: AuthenticatedUser,
        oid: Path<String>,
    ) -> poem::Result<Json<OrderResponse>> {
        let order = db
            .get_order(&oid.0)
            .await
            .map_err(|e| ApiError::internal("Failed to load order", e))?
            .filter(|order| order.order_by == user.user_id || user.role == Role::Admin)
            .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

        Ok(Json(OrderResponse {
            success: true,
            rs: order,
        }))
    }
}
