use super::types::Database;
use super::users::CartItem;
use anyhow::{Context, Result};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    poem_openapi::Enum,
)]
pub enum OrderStatus {
    #[default]
    Processing,
    Cancelled,
    Succeed,
}

/// Snapshot of a cart line at the time the order was placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
pub struct OrderLine {
    pub product: String,
    pub quantity: i64,
    pub color: String,
    pub price: f64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[oai(skip_serializing_if_is_none)]
    pub thumb: Option<String>,
}

#[derive(Debug, Clone, Serialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    #[oai(rename = "_id")]
    pub id: String,
    pub products: Vec<OrderLine>,
    pub status: OrderStatus,
    pub total: f64,
    pub order_by: String,
    pub address: String,
    pub created_at: String,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    #[sqlx(json)]
    products: Vec<OrderLine>,
    status: String,
    total: f64,
    order_by: String,
    address: String,
    created_at: String,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let status = OrderStatus::from_str(&row.status).unwrap_or_else(|_| {
            tracing::warn!("Unknown status {:?} on order {}", row.status, row.id);
            OrderStatus::default()
        });
        Self {
            id: row.id,
            products: row.products,
            status,
            total: row.total,
            order_by: row.order_by,
            address: row.address,
            created_at: row.created_at,
        }
    }
}

pub fn order_total(lines: &[OrderLine]) -> f64 {
    lines
        .iter()
        .map(|line| line.price * line.quantity as f64)
        .sum()
}

impl Database {
    /// Turn the user's cart into an order and empty the cart, in one transaction.
    ///
    /// Returns `None` when the user is unknown or has nothing orderable in the cart.
    /// Without an explicit address the user's stored address is used.
    pub async fn create_order_from_cart(
        &self,
        user_id: &str,
        address: Option<&str>,
        status: Option<OrderStatus>,
    ) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let user: Option<(String, String)> =
            sqlx::query_as("SELECT cart, address FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((cart_json, user_address)) = user else {
            return Ok(None);
        };
        let cart: Vec<CartItem> =
            serde_json::from_str(&cart_json).context("Corrupt cart stored for user")?;

        let mut lines = Vec::with_capacity(cart.len());
        for item in cart {
            let product: Option<(String, f64, Option<String>)> =
                sqlx::query_as("SELECT title, price, thumb FROM products WHERE id = ?")
                    .bind(&item.product)
                    .fetch_optional(&mut *tx)
                    .await?;
            let Some((title, price, thumb)) = product else {
                tracing::warn!(
                    "Dropping cart line for missing product {} (user {})",
                    item.product,
                    user_id
                );
                continue;
            };
            lines.push(OrderLine {
                product: item.product,
                quantity: item.quantity,
                color: item.color,
                price,
                title,
                thumb,
            });
        }
        if lines.is_empty() {
            return Ok(None);
        }

        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            total: order_total(&lines),
            products: lines,
            status: status.unwrap_or_default(),
            order_by: user_id.to_string(),
            address: address
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(&user_address)
                .to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO orders (id, products, status, total, order_by, address, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(serde_json::to_string(&order.products)?)
        .bind(order.status.to_string())
        .bind(order.total)
        .bind(&order.order_by)
        .bind(&order.address)
        .bind(&order.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET cart = '[]', updated_at = ? WHERE id = ?")
            .bind(&order.created_at)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            "Created order {} for user {} (total {})",
            order.id,
            user_id,
            order.total
        );
        Ok(Some(order))
    }

    pub async fn get_order(&self, id: &str) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, products, status, total, order_by, address, created_at FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }
}
