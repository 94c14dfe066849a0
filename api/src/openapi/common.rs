use crate::database::{CartItem, Order, OrderStatus, Product, UserData};
use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::Response;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(poem_openapi::Tags)]
pub enum ApiTags {
    /// System endpoints
    System,
    /// Product catalog endpoints
    Products,
    /// Registration, login and cart endpoints
    Users,
    /// Order endpoints
    Orders,
}

/// Error returned by handlers, rendered as `{success: false, mes}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    /// Log a storage failure and turn it into a 500
    pub fn internal(context: &str, err: anyhow::Error) -> Self {
        tracing::error!("{}: {:#}", context, err);
        ApiError::Internal(format!("{}", err))
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn as_response(&self) -> Response
    where
        Self: std::error::Error + Send + Sync + 'static,
    {
        let body = MessageResponse {
            success: false,
            mes: self.message().to_string(),
        };
        let body = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"success":false,"mes":"Internal error"}"#.to_string());
        Response::builder()
            .status(self.status())
            .content_type("application/json")
            .body(body)
    }
}

#[derive(Debug, Serialize, Deserialize, Object)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub environment: String,
}

#[derive(Debug, Serialize, Deserialize, Object)]
pub struct MessageResponse {
    pub success: bool,
    pub mes: String,
}

#[derive(Debug, Serialize, Object)]
pub struct ProductListResponse {
    pub success: bool,
    /// Number of products matching the filter, ignoring pagination
    pub counts: u64,
    pub products: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Object)]
pub struct ProductResponse {
    pub success: bool,
    pub product: Product,
}

#[derive(Debug, Serialize, Object)]
pub struct ProductMutationResponse {
    pub success: bool,
    pub mes: String,
    pub product: Product,
}

#[derive(Debug, Deserialize, Object)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub address: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Debug, Deserialize, Object)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Object)]
pub struct LoginResponse {
    pub success: bool,
    #[oai(rename = "accessToken")]
    pub access_token: String,
    #[oai(rename = "userData")]
    pub user_data: UserData,
}

#[derive(Debug, Serialize, Object)]
pub struct AccessTokenResponse {
    pub success: bool,
    #[oai(rename = "accessToken")]
    pub access_token: String,
}

#[derive(Debug, Deserialize, Object)]
pub struct CartRequest {
    pub pid: Option<String>,
    pub quantity: Option<i64>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Object)]
pub struct CartResponse {
    pub success: bool,
    pub mes: String,
    pub cart: Vec<CartItem>,
}

#[derive(Debug, Deserialize, Object)]
pub struct CreateOrderRequest {
    pub address: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize, Object)]
pub struct OrderResponse {
    pub success: bool,
    pub rs: Order,
}

/// Trimmed, non-empty string field or a "Missing input" error
pub fn required_field<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing input: {}", field)))
}
