pub mod common;
pub mod orders;
pub mod products;
pub mod system;
pub mod users;

pub use orders::OrdersApi;
pub use products::ProductsApi;
pub use system::SystemApi;
pub use users::UsersApi;

use poem_openapi::OpenApi;

/// Combines all API modules into a single OpenAPI specification
pub fn create_combined_api() -> impl OpenApi {
    (SystemApi, ProductsApi, UsersApi, OrdersApi)
}
