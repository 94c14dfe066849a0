/// Default database URL for local development
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./shop.db?mode=rwc";

pub mod core;
pub mod orders;
pub mod products;
pub mod types;
pub mod users;

// Re-export main types
pub use orders::{Order, OrderStatus};
pub use products::{Product, ProductInput};
pub use types::Database;
pub use users::{is_unique_violation, CartItem, NewUser, Role, UserData};

#[cfg(test)]
pub mod test_helpers;
