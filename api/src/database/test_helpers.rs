/// Shared test helpers for database tests
use super::users::User;
use super::{Database, NewUser, ProductInput, Role};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_MOBILE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Set up an in-memory test database with all migrations applied.
/// A single pooled connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> Database {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");
    Database::from_pool(pool)
        .await
        .expect("Migration failed")
}

pub fn product_input(title: &str, color: &str, price: f64) -> ProductInput {
    ProductInput {
        title: Some(title.to_string()),
        price: Some(price),
        description: Some(format!("{} description", title)),
        brand: Some("Acme".to_string()),
        category: Some("Apparel".to_string()),
        color: Some(color.to_string()),
        thumb: None,
        images: None,
        quantity: Some(10),
    }
}

pub async fn insert_user(db: &Database, email: &str, role: Role) -> User {
    let user = db
        .create_user(NewUser {
            firstname: "Test".to_string(),
            lastname: "User".to_string(),
            email: email.to_string(),
            mobile: format!(
                "0900{:06}",
                TEST_MOBILE_COUNTER.fetch_add(1, Ordering::SeqCst)
            ),
            password_hash: "not-a-real-hash".to_string(),
            address: "1 Test Street".to_string(),
        })
        .await
        .expect("Failed to insert user");
    if role == Role::Admin {
        db.set_user_role(email, Role::Admin)
            .await
            .expect("Failed to promote user");
    }
    db.get_user(&user.id)
        .await
        .expect("Failed to load user")
        .expect("User not found")
}
