use super::types::Database;
use anyhow::{Context, Result};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};

const USER_COLUMNS: &str = "id, firstname, lastname, email, mobile, password_hash, role, address, cart, refresh_token, created_at, updated_at";

/// True when a write failed on a UNIQUE constraint (email or mobile taken)
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db_err| db_err.is_unique_violation())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// One cart line, embedded in the user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
pub struct CartItem {
    pub product: String,
    pub quantity: i64,
    pub color: String,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    firstname: String,
    lastname: String,
    email: String,
    mobile: String,
    password_hash: String,
    role: String,
    address: String,
    #[sqlx(json)]
    cart: Vec<CartItem>,
    refresh_token: Option<String>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub role: Role,
    pub address: String,
    pub cart: Vec<CartItem>,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = Role::from_str(&row.role).unwrap_or_else(|_| {
            tracing::warn!("Unknown role {:?} for user {}, treating as user", row.role, row.id);
            Role::User
        });
        Self {
            id: row.id,
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            role,
            address: row.address,
            cart: row.cart,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Public view of a user: no password hash, role or refresh token
#[derive(Debug, Clone, Serialize, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct UserData {
    #[serde(rename = "_id")]
    #[oai(rename = "_id")]
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub address: String,
    pub cart: Vec<CartItem>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone(),
            address: user.address.clone(),
            cart: user.cart.clone(),
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub address: String,
}

/// Replaces the quantity of a line with the same product and color,
/// otherwise appends the item.
pub fn upsert_cart_line(cart: &mut Vec<CartItem>, item: CartItem) {
    match cart
        .iter_mut()
        .find(|line| line.product == item.product && line.color == item.color)
    {
        Some(line) => line.quantity = item.quantity,
        None => cart.push(item),
    }
}

impl Database {
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, firstname, lastname, email, mobile, password_hash, role, address, cart, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)",
        )
        .bind(&id)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(&user.mobile)
        .bind(&user.password_hash)
        .bind(Role::User.to_string())
        .bind(&user.address)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!("Registered user {}", user.email);
        self.get_user(&id)
            .await?
            .context("User missing right after insert")
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Whether another account already uses this email or mobile number
    pub async fn user_exists(&self, email: &str, mobile: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? OR mobile = ?")
                .bind(email)
                .bind(mobile)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn set_refresh_token(&self, user_id: &str, token: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token = ?, updated_at = ? WHERE id = ?")
            .bind(token)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Change a user's role. Returns false when no user has this email.
    pub async fn set_user_role(&self, email: &str, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE email = ?")
            .bind(role.to_string())
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add or update one cart line. Returns the new cart, or `None` for an unknown user.
    pub async fn update_cart(&self, user_id: &str, item: CartItem) -> Result<Option<Vec<CartItem>>> {
        let mut tx = self.pool.begin().await?;

        let cart_json: Option<String> = sqlx::query_scalar("SELECT cart FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(cart_json) = cart_json else {
            return Ok(None);
        };

        let mut cart: Vec<CartItem> =
            serde_json::from_str(&cart_json).context("Corrupt cart stored for user")?;
        upsert_cart_line(&mut cart, item);

        sqlx::query("UPDATE users SET cart = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&cart)?)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(cart))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_helpers::{insert_user, setup_test_db};

    fn item(product: &str, color: &str, quantity: i64) -> CartItem {
        CartItem {
            product: product.to_string(),
            quantity,
            color: color.to_string(),
        }
    }

    #[test]
    fn test_upsert_cart_line_replaces_same_product_and_color() {
        let mut cart = vec![item("p1", "red", 1)];
        upsert_cart_line(&mut cart, item("p1", "red", 4));
        assert_eq!(cart, vec![item("p1", "red", 4)]);
    }

    #[test]
    fn test_upsert_cart_line_appends_new_color() {
        let mut cart = vec![item("p1", "red", 1)];
        upsert_cart_line(&mut cart, item("p1", "blue", 2));
        upsert_cart_line(&mut cart, item("p2", "red", 3));
        assert_eq!(
            cart,
            vec![item("p1", "red", 1), item("p1", "blue", 2), item("p2", "red", 3)]
        );
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert!(Role::from_str("root").is_err());
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice@example.com", Role::User).await;
        assert_eq!(user.role, Role::User);
        assert!(user.cart.is_empty());
        assert!(user.refresh_token.is_none());

        let found = db
            .find_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(db
            .user_exists("alice@example.com", "000")
            .await
            .unwrap());
        assert!(!db.user_exists("bob@example.com", "000").await.unwrap());
        assert!(db.find_user_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_is_a_unique_violation() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "alice@example.com", Role::User).await;

        let err = db
            .create_user(NewUser {
                firstname: "Other".to_string(),
                lastname: "Person".to_string(),
                email: "alice@example.com".to_string(),
                mobile: "0999999999".to_string(),
                password_hash: "not-a-real-hash".to_string(),
                address: "2 Side Street".to_string(),
            })
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let err = db
            .create_user(NewUser {
                firstname: "Other".to_string(),
                lastname: "Person".to_string(),
                email: "carol@example.com".to_string(),
                mobile: user.mobile.clone(),
                password_hash: "not-a-real-hash".to_string(),
                address: "2 Side Street".to_string(),
            })
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(!is_unique_violation(&anyhow::anyhow!("some other failure")));
    }

    #[tokio::test]
    async fn test_set_role_and_refresh_token() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "carol@example.com", Role::User).await;

        assert!(db.set_user_role("carol@example.com", Role::Admin).await.unwrap());
        assert!(!db.set_user_role("nobody@example.com", Role::Admin).await.unwrap());

        db.set_refresh_token(&user.id, Some("token")).await.unwrap();
        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
        assert_eq!(stored.refresh_token.as_deref(), Some("token"));
    }

    #[tokio::test]
    async fn test_update_cart_persists_lines() {
        let db = setup_test_db().await;
        let user = insert_user(&db, "dave@example.com", Role::User).await;

        db.update_cart(&user.id, item("p1", "red", 1)).await.unwrap();
        let cart = db
            .update_cart(&user.id, item("p1", "red", 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cart, vec![item("p1", "red", 3)]);

        let stored = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.cart, cart);
        assert!(db
            .update_cart("missing", item("p1", "red", 1))
            .await
            .unwrap()
            .is_none());
    }
}
