use super::common::{
    required_field, AccessTokenResponse, ApiError, ApiTags, CartRequest, CartResponse,
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
};
use crate::auth::{
    hash_password, issue_access_token, issue_refresh_token, verify_password, verify_token,
    AuthenticatedUser, TokenKind,
};
use crate::config::ShopConfig;
use crate::database::{is_unique_violation, CartItem, Database, NewUser, UserData};
use crate::validation::{validate_email, validate_mobile, validate_password};
use poem::web::cookie::{Cookie, CookieJar, SameSite};
use poem::web::Data;
use poem_openapi::{payload::Json, OpenApi};
use std::sync::Arc;
use std::time::Duration;

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

pub struct UsersApi;

fn bad_request(err: anyhow::Error) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

fn user_exists_error() -> ApiError {
    ApiError::Conflict("User already exists".to_string())
}

/// A concurrent registration can slip past the existence check; the
/// UNIQUE constraint still catches it
fn create_user_error(err: anyhow::Error) -> ApiError {
    if is_unique_violation(&err) {
        tracing::warn!("Registration lost a race on a unique field: {:#}", err);
        return user_exists_error();
    }
    ApiError::internal("Failed to create user", err)
}

fn refresh_cookie(token: &str, config: &ShopConfig) -> Cookie {
    let mut cookie = Cookie::new_with_str(REFRESH_TOKEN_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(config.is_production());
    cookie.set_same_site(Some(SameSite::Lax));
    cookie.set_max_age(Duration::from_secs(
        u64::try_from(config.refresh_token_ttl_secs).unwrap_or(0),
    ));
    cookie
}

#[OpenApi]
impl UsersApi {
    /// Register
    ///
    /// Creates a user account. Email and mobile number must be unused.
    #[oai(path = "/register", method = "post", tag = "ApiTags::Users")]
    async fn register(
        &self,
        db: Data<&Arc<Database>>,
        req: Json<RegisterRequest>,
    ) -> poem::Result<Json<MessageResponse>> {
        let email = required_field(&req.email, "email")?;
        let password = req
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing input: password".to_string()))?;
        let firstname = required_field(&req.firstname, "firstname")?;
        let lastname = required_field(&req.lastname, "lastname")?;
        let address = required_field(&req.address, "address")?;
        let mobile = required_field(&req.mobile, "mobile")?;

        validate_email(email).map_err(bad_request)?;
        validate_mobile(mobile).map_err(bad_request)?;
        validate_password(password).map_err(bad_request)?;

        let exists = db
            .user_exists(email, mobile)
            .await
            .map_err(|e| ApiError::internal("Failed to check existing users", e))?;
        if exists {
            return Err(user_exists_error().into());
        }

        let password_hash =
            hash_password(password).map_err(|e| ApiError::internal("Registration failed", e))?;
        db.create_user(NewUser {
            firstname: firstname.to_string(),
            lastname: lastname.to_string(),
            email: email.to_string(),
            mobile: mobile.to_string(),
            password_hash,
            address: address.to_string(),
        })
        .await
        .map_err(create_user_error)?;

        Ok(Json(MessageResponse {
            success: true,
            mes: "Registration successful. Go to login".to_string(),
        }))
    }

    /// Login
    ///
    /// Returns an access token and the user's public data, and sets the
    /// refresh token as an HTTP-only cookie.
    #[oai(path = "/login", method = "post", tag = "ApiTags::Users")]
    async fn login(
        &self,
        db: Data<&Arc<Database>>,
        config: Data<&Arc<ShopConfig>>,
        cookie_jar: &CookieJar,
        req: Json<LoginRequest>,
    ) -> poem::Result<Json<LoginResponse>> {
        let email = required_field(&req.email, "email")?;
        let password = req
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing input: password".to_string()))?;

        let user = db
            .find_user_by_email(email)
            .await
            .map_err(|e| ApiError::internal("Failed to load user", e))?
            .filter(|user| verify_password(password, &user.password_hash))
            .ok_or_else(|| {
                tracing::warn!("Failed login for {}", email);
                ApiError::Unauthorized("Invalid credentials".to_string())
            })?;

        let access_token = issue_access_token(&config, &user.id, user.role)?;
        let refresh_token = issue_refresh_token(&config, &user.id)?;
        db.set_refresh_token(&user.id, Some(&refresh_token))
            .await
            .map_err(|e| ApiError::internal("Failed to store refresh token", e))?;
        cookie_jar.add(refresh_cookie(&refresh_token, &config));

        tracing::info!("User {} logged in", user.id);
        Ok(Json(LoginResponse {
            success: true,
            access_token,
            user_data: UserData::from(&user),
        }))
    }

    /// Refresh access token
    ///
    /// Exchanges the refresh token cookie for a new access token.
    #[oai(path = "/refreshtoken", method = "post", tag = "ApiTags::Users")]
    async fn refresh_access_token(
        &self,
        db: Data<&Arc<Database>>,
        config: Data<&Arc<ShopConfig>>,
        cookie_jar: &CookieJar,
    ) -> poem::Result<Json<AccessTokenResponse>> {
        let token = cookie_jar
            .get(REFRESH_TOKEN_COOKIE)
            .map(|cookie| cookie.value_str().to_string())
            .ok_or_else(|| ApiError::Unauthorized("No refresh token in cookies".to_string()))?;

        let claims = verify_token(&config.jwt_secret, &token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(ApiError::Unauthorized("Not a refresh token".to_string()).into());
        }

        let user = db
            .get_user(&claims.sub)
            .await
            .map_err(|e| ApiError::internal("Failed to load user", e))?
            .filter(|user| user.refresh_token.as_deref() == Some(token.as_str()))
            .ok_or_else(|| ApiError::Unauthorized("Refresh token not matched".to_string()))?;

        Ok(Json(AccessTokenResponse {
            success: true,
            access_token: issue_access_token(&config, &user.id, user.role)?,
        }))
    }

    /// Update cart
    ///
    /// Sets the quantity of the line with the same product and color, or adds
    /// a new line.
    #[oai(path = "/cart", method = "put", tag = "ApiTags::Users")]
    async fn update_cart(
        &self,
        db: Data<&Arc<Database>>,
        user: AuthenticatedUser,
        req: Json<CartRequest>,
    ) -> poem::Result<Json<CartResponse>> {
        let pid = required_field(&req.pid, "pid")?;
        let color = required_field(&req.color, "color")?;
        let quantity = req.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(ApiError::BadRequest("Quantity must be at least 1".to_string()).into());
        }

        let product = db
            .get_product(pid)
            .await
            .map_err(|e| ApiError::internal("Failed to load product", e))?;
        if product.is_none() {
            return Err(ApiError::NotFound("Product not found".to_string()).into());
        }

        let cart = db
            .update_cart(
                &user.user_id,
                CartItem {
                    product: pid.to_string(),
                    quantity,
                    color: color.to_string(),
                },
            )
            .await
            .map_err(|e| ApiError::internal("Failed to update cart", e))?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(Json(CartResponse {
            success: true,
            mes: "Cart updated".to_string(),
            cart,
        }))
    }
}
