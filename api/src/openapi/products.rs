use super::common::{
    ApiError, ApiTags, MessageResponse, ProductListResponse, ProductMutationResponse,
    ProductResponse,
};
use crate::auth::AdminUser;
use crate::config::ShopConfig;
use crate::database::{Database, ProductInput};
use crate::search::{compile, RawQueryParams};
use crate::validation::validate_product_input;
use poem::web::Data;
use poem_openapi::{param::Path, payload::Json, OpenApi};
use std::sync::Arc;

const PRODUCT_NOT_FOUND: &str = "Product not found";

pub struct ProductsApi;

#[OpenApi]
impl ProductsApi {
    /// List products
    ///
    /// Filters, sorts, projects and paginates the catalog from the query string:
    /// `q` (free text over color, title, category and brand), `color` (comma
    /// separated, any of), `title` and `category` (case-insensitive substring),
    /// `field[gt|gte|lt|lte]=n` ranges, `sort=-price,title`, `fields=title,price`,
    /// `page` and `limit`. Any other key is an exact match on that field.
    #[oai(path = "/products", method = "get", tag = "ApiTags::Products")]
    async fn list_products(
        &self,
        db: Data<&Arc<Database>>,
        config: Data<&Arc<ShopConfig>>,
        raw: poem::web::Query<Vec<(String, String)>>,
    ) -> poem::Result<Json<ProductListResponse>> {
        let params = RawQueryParams::from_pairs(raw.0);
        let query = compile(&params, u64::from(config.limit_products));
        let page = db
            .list_products(&query)
            .await
            .map_err(|e| ApiError::internal("Failed to list products", e))?;

        Ok(Json(ProductListResponse {
            success: true,
            counts: page.counts,
            products: page.products,
        }))
    }

    /// Get product
    #[oai(path = "/products/:pid", method = "get", tag = "ApiTags::Products")]
    async fn get_product(
        &self,
        db: Data<&Arc<Database>>,
        pid: Path<String>,
    ) -> poem::Result<Json<ProductResponse>> {
        let product = db
            .get_product(&pid.0)
            .await
            .map_err(|e| ApiError::internal("Failed to load product", e))?
            .ok_or_else(|| ApiError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;
        Ok(Json(ProductResponse {
            success: true,
            product,
        }))
    }

    /// Create product
    ///
    /// Requires admin role. Image fields take URLs.
    #[oai(path = "/products", method = "post", tag = "ApiTags::Products")]
    async fn create_product(
        &self,
        db: Data<&Arc<Database>>,
        admin: AdminUser,
        input: Json<ProductInput>,
    ) -> poem::Result<Json<ProductMutationResponse>> {
        validate_product_input(&input.0, true).map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let product = db
            .create_product(&input.0)
            .await
            .map_err(|e| ApiError::internal("Failed to create product", e))?;
        tracing::info!("Admin {} created product {}", admin.0.user_id, product.id);

        Ok(Json(ProductMutationResponse {
            success: true,
            mes: "Product has been created".to_string(),
            product,
        }))
    }

    /// Update product
    ///
    /// Requires admin role. Only the supplied fields change.
    #[oai(path = "/products/:pid", method = "put", tag = "ApiTags::Products")]
    async fn update_product(
        &self,
        db: Data<&Arc<Database>>,
        admin: AdminUser,
        pid: Path<String>,
        patch: Json<ProductInput>,
    ) -> poem::Result<Json<ProductMutationResponse>> {
        validate_product_input(&patch.0, false).map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let product = db
            .update_product(&pid.0, &patch.0)
            .await
            .map_err(|e| ApiError::internal("Failed to update product", e))?
            .ok_or_else(|| ApiError::NotFound(PRODUCT_NOT_FOUND.to_string()))?;
        tracing::info!("Admin {} updated product {}", admin.0.user_id, product.id);

        Ok(Json(ProductMutationResponse {
            success: true,
            mes: "Product has been updated".to_string(),
            product,
        }))
    }

    /// Delete product
    ///
    /// Requires admin role.
    #[oai(path = "/products/:pid", method = "delete", tag = "ApiTags::Products")]
    async fn delete_product(
        &self,
        db: Data<&Arc<Database>>,
        admin: AdminUser,
        pid: Path<String>,
    ) -> poem::Result<Json<MessageResponse>> {
        let deleted = db
            .delete_product(&pid.0)
            .await
            .map_err(|e| ApiError::internal("Failed to delete product", e))?;
        if !deleted {
            return Err(ApiError::NotFound(PRODUCT_NOT_FOUND.to_string()).into());
        }
        tracing::info!("Admin {} deleted product {}", admin.0.user_id, pid.0);

        Ok(Json(MessageResponse {
            success: true,
            mes: "Product has been deleted".to_string(),
        }))
    }
}
