use super::types::Database;
use crate::search::{build_order_by, build_where, ProductQuery, Projection, SqlValue};
use anyhow::{anyhow, Context, Result};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

const PRODUCT_COLUMNS: &str = "id, title, slug, description, brand, thumb, price, category, quantity, sold, images, color, total_ratings, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, Object)]
#[serde(rename_all = "camelCase")]
#[oai(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    #[oai(rename = "_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[oai(skip_serializing_if_is_none)]
    pub thumb: Option<String>,
    pub price: f64,
    pub category: String,
    pub quantity: i64,
    pub sold: i64,
    #[sqlx(json)]
    pub images: Vec<String>,
    pub color: String,
    pub total_ratings: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Product fields accepted on create (required ones checked) and update (all optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Object)]
pub struct ProductInput {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub thumb: Option<String>,
    pub images: Option<Vec<String>>,
    pub quantity: Option<i64>,
}

/// One page of a product listing plus the total number of matches
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<serde_json::Value>,
    pub counts: u64,
}

/// Lower-case, dash-separated form of a title
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{} is required", field))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_document(product: Product, projection: Option<&Projection>) -> Result<serde_json::Value> {
    let serde_json::Value::Object(document) = serde_json::to_value(product)? else {
        return Err(anyhow!("Product did not serialize to a JSON object"));
    };
    let document = match projection {
        Some(projection) => projection.apply(document),
        None => document,
    };
    Ok(serde_json::Value::Object(document))
}

impl Database {
    /// Runs a compiled listing: the page query and the count query share one filter
    /// and are issued concurrently. The count ignores sort, projection and window.
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage> {
        let (where_sql, bind_values) = build_where(&query.filter).map_err(|e| anyhow!(e))?;
        if let Some(projection) = &query.projection {
            projection.validate().map_err(|e| anyhow!(e))?;
        }
        let order_by = build_order_by(query.sort.as_ref());

        let page_sql = format!(
            "SELECT {} FROM products WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS, where_sql, order_by
        );
        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {}", where_sql);
        tracing::debug!("Product listing query: {} {:?}", page_sql, bind_values);

        let mut page_query = sqlx::query_as::<_, Product>(&page_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for value in &bind_values {
            page_query = match value {
                SqlValue::Text(s) => page_query.bind(s.clone()),
                SqlValue::Integer(i) => page_query.bind(*i),
                SqlValue::Float(f) => page_query.bind(*f),
            };
            count_query = match value {
                SqlValue::Text(s) => count_query.bind(s.clone()),
                SqlValue::Integer(i) => count_query.bind(*i),
                SqlValue::Float(f) => count_query.bind(*f),
            };
        }
        let page_query = page_query
            .bind(to_i64(query.window.limit))
            .bind(to_i64(query.window.skip));

        let (rows, counts) = futures::try_join!(
            page_query.fetch_all(&self.pool),
            count_query.fetch_one(&self.pool)
        )?;

        let products = rows
            .into_iter()
            .map(|product| to_document(product, query.projection.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(ProductPage {
            products,
            counts: u64::try_from(counts).unwrap_or(0),
        })
    }

    /// Get single product by id
    pub async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Create a new product; the slug is derived from the title
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product> {
        let title = required(&input.title, "title")?;
        let description = required(&input.description, "description")?;
        let brand = required(&input.brand, "brand")?;
        let category = required(&input.category, "category")?;
        let color = required(&input.color, "color")?;
        let price = input.price.context("price is required")?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let images = serde_json::to_string(input.images.as_deref().unwrap_or_default())?;

        sqlx::query(
            "INSERT INTO products (id, title, slug, description, brand, thumb, price, category, quantity, sold, images, color, total_ratings, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(title)
        .bind(slugify(title))
        .bind(description)
        .bind(brand)
        .bind(input.thumb.as_deref())
        .bind(price)
        .bind(category)
        .bind(input.quantity.unwrap_or(0))
        .bind(&images)
        .bind(color)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::info!("Created product {} ({})", id, title);
        self.get_product(&id)
            .await?
            .context("Product missing right after insert")
    }

    /// Apply a partial update. Returns `None` when the product does not exist.
    pub async fn update_product(&self, id: &str, patch: &ProductInput) -> Result<Option<Product>> {
        let Some(mut product) = self.get_product(id).await? else {
            return Ok(None);
        };

        if let Some(title) = patch.title.as_deref().map(str::trim) {
            product.slug = slugify(title);
            product.title = title.to_string();
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(description) = &patch.description {
            product.description = description.clone();
        }
        if let Some(brand) = &patch.brand {
            product.brand = brand.clone();
        }
        if let Some(category) = &patch.category {
            product.category = category.clone();
        }
        if let Some(color) = &patch.color {
            product.color = color.clone();
        }
        if let Some(thumb) = &patch.thumb {
            product.thumb = Some(thumb.clone());
        }
        if let Some(images) = &patch.images {
            product.images = images.clone();
        }
        if let Some(quantity) = patch.quantity {
            product.quantity = quantity;
        }
        product.updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE products SET title = ?, slug = ?, description = ?, brand = ?, thumb = ?, price = ?, category = ?, quantity = ?, images = ?, color = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&product.title)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(product.thumb.as_deref())
        .bind(product.price)
        .bind(&product.category)
        .bind(product.quantity)
        .bind(serde_json::to_string(&product.images)?)
        .bind(&product.color)
        .bind(&product.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(Some(product))
    }

    /// Delete a product. Returns whether a row was removed.
    pub async fn delete_product(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
